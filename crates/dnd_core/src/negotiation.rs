//! The single authoritative negotiated operation of a session.
//!
//! Invariants:
//! - `current` changes only through [`OperationNegotiation::assign`], which is
//!   crate-private and reached only from `DragSession::set_operation` after the
//!   writer's context has been checked.
//! - Once `explicitly_set` is true it stays true for the session's lifetime.

use crate::error::DragError;
use crate::operation::{AllowedOperations, OperationKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationNegotiation {
    allowed: AllowedOperations,
    current: OperationKind,
    explicitly_set: bool,
}

impl OperationNegotiation {
    pub fn new(allowed: AllowedOperations) -> Self {
        Self {
            allowed,
            current: OperationKind::None,
            explicitly_set: false,
        }
    }

    pub fn allowed(&self) -> AllowedOperations {
        self.allowed
    }

    pub fn is_explicitly_set(&self) -> bool {
        self.explicitly_set
    }

    /// The value a reader observes: the last assigned value, or the policy
    /// default derived from `allowed` if nobody has assigned one yet.
    pub fn effective(&self) -> OperationKind {
        if self.explicitly_set {
            self.current
        } else {
            self.allowed.default_operation()
        }
    }

    /// Returns the previous effective value.
    pub(crate) fn assign(&mut self, value: OperationKind) -> Result<OperationKind, DragError> {
        if !self.allowed.contains(value) {
            return Err(DragError::DisallowedOperation {
                operation: value,
                allowed: self.allowed,
            });
        }
        let previous = self.effective();
        self.current = value;
        self.explicitly_set = true;
        Ok(previous)
    }
}
