//! Error taxonomy for drag sessions.
//!
//! Every variant except `InvalidPayload` is recoverable: the session keeps its
//! last-known-good state and the caller decides whether to retry. The only
//! escalation path (origin context destroyed with no successor) is a forced
//! cancel, not an error.

use core_types::{ContextId, PageId, ProcessId, SessionId};
use thiserror::Error;

use crate::operation::{AllowedOperations, OperationKind};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DragError {
    /// Payload rejected at gesture start. No session was created.
    #[error("invalid drag payload: {0}")]
    InvalidPayload(String),

    /// A non-terminal session already exists for this page.
    #[error("page {page} already has an active drag session")]
    SessionAlreadyActive { page: PageId },

    /// The writer is not the context currently under the pointer, or its
    /// enter/over window has closed.
    #[error(
        "stale context {context} (current: {})",
        .current.map_or_else(|| "none".to_owned(), |c| c.to_string())
    )]
    StaleContext {
        context: ContextId,
        current: Option<ContextId>,
    },

    #[error("operation `{operation}` is not in the allowed set `{allowed}`")]
    DisallowedOperation {
        operation: OperationKind,
        allowed: AllowedOperations,
    },

    /// Unknown id, or the session already reached a terminal state.
    #[error("drag session {0} not found")]
    SessionNotFound(SessionId),

    /// The target context is mid-navigation; the event was queued or dropped.
    #[error("context {0} is navigating; event suppressed")]
    TransitionBlocked(ContextId),

    #[error("context {0} is not attached")]
    UnknownContext(ContextId),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DragError {
    /// `false` only for errors that prevented a session from existing at all.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, DragError::InvalidPayload(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("malformed drag message: {0}")]
    Malformed(String),

    #[error("unsupported drag wire version {found} (expected {expected})")]
    Version { found: u16, expected: u16 },

    #[error("unexpected drag message `{0}`")]
    Unexpected(&'static str),

    /// A reply naming a context that the sending process does not host.
    #[error("process {process} does not host {context}")]
    ForeignSender { process: ProcessId, context: ContextId },
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_payload_is_fatal() {
        assert!(!DragError::InvalidPayload("empty".into()).is_recoverable());
        assert!(DragError::SessionNotFound(SessionId::from_raw(1)).is_recoverable());
        assert!(DragError::TransitionBlocked(ContextId::from_raw(1)).is_recoverable());
    }

    #[test]
    fn messages_name_the_ids() {
        let err = DragError::StaleContext {
            context: ContextId::from_raw(2),
            current: Some(ContextId::from_raw(3)),
        };
        let text = err.to_string();
        assert!(text.contains("ctx#2"), "{text}");
        assert!(text.contains("ctx#3"), "{text}");
    }

    #[test]
    fn serde_errors_become_malformed() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(TransportError::from(err), TransportError::Malformed(_)));
    }
}
