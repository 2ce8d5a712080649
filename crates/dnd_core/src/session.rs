//! The drag session aggregate: payload, negotiation, lifecycle and identity.

use core_types::{ContextId, PageId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use url::Origin;

use crate::config::DragConfig;
use crate::error::DragError;
use crate::handler::DragPhase;
use crate::negotiation::OperationNegotiation;
use crate::operation::{AllowedOperations, OperationKind};
use crate::payload::Payload;

/// `Idle` is what a page reports when it has no session; sessions themselves
/// start `Active` and end in one of the terminal states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    Completed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FinishOutcome {
    Complete,
    Cancel,
}

#[derive(Debug)]
pub struct DragSession {
    id: SessionId,
    page: PageId,
    payload: Payload,
    negotiation: OperationNegotiation,
    origin_context: ContextId,
    /// Origin of `origin_context` when the gesture started. Later navigations
    /// of that context do not change it.
    recorded_origin: Origin,
    navigation_capable: bool,
    state: SessionState,
    current_context: Option<ContextId>,
    /// Open between `enter` on `current_context` and its `leave`/`drop`.
    accepting: bool,
    origin_consent: HashSet<ContextId>,
    next_remote_seq: u64,
    last_remote_applied: u64,
    /// Notifications posted across a process boundary that a reply may still
    /// answer. Everything older than the latest `enter` is pruned.
    issued: BTreeMap<u64, (ContextId, DragPhase)>,
    final_operation: Option<OperationKind>,
}

impl DragSession {
    pub(crate) fn create(
        id: SessionId,
        page: PageId,
        payload: Payload,
        allowed: AllowedOperations,
        origin_context: ContextId,
        recorded_origin: Origin,
        config: &DragConfig,
    ) -> Result<Self, DragError> {
        payload.validate(config)?;
        let navigation_capable = payload.is_navigation_capable(config);
        Ok(Self {
            id,
            page,
            payload,
            negotiation: OperationNegotiation::new(allowed),
            origin_context,
            recorded_origin,
            navigation_capable,
            state: SessionState::Active,
            current_context: None,
            accepting: false,
            origin_consent: HashSet::new(),
            next_remote_seq: 0,
            last_remote_applied: 0,
            issued: BTreeMap::new(),
            final_operation: None,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn negotiation(&self) -> &OperationNegotiation {
        &self.negotiation
    }

    pub fn origin_context(&self) -> ContextId {
        self.origin_context
    }

    pub fn recorded_origin(&self) -> &Origin {
        &self.recorded_origin
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_context(&self) -> Option<ContextId> {
        self.current_context
    }

    pub fn is_navigation_capable(&self) -> bool {
        self.navigation_capable
    }

    pub fn has_origin_consent(&self, context: ContextId) -> bool {
        self.origin_consent.contains(&context)
    }

    /// Set once the session reaches a terminal state.
    pub fn final_operation(&self) -> Option<OperationKind> {
        self.final_operation
    }

    /// The one mutation path for the negotiated operation.
    pub(crate) fn set_operation(
        &mut self,
        context: ContextId,
        value: OperationKind,
    ) -> Result<(), DragError> {
        if self.state.is_terminal() {
            return Err(DragError::SessionNotFound(self.id));
        }
        if self.current_context != Some(context) || !self.accepting {
            return Err(DragError::StaleContext {
                context,
                current: self.current_context,
            });
        }
        let previous = self.negotiation.assign(value)?;
        if previous != value {
            log::debug!(
                target: "dnd.session",
                "{} operation {previous} -> {value} by {context}",
                self.id
            );
        }
        Ok(())
    }

    pub fn read_operation(&self) -> OperationKind {
        self.negotiation.effective()
    }

    pub(crate) fn enter(&mut self, context: ContextId) {
        self.current_context = Some(context);
        self.accepting = true;
    }

    pub(crate) fn close_window(&mut self) {
        self.accepting = false;
    }

    pub(crate) fn clear_current(&mut self) {
        self.current_context = None;
        self.accepting = false;
    }

    pub(crate) fn terminate(&mut self, state: SessionState, final_operation: OperationKind) {
        debug_assert!(state.is_terminal(), "terminate needs a terminal state");
        self.state = state;
        self.accepting = false;
        self.final_operation = Some(final_operation);
    }

    pub(crate) fn adopt_origin_context(&mut self, successor: ContextId) {
        log::debug!(
            target: "dnd.session",
            "{} origin context {} -> {successor}",
            self.id,
            self.origin_context
        );
        self.origin_context = successor;
    }

    pub(crate) fn grant_origin_consent(&mut self, context: ContextId) {
        self.origin_consent.insert(context);
    }

    pub(crate) fn revoke_origin_consent(&mut self, context: ContextId) {
        self.origin_consent.remove(&context);
    }

    /// Sequence number for a notification posted to `context` across a
    /// process boundary.
    pub(crate) fn issue_remote_seq(&mut self, context: ContextId, phase: DragPhase) -> u64 {
        self.next_remote_seq += 1;
        let seq = self.next_remote_seq;
        if phase == DragPhase::Enter {
            // Replies from earlier visits can no longer be applied.
            self.issued = self.issued.split_off(&seq);
        }
        self.issued.insert(seq, (context, phase));
        seq
    }

    /// Checks that `seq` answers an `enter`/`over` posted to `context` during
    /// its latest visit. `Ok(false)` is a replay of a reply already applied.
    pub(crate) fn accept_remote_reply(
        &mut self,
        seq: u64,
        context: ContextId,
    ) -> Result<bool, DragError> {
        let stale = DragError::StaleContext {
            context,
            current: self.current_context,
        };
        if seq > self.next_remote_seq {
            return Err(stale);
        }
        if seq <= self.last_remote_applied {
            return Ok(false);
        }
        match self.issued.get(&seq) {
            Some(&(issued_to, phase)) if issued_to == context && phase.accepts_operation() => {
                self.last_remote_applied = seq;
                self.issued = self.issued.split_off(&seq);
                Ok(true)
            }
            _ => Err(stale),
        }
    }
}
