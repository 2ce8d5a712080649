//! The platform drag layer's view of the registry.
//!
//! The host only ever needs an operation back: what cursor to draw while the
//! pointer moves, and what to do with the dragged resource on release. Errors
//! are logged here and surface to the host as `None`, the safe default.

use core_types::{ContextId, PageId, Point, SessionId};

use crate::error::DragError;
use crate::operation::{AllowedOperations, OperationKind};
use crate::payload::Payload;
use crate::registry::SessionRegistry;
use crate::session::FinishOutcome;

pub struct HostBridge<'a> {
    registry: &'a mut SessionRegistry,
    page: PageId,
}

impl<'a> HostBridge<'a> {
    pub fn new(registry: &'a mut SessionRegistry, page: PageId) -> Self {
        Self { registry, page }
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn begin_gesture(
        &mut self,
        payload: Payload,
        allowed: AllowedOperations,
        origin_context: ContextId,
    ) -> Result<SessionId, DragError> {
        self.registry.begin(self.page, payload, allowed, origin_context)
    }

    pub fn report_position(&mut self, session: SessionId, context: ContextId, point: Point) -> OperationKind {
        self.registry
            .update_position(session, context, point)
            .unwrap_or_else(|err| fallback("position", &err))
    }

    pub fn report_release(&mut self, session: SessionId) -> OperationKind {
        self.registry
            .finish(session, FinishOutcome::Complete)
            .unwrap_or_else(|err| fallback("release", &err))
    }

    pub fn report_cancel(&mut self, session: SessionId) {
        if let Err(err) = self.registry.finish(session, FinishOutcome::Cancel) {
            fallback("cancel", &err);
        }
    }
}

fn fallback(what: &str, err: &DragError) -> OperationKind {
    match err {
        DragError::TransitionBlocked(_) => {
            log::debug!(target: "dnd.registry", "host {what}: {err}");
        }
        _ => log::warn!(target: "dnd.registry", "host {what}: {err}"),
    }
    OperationKind::None
}
