//! Owner of every drag session and every attached document context.
//!
//! Sessions and contexts live in id-keyed maps. Nothing outside the registry
//! holds a session; callers pass a [`SessionId`] and the registry resolves it
//! on each call. At most one non-terminal session exists per page.

use core_types::{ContextId, PageId, Point, ProcessId, SessionId};
use std::collections::HashMap;
use url::Origin;

use crate::config::DragConfig;
use crate::dispatch::{ContextDescriptor, ContextDispatchAdapter, ContextLocation, Delivery};
use crate::error::{DragError, TransportError};
use crate::handler::DragHandler;
use crate::host::HostBridge;
use crate::navigation::{GuardDecision, NavigationGuard, NavigationState};
use crate::operation::{AllowedOperations, OperationKind};
use crate::payload::Payload;
use crate::session::{DragSession, FinishOutcome, SessionState};
use crate::transport::{CrossContextTransport, RemoteLink, WireBody};

/// Host-visible operation for a context after an asynchronous step
/// (a replayed position or an acknowledged leave).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub session: SessionId,
    pub context: ContextId,
    pub operation: OperationKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// No active session was affected.
    Unchanged,
    /// Delivery resumed; `feedback` is set when a held position was replayed.
    Resumed {
        session: SessionId,
        context: ContextId,
        feedback: Option<Feedback>,
    },
    OriginAdopted {
        session: SessionId,
        origin_context: ContextId,
    },
    /// The origin context vanished with no successor; the session was finished.
    Cancelled { session: SessionId },
}

struct ContextRecord {
    adapter: ContextDispatchAdapter,
    detaching: bool,
}

/// A `leave` posted to a remote context that has not been acknowledged yet.
struct Handoff {
    leaving: ContextId,
    next: Option<(ContextId, Point)>,
}

struct SessionSlot {
    session: DragSession,
    guard: NavigationGuard,
    handoff: Option<Handoff>,
}

type Contexts = HashMap<ContextId, ContextRecord>;

pub struct SessionRegistry {
    config: DragConfig,
    next_session: u64,
    contexts: Contexts,
    sessions: HashMap<SessionId, SessionSlot>,
    active: HashMap<PageId, SessionId>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DragConfig::default())
    }
}

impl SessionRegistry {
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            next_session: 0,
            contexts: HashMap::new(),
            sessions: HashMap::new(),
            active: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    // --- contexts ---

    pub fn attach_context(&mut self, descriptor: ContextDescriptor, handler: Box<dyn DragHandler>) {
        self.insert_context(ContextDispatchAdapter::local(descriptor, handler));
    }

    pub fn attach_remote_context(&mut self, descriptor: ContextDescriptor, link: Box<dyn RemoteLink>) {
        self.insert_context(ContextDispatchAdapter::remote(descriptor, link));
    }

    fn insert_context(&mut self, adapter: ContextDispatchAdapter) {
        let id = adapter.context_id();
        log::debug!(
            target: "dnd.registry",
            "attach {id} on page {} ({:?}, {})",
            adapter.page(),
            adapter.location(),
            adapter.origin().ascii_serialization()
        );
        let record = ContextRecord {
            adapter,
            detaching: false,
        };
        if self.contexts.insert(id, record).is_some() {
            log::warn!(target: "dnd.registry", "{id} attached twice; previous adapter replaced");
        }
    }

    pub fn is_attached(&self, context: ContextId) -> bool {
        self.contexts.contains_key(&context)
    }

    pub fn context_origin(&self, context: ContextId) -> Option<&Origin> {
        self.contexts.get(&context).map(|record| record.adapter.origin())
    }

    // --- sessions ---

    pub fn begin(
        &mut self,
        page: PageId,
        payload: Payload,
        allowed: AllowedOperations,
        origin_context: ContextId,
    ) -> Result<SessionId, DragError> {
        if self.active.contains_key(&page) {
            return Err(DragError::SessionAlreadyActive { page });
        }
        let origin = match self.contexts.get(&origin_context) {
            Some(record) if record.adapter.page() == page => record.adapter.origin().clone(),
            _ => return Err(DragError::UnknownContext(origin_context)),
        };

        let id = SessionId::from_raw(self.next_session + 1);
        let session = DragSession::create(id, page, payload, allowed, origin_context, origin, &self.config)?;
        self.next_session += 1;

        let mut guard = NavigationGuard::new(
            self.config.same_origin_navigation,
            self.config.transition_events,
        );
        for (context, record) in &self.contexts {
            if record.detaching && record.adapter.page() == page {
                guard.on_context_detaching(*context);
            }
        }

        log::info!(
            target: "dnd.registry",
            "{id} started on page {page} from {origin_context} ({:?}, allowed {allowed})",
            session.payload().kind()
        );
        self.sessions.insert(
            id,
            SessionSlot {
                session,
                guard,
                handoff: None,
            },
        );
        self.active.insert(page, id);
        Ok(id)
    }

    pub fn session(&self, id: SessionId) -> Option<&DragSession> {
        self.sessions.get(&id).map(|slot| &slot.session)
    }

    pub fn active_session(&self, page: PageId) -> Option<SessionId> {
        self.active.get(&page).copied()
    }

    /// `Idle` when the page has no session.
    pub fn state(&self, page: PageId) -> SessionState {
        self.active_session(page)
            .and_then(|id| self.session(id))
            .map(DragSession::state)
            .unwrap_or_default()
    }

    pub fn navigation_state(&self, id: SessionId, context: ContextId) -> Option<NavigationState> {
        self.sessions.get(&id).map(|slot| slot.guard.state(context))
    }

    pub fn set_operation(
        &mut self,
        id: SessionId,
        context: ContextId,
        value: OperationKind,
    ) -> Result<(), DragError> {
        self.slot_mut(id)?.session.set_operation(context, value)
    }

    pub fn read_operation(&self, id: SessionId) -> Result<OperationKind, DragError> {
        self.session(id)
            .map(DragSession::read_operation)
            .ok_or(DragError::SessionNotFound(id))
    }

    /// Routes a pointer position and returns the operation the host should show.
    pub fn update_position(
        &mut self,
        id: SessionId,
        context: ContextId,
        point: Point,
    ) -> Result<OperationKind, DragError> {
        let slot = self
            .sessions
            .get_mut(&id)
            .ok_or(DragError::SessionNotFound(id))?;
        route_position(&mut self.contexts, slot, context, point)
    }

    /// Ends the session. A second call for the same id fails with
    /// `SessionNotFound` and delivers nothing.
    pub fn finish(&mut self, id: SessionId, outcome: FinishOutcome) -> Result<OperationKind, DragError> {
        let mut slot = self
            .sessions
            .remove(&id)
            .ok_or(DragError::SessionNotFound(id))?;
        let page = slot.session.page();
        if self.active.get(&page) == Some(&id) {
            self.active.remove(&page);
        }

        let session = &mut slot.session;
        if slot.handoff.take().is_some() {
            // The previous context already got its leave.
            session.clear_current();
        }

        let mut state = SessionState::Cancelled;
        let mut final_operation = OperationKind::None;
        if let Some(context) = session.current_context() {
            session.close_window();
            match self.contexts.get_mut(&context) {
                Some(_) if slot.guard.is_transitioning(context) => {
                    log::debug!(target: "dnd.registry", "{id} released over navigating {context}");
                }
                Some(record) => {
                    let offered = match outcome {
                        FinishOutcome::Complete => record.adapter.host_operation(session, &slot.guard),
                        FinishOutcome::Cancel => OperationKind::None,
                    };
                    if offered == OperationKind::None {
                        record.adapter.notify_leave(session);
                    } else {
                        record.adapter.notify_drop(session, &slot.guard);
                        state = SessionState::Completed;
                        final_operation = offered;
                    }
                }
                None => {}
            }
        }

        session.terminate(state, final_operation);
        match self.contexts.get_mut(&session.origin_context()) {
            Some(record) => {
                record.adapter.notify_end(session);
            }
            None => log::debug!(
                target: "dnd.registry",
                "{id} origin {} is gone; no end delivered",
                session.origin_context()
            ),
        }

        log::info!(target: "dnd.registry", "{id} finished {state:?} with {final_operation}");
        Ok(final_operation)
    }

    pub fn grant_origin_consent(&mut self, id: SessionId, context: ContextId) -> Result<(), DragError> {
        let slot = self.slot_mut(id)?;
        log::debug!(target: "dnd.nav", "{id} origin consent granted for {context}");
        slot.session.grant_origin_consent(context);
        Ok(())
    }

    pub fn host(&mut self, page: PageId) -> HostBridge<'_> {
        HostBridge::new(self, page)
    }

    // --- navigation ---

    pub fn on_context_detaching(&mut self, context: ContextId) -> Result<(), DragError> {
        let record = self
            .contexts
            .get_mut(&context)
            .ok_or(DragError::UnknownContext(context))?;
        record.detaching = true;
        let page = record.adapter.page();
        if let Some(slot) = active_slot(&self.active, &mut self.sessions, page) {
            slot.guard.on_context_detaching(context);
        }
        Ok(())
    }

    /// A new document committed in `context` with `origin`.
    pub fn on_context_committed(
        &mut self,
        context: ContextId,
        origin: Origin,
    ) -> Result<NavigationOutcome, DragError> {
        let record = self
            .contexts
            .get_mut(&context)
            .ok_or(DragError::UnknownContext(context))?;
        record.detaching = false;
        record.adapter.commit_origin(origin.clone());
        let page = record.adapter.page();
        let replaces = record.adapter.replaces();

        let Some(slot) = active_slot(&self.active, &mut self.sessions, page) else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let decision =
            slot.guard
                .on_context_committed(context, replaces, &origin, slot.session.recorded_origin());
        slot.session.revoke_origin_consent(context);
        Ok(resume(&mut self.contexts, slot, decision, true))
    }

    /// Detachment ended without a new document; the old one stays.
    pub fn on_context_navigation_aborted(
        &mut self,
        context: ContextId,
    ) -> Result<NavigationOutcome, DragError> {
        let record = self
            .contexts
            .get_mut(&context)
            .ok_or(DragError::UnknownContext(context))?;
        record.detaching = false;
        let page = record.adapter.page();

        let Some(slot) = active_slot(&self.active, &mut self.sessions, page) else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let decision = slot.guard.on_navigation_aborted(context);
        Ok(resume(&mut self.contexts, slot, decision, false))
    }

    /// Idempotent: an unknown or already destroyed context is `Unchanged`.
    pub fn on_context_destroyed(&mut self, context: ContextId) -> Result<NavigationOutcome, DragError> {
        let Some(record) = self.contexts.remove(&context) else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let page = record.adapter.page();
        log::debug!(target: "dnd.registry", "{context} destroyed");

        let Some(id) = self.active_session(page) else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let Some(slot) = self.sessions.get_mut(&id) else {
            return Ok(NavigationOutcome::Unchanged);
        };
        let decision = slot
            .guard
            .on_context_destroyed(context, slot.session.origin_context());
        if slot.session.current_context() == Some(context) {
            slot.session.clear_current();
        }
        let pending = match slot.handoff.take() {
            Some(handoff) if handoff.leaving == context => {
                slot.session.clear_current();
                handoff.next
            }
            other => {
                slot.handoff = other;
                None
            }
        };

        match decision {
            GuardDecision::CancelSession => {
                log::info!(target: "dnd.registry", "{id} origin {context} destroyed with no successor");
                self.finish(id, FinishOutcome::Cancel)?;
                Ok(NavigationOutcome::Cancelled { session: id })
            }
            GuardDecision::AdoptOrigin(successor) => {
                slot.session.adopt_origin_context(successor);
                replay_pending(&mut self.contexts, slot, pending);
                Ok(NavigationOutcome::OriginAdopted {
                    session: id,
                    origin_context: successor,
                })
            }
            _ => {
                let feedback = replay_pending(&mut self.contexts, slot, pending);
                Ok(match feedback {
                    Some(feedback) => NavigationOutcome::Resumed {
                        session: id,
                        context: feedback.context,
                        feedback: Some(feedback),
                    },
                    None => NavigationOutcome::Unchanged,
                })
            }
        }
    }

    // --- remote replies ---

    /// Applies one reply from a remote context.
    pub fn receive_remote(
        &mut self,
        process: ProcessId,
        bytes: &[u8],
    ) -> Result<Option<Feedback>, DragError> {
        match CrossContextTransport::decode(bytes)? {
            WireBody::OperationUpdate {
                seq,
                session,
                context,
                operation,
            } => {
                self.apply_remote_update(process, session, context, operation, seq)?;
                Ok(None)
            }
            WireBody::LeaveAck { session, context } if !self.sessions.contains_key(&session) => {
                log::trace!(target: "dnd.transport", "{session} leave ack from {context} after finish");
                Ok(None)
            }
            WireBody::LeaveAck { session, context } => {
                self.check_sender(process, context)?;
                self.acknowledge_leave(session, context)
            }
            WireBody::Notify { .. } => {
                Err(TransportError::Unexpected("notify sent to the session owner").into())
            }
        }
    }

    /// Applies a remote `enter`/`over` answer. The reply must come from the
    /// process hosting `context` and carry a sequence number issued to that
    /// context's current visit.
    pub(crate) fn apply_remote_update(
        &mut self,
        process: ProcessId,
        id: SessionId,
        context: ContextId,
        operation: OperationKind,
        seq: u64,
    ) -> Result<(), DragError> {
        self.check_sender(process, context)?;
        let slot = self.slot_mut(id)?;
        let fresh = slot
            .session
            .accept_remote_reply(seq, context)
            .inspect_err(|err| log::debug!(target: "dnd.transport", "{id} reply #{seq} from {context}: {err}"))?;
        if !fresh {
            log::debug!(target: "dnd.transport", "{id} reply #{seq} from {context} already applied");
            return Ok(());
        }
        slot.session
            .set_operation(context, operation)
            .inspect_err(|err| log::warn!(target: "dnd.transport", "{id} remote write rejected: {err}"))
    }

    fn check_sender(&self, process: ProcessId, context: ContextId) -> Result<(), DragError> {
        let hosted = self
            .contexts
            .get(&context)
            .is_some_and(|record| record.adapter.location() == ContextLocation::Remote(process));
        if hosted {
            return Ok(());
        }
        log::warn!(target: "dnd.transport", "process {process} answered for {context}");
        Err(TransportError::ForeignSender { process, context }.into())
    }

    /// The remote context confirmed its `leave`; routing continues with the
    /// newest position that arrived meanwhile.
    pub fn acknowledge_leave(
        &mut self,
        id: SessionId,
        context: ContextId,
    ) -> Result<Option<Feedback>, DragError> {
        let slot = self
            .sessions
            .get_mut(&id)
            .ok_or(DragError::SessionNotFound(id))?;
        match slot.handoff.take() {
            Some(handoff) if handoff.leaving == context => {
                if slot.session.current_context() == Some(context) {
                    slot.session.clear_current();
                }
                log::trace!(target: "dnd.transport", "{id} leave acknowledged by {context}");
                Ok(replay_pending(&mut self.contexts, slot, handoff.next))
            }
            other => {
                slot.handoff = other;
                log::warn!(target: "dnd.transport", "{id} unexpected leave ack from {context}");
                Ok(None)
            }
        }
    }

    fn slot_mut(&mut self, id: SessionId) -> Result<&mut SessionSlot, DragError> {
        self.sessions
            .get_mut(&id)
            .ok_or(DragError::SessionNotFound(id))
    }
}

fn active_slot<'a>(
    active: &HashMap<PageId, SessionId>,
    sessions: &'a mut HashMap<SessionId, SessionSlot>,
    page: PageId,
) -> Option<&'a mut SessionSlot> {
    active.get(&page).and_then(|id| sessions.get_mut(id))
}

/// `leave(previous)` before `enter(next)` before `over(next)`, every time the
/// context changes.
fn route_position(
    contexts: &mut Contexts,
    slot: &mut SessionSlot,
    context: ContextId,
    point: Point,
) -> Result<OperationKind, DragError> {
    let page = slot.session.page();
    if !contexts
        .get(&context)
        .is_some_and(|record| record.adapter.page() == page)
    {
        return Err(DragError::UnknownContext(context));
    }

    if let Some(handoff) = slot.handoff.as_mut() {
        log::trace!(
            target: "dnd.transport",
            "{} waiting for leave ack from {}",
            slot.session.id(),
            handoff.leaving
        );
        handoff.next = Some((context, point));
        return Ok(OperationKind::None);
    }

    if slot.guard.is_transitioning(context) {
        return Err(slot.guard.hold_position(context, point));
    }

    if slot.session.current_context() != Some(context) {
        if let Some(previous) = slot.session.current_context() {
            slot.session.close_window();
            if let Some(record) = contexts.get_mut(&previous) {
                if record.adapter.notify_leave(&mut slot.session) == Delivery::Posted {
                    slot.handoff = Some(Handoff {
                        leaving: previous,
                        next: Some((context, point)),
                    });
                    return Ok(OperationKind::None);
                }
            }
            slot.session.clear_current();
        }
        slot.session.enter(context);
        if let Some(record) = contexts.get_mut(&context) {
            record.adapter.notify_enter(&mut slot.session);
        }
    }

    let record = contexts
        .get_mut(&context)
        .ok_or(DragError::UnknownContext(context))?;
    record.adapter.notify_over(&mut slot.session, &slot.guard);
    Ok(record.adapter.host_operation(&slot.session, &slot.guard))
}

fn replay_pending(
    contexts: &mut Contexts,
    slot: &mut SessionSlot,
    pending: Option<(ContextId, Point)>,
) -> Option<Feedback> {
    let (context, point) = pending?;
    match route_position(contexts, slot, context, point) {
        Ok(operation) => Some(Feedback {
            session: slot.session.id(),
            context,
            operation,
        }),
        Err(err) => {
            log::debug!(target: "dnd.registry", "{} replay to {context}: {err}", slot.session.id());
            None
        }
    }
}

/// Applies a guard decision that lets delivery to a context continue.
/// `replaced` is true when the context's old document is gone for good.
fn resume(
    contexts: &mut Contexts,
    slot: &mut SessionSlot,
    decision: GuardDecision,
    replaced: bool,
) -> NavigationOutcome {
    let GuardDecision::Resume {
        context,
        replay,
        retired,
    } = decision
    else {
        return NavigationOutcome::Unchanged;
    };
    let id = slot.session.id();

    let mut pending = replay.map(|point| (context, point));
    if replaced {
        let gone = |ctx: ContextId| ctx == context || Some(ctx) == retired;
        if slot.session.current_context().is_some_and(gone) {
            // No leave for a document that no longer exists.
            slot.session.clear_current();
        }
        if slot.handoff.as_ref().is_some_and(|handoff| gone(handoff.leaving)) {
            if let Some(handoff) = slot.handoff.take() {
                pending = pending.or(handoff.next);
            }
        }
    }

    log::debug!(target: "dnd.nav", "{id} delivery to {context} resumed");
    NavigationOutcome::Resumed {
        session: id,
        context,
        feedback: replay_pending(contexts, slot, pending),
    }
}
