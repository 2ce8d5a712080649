//! One adapter per document context: turns lifecycle phases into collaborator
//! calls and decides what operation the host may show for this context.
//!
//! Adapters never keep a session. Every entry point takes the session by
//! `&mut` for the duration of one call, resolved by the registry from its id.

use core_types::{ContextId, PageId, ProcessId};
use url::Origin;

use crate::handler::{DragHandler, DragPhase, SessionView};
use crate::navigation::{NavigationGuard, SameOriginTreatment};
use crate::operation::OperationKind;
use crate::session::DragSession;
use crate::transport::{CrossContextTransport, RemoteLink, WireBody};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextDescriptor {
    pub id: ContextId,
    pub page: PageId,
    /// Origin of the document currently committed in this context.
    pub origin: Origin,
    /// Set when this context is the cross-process replacement of another one.
    pub replaces: Option<ContextId>,
    /// The collaborator wants inline item bytes in its `drop` view.
    pub wants_data: bool,
}

impl ContextDescriptor {
    pub fn new(id: ContextId, page: PageId, origin: Origin) -> Self {
        Self {
            id,
            page,
            origin,
            replaces: None,
            wants_data: false,
        }
    }

    pub fn replacing(mut self, previous: ContextId) -> Self {
        self.replaces = Some(previous);
        self
    }

    pub fn requesting_data(mut self) -> Self {
        self.wants_data = true;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextLocation {
    Local,
    Remote(ProcessId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// The local handler ran to completion.
    Delivered,
    /// Sent across a process boundary; any answer arrives later.
    Posted,
    /// Withheld because the context is mid-navigation.
    Suppressed,
    /// Could not be encoded for the remote side.
    Failed,
}

enum Collaborator {
    Script(Box<dyn DragHandler>),
    Remote(Box<dyn RemoteLink>),
}

pub struct ContextDispatchAdapter {
    descriptor: ContextDescriptor,
    collaborator: Collaborator,
}

impl ContextDispatchAdapter {
    pub fn local(descriptor: ContextDescriptor, handler: Box<dyn DragHandler>) -> Self {
        Self {
            descriptor,
            collaborator: Collaborator::Script(handler),
        }
    }

    pub fn remote(descriptor: ContextDescriptor, link: Box<dyn RemoteLink>) -> Self {
        Self {
            descriptor,
            collaborator: Collaborator::Remote(link),
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.descriptor.id
    }

    pub fn page(&self) -> PageId {
        self.descriptor.page
    }

    pub fn origin(&self) -> &Origin {
        &self.descriptor.origin
    }

    pub fn replaces(&self) -> Option<ContextId> {
        self.descriptor.replaces
    }

    pub fn location(&self) -> ContextLocation {
        match &self.collaborator {
            Collaborator::Script(_) => ContextLocation::Local,
            Collaborator::Remote(link) => ContextLocation::Remote(link.process()),
        }
    }

    pub(crate) fn commit_origin(&mut self, origin: Origin) {
        self.descriptor.origin = origin;
    }

    pub fn notify_enter(&mut self, session: &mut DragSession) -> Delivery {
        self.deliver(DragPhase::Enter, session)
    }

    pub fn notify_over(&mut self, session: &mut DragSession, guard: &NavigationGuard) -> Delivery {
        if guard.is_transitioning(self.descriptor.id) {
            return Delivery::Suppressed;
        }
        self.deliver(DragPhase::Over, session)
    }

    pub fn notify_leave(&mut self, session: &mut DragSession) -> Delivery {
        self.deliver(DragPhase::Leave, session)
    }

    pub fn notify_drop(&mut self, session: &mut DragSession, guard: &NavigationGuard) -> Delivery {
        if guard.is_transitioning(self.descriptor.id) {
            return Delivery::Suppressed;
        }
        self.deliver(DragPhase::Drop, session)
    }

    pub fn notify_end(&mut self, session: &mut DragSession) -> Delivery {
        self.deliver(DragPhase::End, session)
    }

    fn deliver(&mut self, phase: DragPhase, session: &mut DragSession) -> Delivery {
        let context = self.descriptor.id;
        let with_data = phase == DragPhase::Drop && self.descriptor.wants_data;
        log::trace!(target: "dnd.dispatch", "{} {phase} -> {context}", session.id());

        match &mut self.collaborator {
            Collaborator::Script(handler) => {
                let view = SessionView::project(session, with_data);
                let answer = handler.handle(phase, context, &view);
                match answer {
                    Some(operation) if phase.accepts_operation() => {
                        if let Err(err) = session.set_operation(context, operation) {
                            log::debug!(target: "dnd.dispatch", "{phase} handler in {context}: {err}");
                        }
                    }
                    Some(operation) => {
                        log::trace!(
                            target: "dnd.dispatch",
                            "{phase} handler in {context} answered {operation}; ignored"
                        );
                    }
                    None => {}
                }
                Delivery::Delivered
            }
            Collaborator::Remote(link) => {
                let body = WireBody::Notify {
                    seq: session.issue_remote_seq(context, phase),
                    context,
                    phase,
                    view: SessionView::project(session, with_data),
                };
                match CrossContextTransport::encode(&body) {
                    Ok(bytes) => {
                        link.post(bytes);
                        Delivery::Posted
                    }
                    Err(err) => {
                        log::warn!(target: "dnd.transport", "cannot post {phase} to {context}: {err}");
                        Delivery::Failed
                    }
                }
            }
        }
    }

    /// The operation the host may render for this context right now.
    pub fn host_operation(&self, session: &DragSession, guard: &NavigationGuard) -> OperationKind {
        if guard.is_transitioning(self.descriptor.id) || self.blocks_self_navigation(session, guard) {
            return OperationKind::None;
        }
        session.read_operation()
    }

    /// Dropping a navigation-capable payload onto a document of the gesture's
    /// own origin would navigate the source onto itself. Origins are compared
    /// at call time, so the answer tracks every navigation since gesture start.
    pub fn blocks_self_navigation(&self, session: &DragSession, guard: &NavigationGuard) -> bool {
        if !session.is_navigation_capable() || self.descriptor.origin != *session.recorded_origin() {
            return false;
        }
        match guard.same_origin_treatment(self.descriptor.id) {
            SameOriginTreatment::Continuation => true,
            SameOriginTreatment::FreshGesture => !session.has_origin_consent(self.descriptor.id),
        }
    }
}
