//! Boundary to the scripting collaborator.
//!
//! For each lifecycle phase the core calls [`DragHandler::handle`] with a
//! read-only [`SessionView`]. Returning `Some(op)` during `enter`/`over` is the
//! same as calling `set_operation` from that context; a return value in any
//! other phase is ignored.

use core_types::{ContextId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::operation::{AllowedOperations, OperationKind};
use crate::payload::GestureKind;
use crate::session::DragSession;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Enter,
    Over,
    Leave,
    Drop,
    End,
}

impl DragPhase {
    /// Phases during which the handler's answer may change the negotiation.
    pub fn accepts_operation(self) -> bool {
        matches!(self, DragPhase::Enter | DragPhase::Over)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DragPhase::Enter => "enter",
            DragPhase::Over => "over",
            DragPhase::Leave => "leave",
            DragPhase::Drop => "drop",
            DragPhase::End => "end",
        }
    }
}

impl fmt::Display for DragPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub mime: String,
    pub external: bool,
    /// Inline bytes, present only in a `drop` view for a context that asked
    /// for them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

/// Read-only projection of a session handed to collaborators. It never
/// contains the mutable negotiation itself, only its observable values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session: SessionId,
    pub kind: GestureKind,
    pub items: Vec<ItemView>,
    pub allowed: AllowedOperations,
    /// What `read_operation` returns right now.
    pub current: OperationKind,
    pub explicitly_set: bool,
    /// Only in the `end` view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_operation: Option<OperationKind>,
}

impl SessionView {
    /// Item bytes are copied only when `with_data` is set; otherwise the view
    /// lists types alone.
    pub fn project(session: &DragSession, with_data: bool) -> Self {
        let items = session
            .payload()
            .items()
            .iter()
            .map(|item| ItemView {
                mime: item.mime().to_owned(),
                external: item.is_external(),
                data: if with_data {
                    item.inline_bytes().map(<[u8]>::to_vec)
                } else {
                    None
                },
            })
            .collect();
        Self {
            session: session.id(),
            kind: session.payload().kind(),
            items,
            allowed: session.negotiation().allowed(),
            current: session.read_operation(),
            explicitly_set: session.negotiation().is_explicitly_set(),
            final_operation: session.final_operation(),
        }
    }

    pub fn item_types(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.mime.as_str())
    }

    pub fn has_type(&self, mime: &str) -> bool {
        self.item_types().any(|t| t.eq_ignore_ascii_case(mime))
    }

    /// Inline bytes for a type; `None` unless the view was projected with data.
    pub fn data(&self, mime: &str) -> Option<&[u8]> {
        self.items
            .iter()
            .filter(|item| item.mime.eq_ignore_ascii_case(mime))
            .find_map(|item| item.data.as_deref())
    }
}

pub trait DragHandler: Send {
    fn handle(
        &mut self,
        phase: DragPhase,
        context: ContextId,
        view: &SessionView,
    ) -> Option<OperationKind>;
}

impl<F> DragHandler for F
where
    F: FnMut(DragPhase, ContextId, &SessionView) -> Option<OperationKind> + Send,
{
    fn handle(
        &mut self,
        phase: DragPhase,
        context: ContextId,
        view: &SessionView,
    ) -> Option<OperationKind> {
        self(phase, context, view)
    }
}

/// A document with no drag listeners.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl DragHandler for NoopHandler {
    fn handle(&mut self, _: DragPhase, _: ContextId, _: &SessionView) -> Option<OperationKind> {
        None
    }
}

/// A lifecycle notification waiting for a script thread to answer.
#[derive(Debug)]
pub struct HandlerRequest {
    pub phase: DragPhase,
    pub context: ContextId,
    pub view: SessionView,
    reply: Sender<Option<OperationKind>>,
}

impl HandlerRequest {
    pub fn respond(self, operation: Option<OperationKind>) {
        // The dispatcher may have given up already.
        let _ = self.reply.send(operation);
    }
}

/// Forwards notifications to a script thread and waits at most `timeout` for
/// its answer. Silence is treated as "no opinion", not as an error.
pub struct ChannelHandler {
    requests: Sender<HandlerRequest>,
    timeout: Duration,
}

impl ChannelHandler {
    pub fn new(requests: Sender<HandlerRequest>, timeout: Duration) -> Self {
        Self { requests, timeout }
    }
}

impl DragHandler for ChannelHandler {
    fn handle(
        &mut self,
        phase: DragPhase,
        context: ContextId,
        view: &SessionView,
    ) -> Option<OperationKind> {
        let (reply, answer) = mpsc::channel();
        let request = HandlerRequest {
            phase,
            context,
            view: view.clone(),
            reply,
        };
        if self.requests.send(request).is_err() {
            log::debug!(target: "dnd.dispatch", "script thread for {context} is gone");
            return None;
        }
        match answer.recv_timeout(self.timeout) {
            Ok(operation) => operation,
            Err(RecvTimeoutError::Timeout) => {
                log::debug!(
                    target: "dnd.dispatch",
                    "{phase} handler in {context} timed out after {:?}",
                    self.timeout
                );
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn view() -> SessionView {
        SessionView {
            session: SessionId::from_raw(1),
            kind: GestureKind::Selection,
            items: vec![ItemView {
                mime: "text/plain".to_owned(),
                external: false,
                data: None,
            }],
            allowed: AllowedOperations::ALL,
            current: OperationKind::Copy,
            explicitly_set: false,
            final_operation: None,
        }
    }

    #[test]
    fn closures_are_handlers() {
        let mut handler = |phase: DragPhase, _: ContextId, _: &SessionView| {
            phase.accepts_operation().then_some(OperationKind::Link)
        };
        let ctx = ContextId::from_raw(1);
        assert_eq!(handler.handle(DragPhase::Over, ctx, &view()), Some(OperationKind::Link));
        assert_eq!(handler.handle(DragPhase::Drop, ctx, &view()), None);
    }

    #[test]
    fn channel_handler_returns_script_answer() {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let script = thread::spawn(move || {
            let request = rx.recv().unwrap();
            assert_eq!(request.phase, DragPhase::Enter);
            request.respond(Some(OperationKind::Move));
        });
        let mut handler = ChannelHandler::new(tx, Duration::from_secs(5));
        let answer = handler.handle(DragPhase::Enter, ContextId::from_raw(1), &view());
        assert_eq!(answer, Some(OperationKind::Move));
        script.join().unwrap();
    }

    #[test]
    fn channel_handler_timeout_is_no_opinion() {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let mut handler = ChannelHandler::new(tx, Duration::from_millis(10));
        let answer = handler.handle(DragPhase::Over, ContextId::from_raw(1), &view());
        assert_eq!(answer, None);
        // The late answer goes nowhere.
        rx.recv().unwrap().respond(Some(OperationKind::Copy));
    }

    #[test]
    fn types_are_listed_without_bytes() {
        let v = view();
        assert!(v.has_type("TEXT/PLAIN"));
        assert_eq!(v.data("text/plain"), None);
    }
}
