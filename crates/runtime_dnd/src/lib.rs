//! Drag runtime: one worker thread owning a [`SessionRegistry`].
//!
//! Commands are applied strictly in arrival order, which is what gives every
//! session a single logical sequence of lifecycle notifications.

use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use bus::{DragCommand, DragEvent};
use core_types::{ContextId, ProcessId, SessionId};
use dnd_core::{
    DragConfig, DragError, FinishOutcome, NavigationOutcome, OperationKind, RemoteLink,
    SessionRegistry,
};

/// Sends notifications for a remote context back out through the event channel;
/// the embedder forwards them to `process`.
struct OutboundLink {
    process: ProcessId,
    evt_tx: Sender<DragEvent>,
}

impl RemoteLink for OutboundLink {
    fn process(&self) -> ProcessId {
        self.process
    }

    fn post(&mut self, bytes: Vec<u8>) {
        let _ = self.evt_tx.send(DragEvent::RemoteOutbound {
            process: self.process,
            bytes,
        });
    }
}

pub fn start_dnd_runtime(
    cmd_rx: Receiver<DragCommand>,
    evt_tx: Sender<DragEvent>,
    config: DragConfig,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut registry = SessionRegistry::new(config);
        while let Ok(cmd) = cmd_rx.recv() {
            apply(&mut registry, cmd, &evt_tx);
        }
        log::debug!(target: "dnd.runtime", "command channel closed; runtime exiting");
    })
}

fn apply(registry: &mut SessionRegistry, cmd: DragCommand, evt_tx: &Sender<DragEvent>) {
    match cmd {
        DragCommand::AttachContext { descriptor, handler } => {
            registry.attach_context(descriptor, handler.0);
        }
        DragCommand::AttachRemoteContext {
            descriptor,
            process,
        } => {
            let link = OutboundLink {
                process,
                evt_tx: evt_tx.clone(),
            };
            registry.attach_remote_context(descriptor, Box::new(link));
        }

        DragCommand::BeginGesture {
            page,
            request_id,
            payload,
            allowed,
            origin_context,
        } => {
            let event = match registry.begin(page, payload, allowed, origin_context) {
                Ok(session) => DragEvent::GestureStarted {
                    page,
                    request_id,
                    session,
                },
                Err(error) => DragEvent::GestureRejected {
                    page,
                    request_id,
                    error,
                },
            };
            let _ = evt_tx.send(event);
        }
        DragCommand::ReportPosition {
            session,
            context,
            point,
        } => {
            let operation = match registry.update_position(session, context, point) {
                Ok(operation) => operation,
                Err(error) => {
                    report(evt_tx, error);
                    OperationKind::None
                }
            };
            let _ = evt_tx.send(DragEvent::OperationFeedback {
                session,
                context,
                operation,
            });
        }
        DragCommand::ReportRelease { session } => {
            finish(registry, session, FinishOutcome::Complete, evt_tx);
        }
        DragCommand::ReportCancel { session } => {
            finish(registry, session, FinishOutcome::Cancel, evt_tx);
        }
        DragCommand::GrantOriginConsent { session, context } => {
            if let Err(error) = registry.grant_origin_consent(session, context) {
                report(evt_tx, error);
            }
        }

        DragCommand::ContextDetaching { context } => {
            if let Err(error) = registry.on_context_detaching(context) {
                report(evt_tx, error);
            }
        }
        DragCommand::ContextCommitted { context, origin } => {
            navigation(registry.on_context_committed(context, origin), evt_tx);
        }
        DragCommand::NavigationAborted { context } => {
            navigation(registry.on_context_navigation_aborted(context), evt_tx);
        }
        DragCommand::ContextDestroyed { context } => {
            navigation(registry.on_context_destroyed(context), evt_tx);
        }

        DragCommand::RemoteMessage { process, bytes } => {
            match registry.receive_remote(process, &bytes) {
                Ok(Some(feedback)) => {
                    feedback_event(evt_tx, feedback.session, feedback.context, feedback.operation);
                }
                Ok(None) => {}
                Err(error) => {
                    log::warn!(target: "dnd.runtime", "message from process {process}: {error}");
                    let _ = evt_tx.send(DragEvent::CommandFailed { error });
                }
            }
        }
    }
}

fn finish(
    registry: &mut SessionRegistry,
    session: SessionId,
    outcome: FinishOutcome,
    evt_tx: &Sender<DragEvent>,
) {
    match registry.finish(session, outcome) {
        Ok(operation) => {
            let _ = evt_tx.send(DragEvent::GestureFinished { session, operation });
        }
        Err(error) => report(evt_tx, error),
    }
}

fn navigation(outcome: Result<NavigationOutcome, DragError>, evt_tx: &Sender<DragEvent>) {
    match outcome {
        Ok(NavigationOutcome::Resumed {
            feedback: Some(feedback),
            ..
        }) => feedback_event(evt_tx, feedback.session, feedback.context, feedback.operation),
        Ok(NavigationOutcome::Cancelled { session }) => {
            let _ = evt_tx.send(DragEvent::GestureFinished {
                session,
                operation: OperationKind::None,
            });
        }
        Ok(_) => {}
        Err(error) => report(evt_tx, error),
    }
}

fn feedback_event(
    evt_tx: &Sender<DragEvent>,
    session: SessionId,
    context: ContextId,
    operation: OperationKind,
) {
    let _ = evt_tx.send(DragEvent::OperationFeedback {
        session,
        context,
        operation,
    });
}

fn report(evt_tx: &Sender<DragEvent>, error: DragError) {
    match &error {
        // Expected while a document navigates; the position is queued or dropped.
        DragError::TransitionBlocked(_) => {
            log::debug!(target: "dnd.runtime", "{error}");
            return;
        }
        DragError::SessionNotFound(_) | DragError::StaleContext { .. } => {
            log::warn!(target: "dnd.runtime", "{error}");
        }
        _ => log::debug!(target: "dnd.runtime", "{error}"),
    }
    let _ = evt_tx.send(DragEvent::CommandFailed { error });
}
