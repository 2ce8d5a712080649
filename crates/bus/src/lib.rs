use core_types::{ContextId, PageId, Point, ProcessId, SessionId};
use dnd_core::{AllowedOperations, ContextDescriptor, DragError, DragHandler, OperationKind, Payload};
use std::fmt;
use std::sync::mpsc::{Receiver, Sender};
use url::Origin;

/// A scripting collaborator travelling inside a command.
pub struct HandlerBox(pub Box<dyn DragHandler>);

impl fmt::Debug for HandlerBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerBox(..)")
    }
}

#[derive(Debug)]
pub enum DragCommand {
    // Contexts
    AttachContext {
        descriptor: ContextDescriptor,
        handler: HandlerBox,
    },
    AttachRemoteContext {
        descriptor: ContextDescriptor,
        process: ProcessId,
    },
    // Host drag layer
    BeginGesture {
        page: PageId,
        request_id: u64,
        payload: Payload,
        allowed: AllowedOperations,
        origin_context: ContextId,
    },
    ReportPosition {
        session: SessionId,
        context: ContextId,
        point: Point,
    },
    ReportRelease {
        session: SessionId,
    },
    ReportCancel {
        session: SessionId,
    },
    GrantOriginConsent {
        session: SessionId,
        context: ContextId,
    },
    // Navigation
    ContextDetaching {
        context: ContextId,
    },
    ContextCommitted {
        context: ContextId,
        origin: Origin,
    },
    NavigationAborted {
        context: ContextId,
    },
    ContextDestroyed {
        context: ContextId,
    },
    // Remote process -> owner
    RemoteMessage {
        process: ProcessId,
        bytes: Vec<u8>,
    },
}

#[derive(Debug)]
pub enum DragEvent {
    GestureStarted {
        page: PageId,
        request_id: u64,
        session: SessionId,
    },
    GestureRejected {
        page: PageId,
        request_id: u64,
        error: DragError,
    },
    /// Operation the host should render for the pointer's context.
    OperationFeedback {
        session: SessionId,
        context: ContextId,
        operation: OperationKind,
    },
    GestureFinished {
        session: SessionId,
        operation: OperationKind,
    },
    // Owner -> remote process
    RemoteOutbound {
        process: ProcessId,
        bytes: Vec<u8>,
    },
    CommandFailed {
        error: DragError,
    },
}

pub struct Bus {
    pub cmd_tx: Sender<DragCommand>,
    pub evt_rx: Receiver<DragEvent>,
    pub evt_tx: Sender<DragEvent>, // shareable for runtimes
}
