//! Wire format between the process that owns a session and processes that host
//! remote contexts.
//!
//! The owner posts `notify` messages carrying a read-only [`SessionView`] and a
//! per-session sequence number. The remote side answers `enter`/`over` with
//! `operation_update` under the same sequence number, and every `leave` with a
//! `leave_ack`. Replies are applied by the owner exactly once, in order, and
//! only when they come from the process hosting the context they name.

use core_types::{ContextId, ProcessId, SessionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::Sender;

use crate::error::{DragError, TransportError};
use crate::handler::{DragHandler, DragPhase, SessionView};
use crate::operation::OperationKind;
use crate::registry::SessionRegistry;

pub const WIRE_VERSION: u16 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireBody {
    Notify {
        seq: u64,
        context: ContextId,
        phase: DragPhase,
        view: SessionView,
    },
    OperationUpdate {
        seq: u64,
        session: SessionId,
        context: ContextId,
        operation: OperationKind,
    },
    LeaveAck {
        session: SessionId,
        context: ContextId,
    },
}

impl WireBody {
    fn name(&self) -> &'static str {
        match self {
            WireBody::Notify { .. } => "notify",
            WireBody::OperationUpdate { .. } => "operation_update",
            WireBody::LeaveAck { .. } => "leave_ack",
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u16,
    body: T,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u16,
}

pub struct CrossContextTransport;

impl CrossContextTransport {
    /// Encodes the read-only projection handed to a remote context.
    pub fn serialize(view: &SessionView) -> Result<Vec<u8>, TransportError> {
        Self::seal(view)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<SessionView, TransportError> {
        Self::open(bytes)
    }

    pub fn encode(body: &WireBody) -> Result<Vec<u8>, TransportError> {
        Self::seal(body)
    }

    pub fn decode(bytes: &[u8]) -> Result<WireBody, TransportError> {
        Self::open(bytes)
    }

    /// Decodes an `operation_update` sent by `process` and routes it through
    /// the registry's ordinary write path.
    pub fn apply_operation_update(
        registry: &mut SessionRegistry,
        process: ProcessId,
        bytes: &[u8],
    ) -> Result<(), DragError> {
        match Self::decode(bytes)? {
            WireBody::OperationUpdate {
                seq,
                session,
                context,
                operation,
            } => registry.apply_remote_update(process, session, context, operation, seq),
            other => Err(TransportError::Unexpected(other.name()).into()),
        }
    }

    fn seal<T: Serialize>(body: &T) -> Result<Vec<u8>, TransportError> {
        let envelope = Envelope {
            version: WIRE_VERSION,
            body,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    fn open<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)?;
        if probe.version != WIRE_VERSION {
            return Err(TransportError::Version {
                found: probe.version,
                expected: WIRE_VERSION,
            });
        }
        let envelope: Envelope<T> = serde_json::from_slice(bytes)?;
        Ok(envelope.body)
    }
}

/// Outbound half of a remote context as seen from the owning process.
pub trait RemoteLink: Send {
    fn process(&self) -> ProcessId;
    fn post(&mut self, bytes: Vec<u8>);
}

/// A [`RemoteLink`] backed by a plain channel.
pub struct ChannelLink {
    process: ProcessId,
    tx: Sender<Vec<u8>>,
}

impl ChannelLink {
    pub fn new(process: ProcessId, tx: Sender<Vec<u8>>) -> Self {
        Self { process, tx }
    }
}

impl RemoteLink for ChannelLink {
    fn process(&self) -> ProcessId {
        self.process
    }

    fn post(&mut self, bytes: Vec<u8>) {
        if self.tx.send(bytes).is_err() {
            log::debug!(target: "dnd.transport", "process {} is gone", self.process);
        }
    }
}

/// The remote side: runs local handlers for notifications it receives and
/// produces the replies the owning process expects.
#[derive(Default)]
pub struct RemoteContextEndpoint {
    handlers: HashMap<ContextId, Box<dyn DragHandler>>,
}

impl RemoteContextEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, context: ContextId, handler: Box<dyn DragHandler>) {
        self.handlers.insert(context, handler);
    }

    pub fn detach(&mut self, context: ContextId) {
        self.handlers.remove(&context);
    }

    /// Handles one inbound message and returns the encoded replies.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, TransportError> {
        let WireBody::Notify {
            seq,
            context,
            phase,
            view,
        } = CrossContextTransport::decode(bytes)?
        else {
            return Err(TransportError::Unexpected("reply sent to a remote endpoint"));
        };

        let answer = match self.handlers.get_mut(&context) {
            Some(handler) => handler.handle(phase, context, &view),
            None => {
                log::debug!(target: "dnd.transport", "no handler for {context}; {phase} ignored");
                None
            }
        };

        let mut replies = Vec::new();
        if let Some(operation) = answer.filter(|_| phase.accepts_operation()) {
            replies.push(CrossContextTransport::encode(&WireBody::OperationUpdate {
                seq,
                session: view.session,
                context,
                operation,
            })?);
        }
        if phase == DragPhase::Leave {
            replies.push(CrossContextTransport::encode(&WireBody::LeaveAck {
                session: view.session,
                context,
            })?);
        }
        Ok(replies)
    }
}
