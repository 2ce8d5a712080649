//! # dnd_core
//!
//! UI-agnostic drag-and-drop session layer for the browser engine.
//!
//! A gesture starts in one document context, crosses others (possibly in other
//! processes, possibly while they navigate) and ends with a drop or a cancel.
//! This crate keeps one authoritative negotiated operation per gesture and
//! makes sure the value observed at `drop`/`end` is the one last set during
//! `enter`/`over` on the context under the pointer.
//!
//! - [`SessionRegistry`]: owns every [`DragSession`] and every attached context,
//!   routes positions and finishes gestures.
//! - [`ContextDispatchAdapter`]: one per context, delivers lifecycle phases to a
//!   [`DragHandler`] or across a [`RemoteLink`].
//! - [`NavigationGuard`]: per-session view of documents being replaced.
//! - [`CrossContextTransport`]: the wire format for remote contexts.
//! - [`HostBridge`]: what the platform drag layer calls.
//!
//! ## Design Principles
//!
//! Sessions are addressed by [`SessionId`](core_types::SessionId) only. Adapters
//! and guards receive the session by reference for one call and never keep it.
//! There is one write path for the negotiated operation, gated by the identity
//! of the current context, and remote replies go through it too.
//!
//! This crate spawns no threads and depends on no UI toolkit. The `runtime_dnd`
//! crate runs a registry on a worker thread.
//!
//! ## Example
//!
//! ```
//! use core_types::{ContextId, Point};
//! use dnd_core::{AllowedOperations, ContextDescriptor, NoopHandler, OperationKind, Payload, SessionRegistry};
//!
//! let origin = url::Url::parse("https://a.example/").unwrap().origin();
//! let mut registry = SessionRegistry::default();
//! let ctx = ContextId::from_raw(1);
//! registry.attach_context(ContextDescriptor::new(ctx, 1, origin), Box::new(NoopHandler));
//!
//! let mut host = registry.host(1);
//! let id = host.begin_gesture(Payload::url("https://a.example/x"), AllowedOperations::COPY, ctx).unwrap();
//! // Dropping a same-origin link onto its own document is refused.
//! assert_eq!(host.report_position(id, ctx, Point::new(4.0, 4.0)), OperationKind::None);
//! assert_eq!(host.report_release(id), OperationKind::None);
//! ```

mod config;
mod dispatch;
mod error;
mod handler;
mod host;
mod navigation;
mod negotiation;
mod operation;
mod payload;
mod registry;
mod session;
mod transport;

pub use config::{ConfigError, DragConfig};
pub use dispatch::{ContextDescriptor, ContextDispatchAdapter, ContextLocation, Delivery};
pub use error::{DragError, TransportError};
pub use handler::{
    ChannelHandler, DragHandler, DragPhase, HandlerRequest, ItemView, NoopHandler, SessionView,
};
pub use host::HostBridge;
pub use navigation::{
    GuardDecision, NavigationGuard, NavigationState, Revalidation, SameOriginNavigation,
    SameOriginTreatment, TransitionEventPolicy,
};
pub use negotiation::OperationNegotiation;
pub use operation::{AllowedOperations, OperationKind};
pub use payload::{ExternalRef, GestureKind, ItemBody, Payload, PayloadItem};
pub use registry::{Feedback, NavigationOutcome, SessionRegistry};
pub use session::{DragSession, FinishOutcome, SessionState};
pub use transport::{
    ChannelLink, CrossContextTransport, RemoteContextEndpoint, RemoteLink, WireBody, WIRE_VERSION,
};
