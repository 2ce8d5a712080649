#[path = "common/recording.rs"]
mod recording;

use core_types::{Point, SessionId};
use dnd_core::{
    AllowedOperations, ChannelLink, ContextDescriptor, CrossContextTransport, DragError,
    DragPhase, Feedback, GestureKind, OperationKind, Payload, PayloadItem, RemoteContextEndpoint,
    SessionRegistry, SessionState, TransportError, WireBody,
};
use recording::{Journal, Recorder, ctx, entries, journal, origin};
use std::sync::mpsc::{self, Receiver};

const PAGE: u64 = 1;
const REMOTE_PROCESS: u32 = 2;

struct Harness {
    registry: SessionRegistry,
    outbound: Receiver<Vec<u8>>,
    endpoint: RemoteContextEndpoint,
    journal: Journal,
    session: SessionId,
}

impl Harness {
    /// `ctx(1)` is local, `ctx(2)` lives in another process and answers `remote`.
    fn new(remote: Option<OperationKind>) -> Self {
        let journal = journal();
        let (tx, outbound) = mpsc::channel();
        let mut registry = SessionRegistry::default();
        registry.attach_context(
            ContextDescriptor::new(ctx(1), PAGE, origin("https://a.example/")),
            Recorder::boxed(&journal, None),
        );
        registry.attach_remote_context(
            ContextDescriptor::new(ctx(2), PAGE, origin("https://b.example/")).requesting_data(),
            Box::new(ChannelLink::new(REMOTE_PROCESS, tx)),
        );
        let mut endpoint = RemoteContextEndpoint::new();
        endpoint.attach(ctx(2), Recorder::boxed(&journal, remote));

        let payload = Payload::new(
            GestureKind::Selection,
            vec![PayloadItem::inline("text/plain", "hello")],
        );
        let session = registry
            .begin(PAGE, payload, AllowedOperations::ALL, ctx(1))
            .unwrap();
        Self {
            registry,
            outbound,
            endpoint,
            journal,
            session,
        }
    }

    /// Collects what the remote process would send back, without applying it.
    fn remote_replies(&mut self) -> Vec<Vec<u8>> {
        let mut replies = Vec::new();
        while let Ok(bytes) = self.outbound.try_recv() {
            replies.extend(self.endpoint.receive(&bytes).unwrap());
        }
        replies
    }

    fn pump(&mut self) -> Vec<Feedback> {
        let mut feedback = Vec::new();
        loop {
            let replies = self.remote_replies();
            if replies.is_empty() {
                return feedback;
            }
            for reply in replies {
                if let Some(f) = self.registry.receive_remote(REMOTE_PROCESS, &reply).unwrap() {
                    feedback.push(f);
                }
            }
        }
    }

    fn position(&mut self, context: u64) -> OperationKind {
        self.registry
            .update_position(self.session, ctx(context), Point::new(1.0, 1.0))
            .unwrap()
    }
}

#[test]
fn remote_answer_reaches_the_owner() {
    let mut h = Harness::new(Some(OperationKind::Move));
    // Until the remote replies, the host sees the default.
    assert_eq!(h.position(2), OperationKind::Copy);
    h.pump();
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Move));
    assert_eq!(
        entries(&h.journal),
        vec![(ctx(2), DragPhase::Enter), (ctx(2), DragPhase::Over)]
    );
}

#[test]
fn replies_apply_exactly_once() {
    let mut h = Harness::new(Some(OperationKind::Move));
    h.position(2);
    let replies = h.remote_replies();
    assert_eq!(replies.len(), 2);
    for reply in &replies {
        h.registry.receive_remote(REMOTE_PROCESS, reply).unwrap();
    }
    h.registry
        .set_operation(h.session, ctx(2), OperationKind::Link)
        .unwrap();

    // A duplicated delivery must not resurrect the older value.
    for reply in &replies {
        CrossContextTransport::apply_operation_update(&mut h.registry, REMOTE_PROCESS, reply).unwrap();
    }
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Link));
}

#[test]
fn leave_must_be_acknowledged_before_the_next_enter() {
    let mut h = Harness::new(None);
    h.position(2);
    h.pump();

    assert_eq!(h.position(1), OperationKind::None);
    assert_eq!(
        h.registry.session(h.session).and_then(|s| s.current_context()),
        Some(ctx(2)),
        "current context must not advance before the ack"
    );
    assert!(!entries(&h.journal).contains(&(ctx(1), DragPhase::Enter)));

    let feedback = h.pump();
    assert_eq!(
        feedback,
        vec![Feedback {
            session: h.session,
            context: ctx(1),
            operation: OperationKind::Copy,
        }]
    );
    assert_eq!(
        entries(&h.journal)[2..],
        [
            (ctx(2), DragPhase::Leave),
            (ctx(1), DragPhase::Enter),
            (ctx(1), DragPhase::Over),
        ]
    );
}

#[test]
fn late_remote_write_after_leave_is_stale() {
    let mut h = Harness::new(None);
    h.position(2);
    h.pump();
    h.position(1);
    h.pump();

    // The leave notification consumed sequence 3; forge a reply to it.
    let forged = CrossContextTransport::encode(&WireBody::OperationUpdate {
        seq: 3,
        session: h.session,
        context: ctx(2),
        operation: OperationKind::Move,
    })
    .unwrap();
    let err = CrossContextTransport::apply_operation_update(&mut h.registry, REMOTE_PROCESS, &forged)
        .unwrap_err();
    assert!(matches!(err, DragError::StaleContext { context, .. } if context == ctx(2)));
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Copy));
}

#[test]
fn owner_rejects_foreign_messages() {
    let mut h = Harness::new(None);
    h.position(2);
    let notify = h.outbound.try_recv().unwrap();
    assert_eq!(
        h.registry.receive_remote(REMOTE_PROCESS, &notify),
        Err(DragError::Transport(TransportError::Unexpected(
            "notify sent to the session owner"
        )))
    );
    assert!(matches!(
        h.registry.receive_remote(REMOTE_PROCESS, br#"{"version":2,"body":null}"#),
        Err(DragError::Transport(TransportError::Version { found: 2, .. }))
    ));
    assert!(matches!(
        CrossContextTransport::apply_operation_update(&mut h.registry, REMOTE_PROCESS, b"{"),
        Err(DragError::Transport(TransportError::Malformed(_)))
    ));
}

#[test]
fn release_over_remote_context_posts_drop_with_data() {
    let mut h = Harness::new(Some(OperationKind::Copy));
    h.position(2);
    h.pump();

    let id = h.session;
    assert_eq!(h.registry.host(PAGE).report_release(id), OperationKind::Copy);
    let drop = h.outbound.try_recv().unwrap();
    match CrossContextTransport::decode(&drop).unwrap() {
        WireBody::Notify { phase, view, .. } => {
            assert_eq!(phase, DragPhase::Drop);
            assert_eq!(view.data("text/plain"), Some(&b"hello"[..]));
        }
        other => panic!("expected a drop notification, got {other:?}"),
    }
    // `end` goes to the local origin context.
    assert_eq!(entries(&h.journal).last(), Some(&(ctx(1), DragPhase::End)));
}

fn operation_update(h: &Harness, seq: u64, context: u64, operation: OperationKind) -> Vec<u8> {
    CrossContextTransport::encode(&WireBody::OperationUpdate {
        seq,
        session: h.session,
        context: ctx(context),
        operation,
    })
    .unwrap()
}

#[test]
fn remote_cannot_answer_for_a_context_it_does_not_host() {
    let mut h = Harness::new(None);
    h.position(2);
    h.pump();
    h.position(1);
    h.pump();

    // Sequence 3 went out with the leave; replying under it for the local
    // context must not reach the negotiation.
    let for_local = operation_update(&h, 3, 1, OperationKind::Move);
    assert_eq!(
        h.registry.receive_remote(REMOTE_PROCESS, &for_local),
        Err(DragError::Transport(TransportError::ForeignSender {
            process: REMOTE_PROCESS,
            context: ctx(1),
        }))
    );
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Copy));
    assert!(!h.registry.session(h.session).unwrap().negotiation().is_explicitly_set());
}

#[test]
fn replies_from_other_processes_are_refused() {
    let mut h = Harness::new(None);
    h.position(2);
    h.pump();

    let update = operation_update(&h, 2, 2, OperationKind::Link);
    assert!(matches!(
        h.registry.receive_remote(9, &update),
        Err(DragError::Transport(TransportError::ForeignSender { process: 9, .. }))
    ));
    h.position(1);
    let ack = CrossContextTransport::encode(&WireBody::LeaveAck {
        session: h.session,
        context: ctx(2),
    })
    .unwrap();
    assert!(h.registry.receive_remote(9, &ack).is_err());
    assert_eq!(
        h.registry.session(h.session).and_then(|s| s.current_context()),
        Some(ctx(2)),
        "an ack from the wrong process does not release the handoff"
    );
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Copy));
}

#[test]
fn reply_from_an_earlier_visit_is_stale() {
    let mut h = Harness::new(Some(OperationKind::Move));
    h.position(2);
    let first_visit = h.remote_replies();
    assert_eq!(first_visit.len(), 2);
    h.position(1);
    h.pump();
    h.position(2);

    // Back over ctx(2): the over answer from the first visit arrives late.
    assert!(matches!(
        h.registry.receive_remote(REMOTE_PROCESS, &first_visit[1]),
        Err(DragError::StaleContext { context, .. }) if context == ctx(2)
    ));
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Copy));

    h.pump();
    assert_eq!(h.registry.read_operation(h.session), Ok(OperationKind::Move));
}

#[test]
fn release_while_leave_is_unacknowledged_cancels() {
    let mut h = Harness::new(Some(OperationKind::Copy));
    h.position(2);
    h.pump();
    h.position(1);

    let id = h.session;
    assert_eq!(h.registry.host(PAGE).report_release(id), OperationKind::None);
    assert_eq!(h.registry.state(PAGE), SessionState::Idle);

    // Only the pending leave is on the wire; no drop follows it.
    let pending = h.outbound.try_recv().unwrap();
    assert!(matches!(
        CrossContextTransport::decode(&pending).unwrap(),
        WireBody::Notify { phase: DragPhase::Leave, .. }
    ));
    assert!(h.outbound.try_recv().is_err());
    let events = entries(&h.journal);
    assert!(!events.contains(&(ctx(1), DragPhase::Enter)));
    assert_eq!(events.last(), Some(&(ctx(1), DragPhase::End)));

    // The ack that finally arrives has nothing left to release.
    for reply in h.endpoint.receive(&pending).unwrap() {
        assert_eq!(h.registry.receive_remote(REMOTE_PROCESS, &reply), Ok(None));
    }
}
