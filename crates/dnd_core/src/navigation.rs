//! Per-session view of document replacement in participating contexts.
//!
//! Each context moves through `Unaffected -> Transitioning -> Committed`
//! (or back to `Unaffected` when a navigation aborts). While a context is
//! `Transitioning`, `over` and `drop` must not reach it; positions aimed at it
//! are held (or dropped, per [`TransitionEventPolicy`]) and replayed once the
//! navigation settles.
//!
//! The guard only holds ids and decisions. The registry applies them.

use core_types::{ContextId, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Origin;

use crate::error::DragError;

/// How a session treats a context that navigated to a document with the same
/// origin as the one that started the gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameOriginNavigation {
    /// Same gesture, same origin: self-navigation protection stays in force.
    #[default]
    Continue,
    /// The new document is a fresh drop target: navigation-capable drops are
    /// refused until the host grants origin consent for that context.
    RequireConsent,
}

/// What happens to a position update aimed at a `Transitioning` context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEventPolicy {
    /// Keep the newest position and replay it when the navigation settles.
    #[default]
    Queue,
    Drop,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NavigationState {
    #[default]
    Unaffected,
    Transitioning,
    Committed,
}

/// Result of comparing a committed document with the gesture's recorded origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Revalidation {
    SameOrigin,
    DistinctOrigin,
}

/// How the self-navigation check should treat a same-origin context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SameOriginTreatment {
    Continuation,
    FreshGesture,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GuardDecision {
    Keep,
    /// Event delivery to `context` may resume. `replay` is the held position,
    /// `retired` the context it replaced (if any).
    Resume {
        context: ContextId,
        replay: Option<Point>,
        retired: Option<ContextId>,
    },
    /// The origin context is gone but a successor committed; it becomes the origin.
    AdoptOrigin(ContextId),
    /// The origin context is gone with no replacement.
    CancelSession,
    /// A non-origin context is gone.
    Forget(ContextId),
}

#[derive(Debug, Default)]
struct ContextNav {
    state: NavigationState,
    held: Option<Point>,
    revalidation: Option<Revalidation>,
    successor: Option<ContextId>,
}

#[derive(Debug)]
pub struct NavigationGuard {
    same_origin: SameOriginNavigation,
    transition_events: TransitionEventPolicy,
    contexts: HashMap<ContextId, ContextNav>,
}

impl NavigationGuard {
    pub fn new(same_origin: SameOriginNavigation, transition_events: TransitionEventPolicy) -> Self {
        Self {
            same_origin,
            transition_events,
            contexts: HashMap::new(),
        }
    }

    pub fn state(&self, context: ContextId) -> NavigationState {
        self.contexts
            .get(&context)
            .map(|nav| nav.state)
            .unwrap_or_default()
    }

    pub fn is_transitioning(&self, context: ContextId) -> bool {
        self.state(context) == NavigationState::Transitioning
    }

    pub fn revalidation(&self, context: ContextId) -> Option<Revalidation> {
        self.contexts.get(&context).and_then(|nav| nav.revalidation)
    }

    /// `true` if no participating context has started navigating.
    pub fn is_unaffected(&self) -> bool {
        self.contexts
            .values()
            .all(|nav| nav.state == NavigationState::Unaffected)
    }

    pub fn on_context_detaching(&mut self, context: ContextId) -> GuardDecision {
        let nav = self.contexts.entry(context).or_default();
        nav.state = NavigationState::Transitioning;
        nav.revalidation = None;
        log::debug!(target: "dnd.nav", "{context} transitioning");
        GuardDecision::Keep
    }

    /// A new document committed in `context`. When `replaces` names another
    /// context, that one is retired and `context` becomes its successor.
    pub fn on_context_committed(
        &mut self,
        context: ContextId,
        replaces: Option<ContextId>,
        new_origin: &Origin,
        recorded_origin: &Origin,
    ) -> GuardDecision {
        let revalidation = if new_origin == recorded_origin {
            Revalidation::SameOrigin
        } else {
            Revalidation::DistinctOrigin
        };

        let mut replay = None;
        let mut retired = None;
        if let Some(old) = replaces.filter(|old| *old != context) {
            let old_nav = self.contexts.entry(old).or_default();
            replay = old_nav.held.take();
            old_nav.successor = Some(context);
            retired = Some(old);
        }

        let nav = self.contexts.entry(context).or_default();
        nav.state = NavigationState::Committed;
        nav.revalidation = Some(revalidation);
        if let Some(held) = nav.held.take() {
            replay = Some(held);
        }

        log::debug!(
            target: "dnd.nav",
            "{context} committed {} ({revalidation:?})",
            new_origin.ascii_serialization()
        );
        GuardDecision::Resume {
            context,
            replay,
            retired,
        }
    }

    /// Detachment finished without a committed replacement; the old document stays.
    pub fn on_navigation_aborted(&mut self, context: ContextId) -> GuardDecision {
        let Some(nav) = self.contexts.get_mut(&context) else {
            return GuardDecision::Keep;
        };
        if nav.state != NavigationState::Transitioning {
            return GuardDecision::Keep;
        }
        nav.state = NavigationState::Unaffected;
        GuardDecision::Resume {
            context,
            replay: nav.held.take(),
            retired: None,
        }
    }

    pub fn on_context_destroyed(
        &mut self,
        context: ContextId,
        origin_context: ContextId,
    ) -> GuardDecision {
        let nav = self.contexts.remove(&context).unwrap_or_default();
        if context != origin_context {
            return GuardDecision::Forget(context);
        }
        let committed_successor = nav
            .successor
            .filter(|succ| self.state(*succ) == NavigationState::Committed);
        match committed_successor {
            Some(successor) => GuardDecision::AdoptOrigin(successor),
            None => GuardDecision::CancelSession,
        }
    }

    /// Called when a position targets `context` while it is transitioning.
    /// Always reports `TransitionBlocked`; under `Queue` the point is kept.
    pub fn hold_position(&mut self, context: ContextId, point: Point) -> DragError {
        if self.transition_events == TransitionEventPolicy::Queue {
            if let Some(nav) = self.contexts.get_mut(&context) {
                nav.held = Some(point);
            }
        }
        log::debug!(
            target: "dnd.nav",
            "position for {context} suppressed ({:?})",
            self.transition_events
        );
        DragError::TransitionBlocked(context)
    }

    pub fn same_origin_treatment(&self, context: ContextId) -> SameOriginTreatment {
        let renavigated = self.revalidation(context) == Some(Revalidation::SameOrigin);
        if renavigated && self.same_origin == SameOriginNavigation::RequireConsent {
            SameOriginTreatment::FreshGesture
        } else {
            SameOriginTreatment::Continuation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(s: &str) -> Origin {
        url::Url::parse(s).unwrap().origin()
    }

    fn ctx(raw: u64) -> ContextId {
        ContextId::from_raw(raw)
    }

    fn guard() -> NavigationGuard {
        NavigationGuard::new(SameOriginNavigation::Continue, TransitionEventPolicy::Queue)
    }

    #[test]
    fn detach_then_commit() {
        let mut g = guard();
        assert!(g.is_unaffected());
        g.on_context_detaching(ctx(1));
        assert!(g.is_transitioning(ctx(1)));
        assert!(!g.is_unaffected());

        let recorded = origin("https://a.example/");
        let decision = g.on_context_committed(ctx(1), None, &origin("https://b.example/"), &recorded);
        assert_eq!(
            decision,
            GuardDecision::Resume {
                context: ctx(1),
                replay: None,
                retired: None
            }
        );
        assert_eq!(g.state(ctx(1)), NavigationState::Committed);
        assert_eq!(g.revalidation(ctx(1)), Some(Revalidation::DistinctOrigin));
    }

    #[test]
    fn held_position_is_replayed_on_commit() {
        let mut g = guard();
        g.on_context_detaching(ctx(1));
        let err = g.hold_position(ctx(1), Point::new(1.0, 2.0));
        assert_eq!(err, DragError::TransitionBlocked(ctx(1)));
        let a = origin("https://a.example/");
        match g.on_context_committed(ctx(1), None, &a, &a) {
            GuardDecision::Resume { replay, .. } => assert_eq!(replay, Some(Point::new(1.0, 2.0))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn drop_policy_discards_positions() {
        let mut g = NavigationGuard::new(SameOriginNavigation::Continue, TransitionEventPolicy::Drop);
        g.on_context_detaching(ctx(1));
        g.hold_position(ctx(1), Point::new(1.0, 2.0));
        match g.on_navigation_aborted(ctx(1)) {
            GuardDecision::Resume { replay, .. } => assert_eq!(replay, None),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(g.state(ctx(1)), NavigationState::Unaffected);
    }

    #[test]
    fn aborting_an_idle_context_is_a_no_op() {
        let mut g = guard();
        assert_eq!(g.on_navigation_aborted(ctx(4)), GuardDecision::Keep);
    }

    #[test]
    fn origin_destroyed_without_successor_cancels() {
        let mut g = guard();
        g.on_context_detaching(ctx(1));
        assert_eq!(g.on_context_destroyed(ctx(1), ctx(1)), GuardDecision::CancelSession);
    }

    #[test]
    fn origin_destroyed_after_successor_commit_is_adopted() {
        let mut g = guard();
        let a = origin("https://a.example/");
        g.on_context_detaching(ctx(1));
        g.hold_position(ctx(1), Point::new(3.0, 3.0));
        match g.on_context_committed(ctx(2), Some(ctx(1)), &a, &a) {
            GuardDecision::Resume { replay, retired, .. } => {
                assert_eq!(replay, Some(Point::new(3.0, 3.0)));
                assert_eq!(retired, Some(ctx(1)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(g.on_context_destroyed(ctx(1), ctx(1)), GuardDecision::AdoptOrigin(ctx(2)));
    }

    #[test]
    fn other_contexts_are_forgotten() {
        let mut g = guard();
        assert_eq!(g.on_context_destroyed(ctx(5), ctx(1)), GuardDecision::Forget(ctx(5)));
    }

    #[test]
    fn same_origin_treatment_follows_policy() {
        let a = origin("https://a.example/");
        let mut keep = guard();
        keep.on_context_committed(ctx(1), None, &a, &a);
        assert_eq!(keep.same_origin_treatment(ctx(1)), SameOriginTreatment::Continuation);

        let mut fresh =
            NavigationGuard::new(SameOriginNavigation::RequireConsent, TransitionEventPolicy::Queue);
        assert_eq!(fresh.same_origin_treatment(ctx(1)), SameOriginTreatment::Continuation);
        fresh.on_context_committed(ctx(1), None, &a, &a);
        assert_eq!(fresh.same_origin_treatment(ctx(1)), SameOriginTreatment::FreshGesture);
    }
}
