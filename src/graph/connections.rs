//! Inferred causal connections from back-reference attributes

use rustc_hash::FxHashSet;
use tracing::debug;

use super::{ordered_events, EventConnection};
use crate::event::{BackReference, EventId, WorkflowEvent};

/// Resolve the closest back-reference of `event` among `references`
///
/// A reference resolves only when it names a known, earlier event. When
/// several resolve, the closest in time (largest id) wins.
pub fn resolve_reference(
    event: &WorkflowEvent,
    references: &[BackReference],
    known: &FxHashSet<EventId>,
) -> Option<EventId> {
    references
        .iter()
        .filter_map(|&reference| {
            let target = event.back_reference(reference)?;
            if target < event.id && known.contains(&target) {
                Some(target)
            } else {
                debug!(
                    event_id = event.id,
                    reference = reference.attribute_name(),
                    target_id = target,
                    "unresolvable back-reference"
                );
                None
            }
        })
        .max()
}

/// One inferred connection per event at most, from initiator to event
pub fn infer_connections(events: &[WorkflowEvent]) -> Vec<EventConnection> {
    let ordered = ordered_events(events);
    let known: FxHashSet<EventId> = ordered.iter().map(|e| e.id).collect();

    ordered
        .iter()
        .filter_map(|event| {
            let references = event.event_type.causal_references();
            resolve_reference(event, references, &known)
                .map(|from| EventConnection::inferred(from, event.id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType::*;
    use crate::graph::test_support::*;

    #[test]
    fn activity_chain_references() {
        let events = vec![
            event(1, ActivityTaskScheduled),
            event_ref(2, ActivityTaskStarted, "scheduledEventId", 1),
            event_ref(3, ActivityTaskCompleted, "startedEventId", 2),
        ];
        assert_eq!(
            infer_connections(&events),
            vec![EventConnection::inferred(1, 2), EventConnection::inferred(2, 3)]
        );
    }

    #[test]
    fn unresolvable_reference_is_skipped() {
        let events = vec![
            event(1, WorkflowExecutionStarted),
            event_ref(2, ActivityTaskStarted, "scheduledEventId", 99),
        ];
        assert!(infer_connections(&events).is_empty());
    }

    #[test]
    fn closest_reference_wins() {
        let events = vec![
            event(1, ActivityTaskScheduled),
            event_ref(2, ActivityTaskStarted, "scheduledEventId", 1),
            event_ref(3, ActivityTaskFailed, "scheduledEventId", 1).with_attribute("startedEventId", 2),
        ];
        let connections = infer_connections(&events);
        assert!(connections.contains(&EventConnection::inferred(2, 3)));
        assert!(!connections.contains(&EventConnection::inferred(1, 3)));
    }

    #[test]
    fn falls_back_to_the_reference_that_resolves() {
        // startedEventId points nowhere, scheduledEventId still resolves
        let events = vec![
            event(1, ActivityTaskScheduled),
            event_ref(3, ActivityTaskTimedOut, "scheduledEventId", 1).with_attribute("startedEventId", 42),
        ];
        assert_eq!(infer_connections(&events), vec![EventConnection::inferred(1, 3)]);
    }

    #[test]
    fn forward_and_self_references_are_ignored() {
        let events = vec![
            event_ref(1, TimerFired, "startedEventId", 2),
            event_ref(2, TimerFired, "startedEventId", 2),
        ];
        assert!(infer_connections(&events).is_empty());
    }

    #[test]
    fn string_encoded_ids_resolve() {
        let events = vec![
            event(1, StartChildWorkflowExecutionInitiated),
            event(2, ChildWorkflowExecutionStarted).with_attribute("initiatedEventId", "1"),
        ];
        assert_eq!(infer_connections(&events), vec![EventConnection::inferred(1, 2)]);
    }

    #[test]
    fn decision_commands_link_to_their_decision() {
        let connections = infer_connections(&sample_history());
        assert!(connections.contains(&EventConnection::inferred(4, 5)));
        assert!(connections.contains(&EventConnection::inferred(4, 6)));
        assert!(connections.contains(&EventConnection::inferred(13, 14)));
    }

    #[test]
    fn unknown_types_have_no_inference() {
        let events = vec![
            event(1, ActivityTaskScheduled),
            event_ref(2, crate::event::EventType::from_name("Brand New"), "scheduledEventId", 1),
        ];
        assert!(infer_connections(&events).is_empty());
    }
}
