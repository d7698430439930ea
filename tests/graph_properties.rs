//! Property-based tests for graph arrangement
//!
//! Random histories: arbitrary event types with back-references that may
//! point backwards, forwards, or at ids that don't exist.

use std::collections::HashSet;

use chrono::DateTime;
use proptest::prelude::*;
use wfgraph::{
    arrange_graph, graph_pan_center, ConnectionKind, EventType, Graph, LayoutConfig,
    LayoutDirection, Viewport, WorkflowEvent,
};

const TYPES: &[EventType] = &[
    EventType::WorkflowExecutionStarted,
    EventType::DecisionTaskScheduled,
    EventType::DecisionTaskStarted,
    EventType::DecisionTaskCompleted,
    EventType::ActivityTaskScheduled,
    EventType::ActivityTaskStarted,
    EventType::ActivityTaskCompleted,
    EventType::TimerStarted,
    EventType::TimerFired,
    EventType::StartChildWorkflowExecutionInitiated,
    EventType::ChildWorkflowExecutionStarted,
    EventType::WorkflowExecutionSignaled,
    EventType::MarkerRecorded,
];

const KEYS: &[&str] = &[
    "scheduledEventId",
    "startedEventId",
    "initiatedEventId",
    "decisionTaskCompletedEventId",
];

prop_compose! {
    /// One event: type index plus up to two (key, target) references
    fn arb_event_spec()(
        ty in 0..TYPES.len(),
        refs in prop::collection::vec((0..KEYS.len(), 0u64..50), 0..=2)
    ) -> (usize, Vec<(usize, u64)>) {
        (ty, refs)
    }
}

prop_compose! {
    fn arb_history()(specs in prop::collection::vec(arb_event_spec(), 0..40)) -> Vec<WorkflowEvent> {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (ty, refs))| {
                let id = i as u64 + 1;
                let timestamp = DateTime::from_timestamp(1_700_000_000 + id as i64, 0).unwrap();
                refs.into_iter().fold(
                    WorkflowEvent::new(id, timestamp, TYPES[ty].clone()),
                    |event, (key, target)| event.with_attribute(KEYS[key], target),
                )
            })
            .collect()
    }
}

fn topology(graph: &Graph) -> serde_json::Value {
    serde_json::to_value(graph).unwrap()
}

proptest! {
    /// Property: every connection joins two existing nodes, earlier to later
    #[test]
    fn test_no_dangling_connections(events in arb_history()) {
        let graph = arrange_graph(&events, &LayoutConfig::default());
        prop_assert_eq!(graph.len(), events.len());
        for c in graph.connections() {
            prop_assert!(graph.contains(c.from));
            prop_assert!(graph.contains(c.to));
            prop_assert!(c.from < c.to);
        }
    }

    /// Property: only the root lacks an incoming edge
    #[test]
    fn test_every_non_root_node_is_reachable(events in arb_history()) {
        let graph = arrange_graph(&events, &LayoutConfig::default());
        for node in graph.nodes() {
            let incoming = graph.incoming(node.id()).count();
            if Some(node.id()) == graph.root() {
                prop_assert_eq!(incoming, 0);
            } else {
                prop_assert!(incoming >= 1, "node {} has no incoming edge", node.id());
            }
        }
    }

    /// Property: at most one chronological parent, and one child per thread
    #[test]
    fn test_chronological_edges_form_thread_chains(events in arb_history()) {
        let graph = arrange_graph(&events, &LayoutConfig::default());
        for node in graph.nodes() {
            let parents = graph
                .incoming(node.id())
                .filter(|c| c.kind == ConnectionKind::Chronological)
                .count();
            prop_assert!(parents <= 1);

            let threads: HashSet<_> = node.chronological_children.iter().map(|c| c.thread).collect();
            prop_assert_eq!(threads.len(), node.chronological_children.len());
        }

        for members in graph.threads().values() {
            for pair in members.windows(2) {
                let linked = graph
                    .outgoing(pair[0])
                    .any(|c| c.to == pair[1] && c.kind == ConnectionKind::Chronological);
                prop_assert!(linked, "thread skips from {} to {}", pair[0], pair[1]);
            }
        }
    }

    /// Property: a (from, to) pair is never emitted twice
    #[test]
    fn test_no_duplicate_pairs(events in arb_history()) {
        let graph = arrange_graph(&events, &LayoutConfig::default());
        let pairs: HashSet<_> = graph.connections().iter().map(|c| (c.from, c.to)).collect();
        prop_assert_eq!(pairs.len(), graph.connections().len());
    }

    /// Property: same input and config give the same graph
    #[test]
    fn test_arrangement_is_deterministic(events in arb_history(), lr in any::<bool>()) {
        let config = LayoutConfig {
            direction: if lr { LayoutDirection::LeftToRight } else { LayoutDirection::TopToBottom },
            ..Default::default()
        };
        let first = arrange_graph(&events, &config);

        let mut shuffled = events.clone();
        shuffled.reverse();
        let second = arrange_graph(&shuffled, &config);

        prop_assert_eq!(topology(&first), topology(&second));
    }

    /// Property: selection flags exactly one node and leaves the graph alone
    #[test]
    fn test_selection_is_exclusive(events in arb_history(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!events.is_empty());
        let graph = arrange_graph(&events, &LayoutConfig::default());
        let before = topology(&graph);

        let id = events[pick.index(events.len())].id;
        let view = graph.select_node(id);
        let selected: Vec<_> = view.nodes().filter(|(_, s)| *s).map(|(n, _)| n.id()).collect();
        prop_assert_eq!(selected, vec![id]);
        prop_assert_eq!(topology(&graph), before);
    }

    /// Property: centering a node maps its position to the viewport middle
    #[test]
    fn test_pan_center_inverts_position(
        events in arb_history(),
        width in 100.0f64..4000.0,
        height in 100.0f64..4000.0,
        zoom in 0.1f64..4.0,
    ) {
        let graph = arrange_graph(&events, &LayoutConfig::default());
        let viewport = Viewport::new(width, height).with_zoom(zoom);
        for node in graph.nodes() {
            let pan = graph_pan_center(&graph, node.id(), &viewport).unwrap();
            let screen_x = node.position.x * zoom + pan.x;
            let screen_y = node.position.y * zoom + pan.y;
            prop_assert!((screen_x - width / 2.0).abs() < 1e-6);
            prop_assert!((screen_y - height / 2.0).abs() < 1e-6);
        }
        prop_assert!(graph_pan_center(&graph, 10_000, &viewport).is_none());
    }
}
