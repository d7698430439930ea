//! Thread derivation and chronological / inferred children
//!
//! Thread rules:
//! - initiating events open `Spawned(own id)` and are its first member
//! - an event with a resolved membership reference joins the thread opened
//!   by the referenced event (or, failing that, the referenced event's thread)
//! - everything else belongs to `Root`
//!
//! Within a thread, consecutive members (by id) are linked chronologically.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    ordered_events, resolve_reference, ChildVec, ChronologicalChild, ConnectionKind,
    EventConnection, ThreadKey,
};
use crate::event::{EventId, WorkflowEvent};

/// Relations computed for one event
#[derive(Debug, Clone, PartialEq)]
pub struct NodeChildren {
    pub id: EventId,
    pub thread: ThreadKey,
    pub opens: Option<ThreadKey>,
    pub chronological_children: ChildVec<ChronologicalChild>,
    pub inferred_children: ChildVec<EventId>,
    pub terminal_in: ChildVec<ThreadKey>,
}

impl NodeChildren {
    fn new(id: EventId, thread: ThreadKey, opens: Option<ThreadKey>) -> Self {
        Self {
            id,
            thread,
            opens,
            chronological_children: ChildVec::new(),
            inferred_children: ChildVec::new(),
            terminal_in: ChildVec::new(),
        }
    }

    /// Next event in `thread`, if any
    pub fn chronological_child(&self, thread: ThreadKey) -> Option<EventId> {
        self.chronological_children
            .iter()
            .find(|c| c.thread == thread)
            .map(|c| c.id)
    }
}

/// Per-event relations plus the deduplicated edge set
#[derive(Debug, Clone, Default)]
pub struct ChildAssignment {
    /// In event id order
    pub nodes: Vec<NodeChildren>,
    /// Ordered by (from, to, kind)
    pub connections: Vec<EventConnection>,
}

impl ChildAssignment {
    pub fn node(&self, id: EventId) -> Option<&NodeChildren> {
        self.nodes
            .binary_search_by_key(&id, |n| n.id)
            .ok()
            .map(|pos| &self.nodes[pos])
    }
}

/// Partition each event's outgoing connections into chronological and
/// inferred children
///
/// An inferred connection that duplicates a chronological one (same
/// endpoints) is dropped; the chronological edge represents both.
pub fn assign_children(events: &[WorkflowEvent], inferred: &[EventConnection]) -> ChildAssignment {
    let ordered = ordered_events(events);
    let known: FxHashSet<EventId> = ordered.iter().map(|e| e.id).collect();

    let mut nodes: Vec<NodeChildren> = Vec::with_capacity(ordered.len());
    let mut position: FxHashMap<EventId, usize> =
        FxHashMap::with_capacity_and_hasher(ordered.len(), Default::default());
    let mut threads: BTreeMap<ThreadKey, Vec<EventId>> = BTreeMap::new();

    for event in &ordered {
        let membership = resolve_reference(event, event.event_type.membership_references(), &known);
        let thread = membership
            .and_then(|target| position.get(&target))
            .map(|&pos| {
                let referenced: &NodeChildren = &nodes[pos];
                referenced.opens.unwrap_or(referenced.thread)
            })
            .unwrap_or(ThreadKey::Root);
        let opens = event
            .event_type
            .opens_thread()
            .then_some(ThreadKey::Spawned(event.id));

        threads.entry(thread).or_default().push(event.id);
        if let Some(opened) = opens {
            threads.entry(opened).or_default().push(event.id);
        }

        position.insert(event.id, nodes.len());
        nodes.push(NodeChildren::new(event.id, thread, opens));
    }

    let mut connections: Vec<EventConnection> = Vec::with_capacity(ordered.len() * 2);

    for (&thread, members) in &threads {
        for pair in members.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            connections.push(EventConnection::chronological(from, to));
            nodes[position[&from]]
                .chronological_children
                .push(ChronologicalChild { thread, id: to });
        }
        if let Some(last) = members.last() {
            nodes[position[last]].terminal_in.push(thread);
        }
    }

    let chronological: FxHashSet<(EventId, EventId)> =
        connections.iter().map(|c| (c.from, c.to)).collect();

    for connection in inferred {
        if connection.kind != ConnectionKind::Inferred
            || chronological.contains(&(connection.from, connection.to))
        {
            continue;
        }
        let Some(&from_pos) = position.get(&connection.from) else {
            continue;
        };
        if connection.from >= connection.to || !known.contains(&connection.to) {
            continue;
        }
        let children = &mut nodes[from_pos].inferred_children;
        if !children.contains(&connection.to) {
            children.push(connection.to);
            connections.push(*connection);
        }
    }

    connections.sort_unstable();

    ChildAssignment { nodes, connections }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType::*;
    use crate::graph::infer_connections;
    use crate::graph::test_support::*;
    use pretty_assertions::assert_eq;

    fn assign(events: &[WorkflowEvent]) -> ChildAssignment {
        assign_children(events, &infer_connections(events))
    }

    #[test]
    fn activity_chain_dedups_inferred_edges() {
        let events = vec![
            event(1, ActivityTaskScheduled),
            event_ref(2, ActivityTaskStarted, "scheduledEventId", 1),
            event_ref(3, ActivityTaskCompleted, "startedEventId", 2),
        ];
        let assignment = assign(&events);

        // Raw inference sees 1→2 and 2→3; both coincide with the
        // chronological edges of thread #1 and are folded into them.
        assert_eq!(
            assignment.connections,
            vec![EventConnection::chronological(1, 2), EventConnection::chronological(2, 3)]
        );
        for node in &assignment.nodes {
            assert!(node.inferred_children.is_empty());
        }

        let scheduled = assignment.node(1).unwrap();
        assert_eq!(scheduled.thread, ThreadKey::Root);
        assert_eq!(scheduled.opens, Some(ThreadKey::Spawned(1)));
        assert_eq!(
            scheduled.chronological_children.as_slice(),
            &[ChronologicalChild { thread: ThreadKey::Spawned(1), id: 2 }]
        );
        // sole member of the root thread
        assert_eq!(scheduled.terminal_in.as_slice(), &[ThreadKey::Root]);

        let completed = assignment.node(3).unwrap();
        assert_eq!(completed.thread, ThreadKey::Spawned(1));
        assert!(completed.chronological_children.is_empty());
        assert_eq!(completed.terminal_in.as_slice(), &[ThreadKey::Spawned(1)]);
    }

    #[test]
    fn cross_thread_inference_becomes_inferred_child() {
        let assignment = assign(&sample_history());

        let decision = assignment.node(4).unwrap();
        assert_eq!(decision.thread, ThreadKey::Spawned(2));
        assert_eq!(decision.inferred_children.as_slice(), &[5, 6]);
        assert!(assignment.connections.contains(&EventConnection::inferred(4, 5)));

        // chronological root spine skips over thread members
        let started = assignment.node(1).unwrap();
        assert_eq!(started.chronological_child(ThreadKey::Root), Some(2));
        let decision_scheduled = assignment.node(2).unwrap();
        assert_eq!(decision_scheduled.chronological_child(ThreadKey::Root), Some(5));
        assert_eq!(decision_scheduled.chronological_child(ThreadKey::Spawned(2)), Some(3));
    }

    #[test]
    fn unresolved_event_falls_back_to_root() {
        let events = vec![
            event(1, WorkflowExecutionStarted),
            event_ref(2, ActivityTaskStarted, "scheduledEventId", 99),
        ];
        let assignment = assign(&events);
        assert_eq!(assignment.node(2).unwrap().thread, ThreadKey::Root);
        assert_eq!(assignment.connections, vec![EventConnection::chronological(1, 2)]);
    }

    #[test]
    fn one_chronological_child_per_thread() {
        let assignment = assign(&sample_history());
        for node in &assignment.nodes {
            let mut seen = FxHashSet::default();
            for child in &node.chronological_children {
                assert!(seen.insert(child.thread), "node {} has two children in {}", node.id, child.thread);
            }
        }
    }

    #[test]
    fn empty_input() {
        let assignment = assign(&[]);
        assert!(assignment.nodes.is_empty());
        assert!(assignment.connections.is_empty());
    }
}
