//! Event graph built from a workflow history
//!
//! Nodes are events; edges are either chronological (next event in the same
//! thread) or inferred from back-reference attributes. The graph is an
//! immutable value, rebuilt from scratch for every history snapshot.
//!
//! Pipeline: `infer_connections` → `assign_children` → `arrange_graph`
//! (layout engine) → `graph_pan_center` / `select_node`.

mod arrange;
mod children;
mod connections;
pub mod layout;
mod view;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;

use crate::event::{EventId, EventType, WorkflowEvent};

pub use arrange::{arrange_graph, GraphBuilder};
pub use children::{assign_children, ChildAssignment, NodeChildren};
pub use connections::{infer_connections, resolve_reference};
pub use layout::{
    Bounds, LayeredLayout, Layout, LayoutConfig, LayoutDirection, LayoutEngine, LayoutNode,
    NodePosition,
};
pub use view::{graph_pan_center, select_node, GraphView, Viewport};

/// Stack-allocated child lists: most events have 0-2 children
pub type ChildVec<T> = SmallVec<[T; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Chronological,
    Inferred,
}

/// Directed edge between two events (`from` is always the earlier id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventConnection {
    pub from: EventId,
    pub to: EventId,
    pub kind: ConnectionKind,
}

impl EventConnection {
    pub fn chronological(from: EventId, to: EventId) -> Self {
        Self { from, to, kind: ConnectionKind::Chronological }
    }

    pub fn inferred(from: EventId, to: EventId) -> Self {
        Self { from, to, kind: ConnectionKind::Inferred }
    }

    pub fn touches(&self, id: EventId) -> bool {
        self.from == id || self.to == id
    }
}

/// Logical sub-sequence of related events
///
/// `Spawned(id)` is the thread opened by initiating event `id`
/// (an activity, decision task, timer, child workflow or external request).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadKey {
    Root,
    Spawned(EventId),
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Spawned(id) => write!(f, "#{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Next event of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChronologicalChild {
    pub thread: ThreadKey,
    pub id: EventId,
}

/// Event plus its graph relations and layout position
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub event: Arc<WorkflowEvent>,
    /// Thread the event belongs to
    pub thread: ThreadKey,
    /// Thread the event opens, for initiating events
    pub opens: Option<ThreadKey>,
    /// Node center
    pub position: Point,
    pub chronological_children: ChildVec<ChronologicalChild>,
    pub inferred_children: ChildVec<EventId>,
    /// Threads in which this node is the last event
    pub terminal_in: ChildVec<ThreadKey>,
}

impl GraphNode {
    #[inline]
    pub fn id(&self) -> EventId {
        self.event.id
    }

    #[inline]
    pub fn event_type(&self) -> &EventType {
        &self.event.event_type
    }

    pub fn is_terminal(&self, thread: ThreadKey) -> bool {
        self.terminal_in.contains(&thread)
    }

    /// Chronological child within one thread
    pub fn chronological_child(&self, thread: ThreadKey) -> Option<EventId> {
        self.chronological_children
            .iter()
            .find(|c| c.thread == thread)
            .map(|c| c.id)
    }
}

/// Arranged event graph
#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    connections: Vec<EventConnection>,
    root: Option<EventId>,
    direction: LayoutDirection,
    bounds: Bounds,
    #[serde(skip)]
    index: FxHashMap<EventId, usize>,
}

impl Graph {
    pub(crate) fn new(
        nodes: Vec<GraphNode>,
        connections: Vec<EventConnection>,
        root: Option<EventId>,
        direction: LayoutDirection,
        bounds: Bounds,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(pos, node)| (node.id(), pos))
            .collect();
        Self { nodes, connections, root, direction, bounds, index }
    }

    pub fn node(&self, id: EventId) -> Option<&GraphNode> {
        self.index.get(&id).map(|&pos| &self.nodes[pos])
    }

    #[inline]
    pub fn contains(&self, id: EventId) -> bool {
        self.index.contains_key(&id)
    }

    /// Nodes in event id order
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Deduplicated edge set, ordered by (from, to, kind)
    pub fn connections(&self) -> &[EventConnection] {
        &self.connections
    }

    pub fn root(&self) -> Option<EventId> {
        self.root
    }

    pub fn direction(&self) -> LayoutDirection {
        self.direction
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn incoming(&self, id: EventId) -> impl Iterator<Item = &EventConnection> {
        self.connections.iter().filter(move |c| c.to == id)
    }

    pub fn outgoing(&self, id: EventId) -> impl Iterator<Item = &EventConnection> {
        self.connections.iter().filter(move |c| c.from == id)
    }

    pub fn connections_of_kind(&self, kind: ConnectionKind) -> impl Iterator<Item = &EventConnection> {
        self.connections.iter().filter(move |c| c.kind == kind)
    }

    /// Members of every thread, in id order
    pub fn threads(&self) -> BTreeMap<ThreadKey, Vec<EventId>> {
        let mut threads: BTreeMap<ThreadKey, Vec<EventId>> = BTreeMap::new();
        for node in &self.nodes {
            threads.entry(node.thread).or_default().push(node.id());
            if let Some(opened) = node.opens {
                threads.entry(opened).or_default().push(node.id());
            }
        }
        for members in threads.values_mut() {
            members.sort_unstable();
            members.dedup();
        }
        threads
    }

    /// Start a selection view (nothing selected)
    pub fn view(&self) -> GraphView<'_> {
        GraphView::new(self)
    }

    pub fn select_node(&self, id: EventId) -> GraphView<'_> {
        select_node(self, id)
    }
}

/// Events sorted by id, later duplicates of an id dropped
pub(crate) fn ordered_events(events: &[WorkflowEvent]) -> Vec<&WorkflowEvent> {
    let mut seen: FxHashSet<EventId> = FxHashSet::default();
    let mut ordered: Vec<&WorkflowEvent> = events.iter().filter(|e| seen.insert(e.id)).collect();
    ordered.sort_by_key(|e| e.id);
    ordered
}
