//! Graph arrangement: node/edge assembly + layout engine invocation

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::info;

use super::{
    assign_children, infer_connections, ordered_events, ChildAssignment, ChildVec,
    EventConnection, Graph, GraphNode, LayeredLayout, LayoutConfig, LayoutEngine, LayoutNode,
    ThreadKey,
};
use crate::event::{EventId, WorkflowEvent};

/// Builds [`Graph`] values from event lists
///
/// Holds only configuration; every `build` starts from scratch.
pub struct GraphBuilder {
    config: LayoutConfig,
    engine: Box<dyn LayoutEngine>,
}

impl GraphBuilder {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            engine: Box::new(LayeredLayout),
        }
    }

    /// Replace the layout engine
    pub fn with_engine(mut self, engine: impl LayoutEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn infer_connections(&self, events: &[WorkflowEvent]) -> Vec<EventConnection> {
        infer_connections(events)
    }

    pub fn assign_children(&self, events: &[WorkflowEvent]) -> ChildAssignment {
        assign_children(events, &infer_connections(events))
    }

    /// Assemble nodes and edges, then lay them out
    pub fn build(&self, events: &[WorkflowEvent]) -> Graph {
        let ordered = ordered_events(events);
        let assignment = self.assign_children(events);

        let mut dependencies: FxHashMap<EventId, ChildVec<EventId>> = FxHashMap::default();
        for connection in &assignment.connections {
            let deps = dependencies.entry(connection.to).or_default();
            if !deps.contains(&connection.from) {
                deps.push(connection.from);
            }
        }

        let layout_nodes: Vec<LayoutNode> = ordered
            .iter()
            .map(|event| {
                LayoutNode::new(event.id)
                    .with_dependencies(dependencies.remove(&event.id).unwrap_or_default())
            })
            .collect();

        let layout = self.engine.layout(&layout_nodes, &self.config);

        let nodes: Vec<GraphNode> = ordered
            .into_iter()
            .zip(assignment.nodes)
            .map(|(event, children)| GraphNode {
                position: layout.get(event.id).map(|p| p.center).unwrap_or_default(),
                event: Arc::new(event.clone()),
                thread: children.thread,
                opens: children.opens,
                chronological_children: children.chronological_children,
                inferred_children: children.inferred_children,
                terminal_in: children.terminal_in,
            })
            .collect();

        let root = nodes
            .iter()
            .find(|n| n.thread == ThreadKey::Root)
            .or_else(|| nodes.first())
            .map(GraphNode::id);

        info!(
            nodes = nodes.len(),
            connections = assignment.connections.len(),
            layers = layout.layer_count(),
            engine = self.engine.name(),
            "arranged event graph"
        );

        Graph::new(
            nodes,
            assignment.connections,
            root,
            self.config.direction,
            layout.bounds(),
        )
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("config", &self.config)
            .field("engine", &self.engine.name())
            .finish()
    }
}

/// Build and lay out the event graph with the default engine
pub fn arrange_graph(events: &[WorkflowEvent], config: &LayoutConfig) -> Graph {
    GraphBuilder::new(config.clone()).build(events)
}
