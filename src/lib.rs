//! wfgraph - workflow history event graph
//!
//! Turns a workflow execution history into a directed event graph
//! (chronological + inferred causal edges), lays it out, and provides the
//! viewport helpers a renderer needs.

pub mod cluster;
pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod graph;

pub use cluster::{ClusterSnapshot, ClusterView};
pub use config::GraphConfig;
pub use domain::{get_status, is_history_archival_enabled, is_visibility_archival_enabled, DomainSettings, StatusOption};
pub use error::{FixSuggestion, GraphError, Result};
pub use event::{EventId, EventType, History, MalformedEvent, WorkflowEvent};
pub use graph::{
    arrange_graph, graph_pan_center, select_node, ConnectionKind, EventConnection, Graph,
    GraphBuilder, GraphNode, GraphView, LayoutConfig, LayoutDirection, Point, ThreadKey, Viewport,
};
