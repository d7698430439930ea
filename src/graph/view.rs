//! Viewport helpers: pan-center and single-node selection

use serde::{Deserialize, Serialize};

use super::{EventConnection, Graph, GraphNode, Point};
use crate::event::EventId;

/// Visible area of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, zoom: 1.0 }
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Pan offset that puts `node_id` in the middle of the viewport
///
/// Formula: `pan = viewport_center - node_center * zoom`
pub fn graph_pan_center(graph: &Graph, node_id: EventId, viewport: &Viewport) -> Option<Point> {
    let center = graph.node(node_id)?.position;
    Some(Point::new(
        viewport.width / 2.0 - center.x * viewport.zoom,
        viewport.height / 2.0 - center.y * viewport.zoom,
    ))
}

/// Graph annotated with the current selection
///
/// Selecting returns a new view; the graph itself is never touched.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphView<'g> {
    #[serde(flatten)]
    graph: &'g Graph,
    selected: Option<EventId>,
}

impl<'g> GraphView<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph, selected: None }
    }

    /// Select `node_id`, dropping any previous selection.
    /// Unknown ids leave nothing selected.
    pub fn select_node(&self, node_id: EventId) -> GraphView<'g> {
        GraphView {
            graph: self.graph,
            selected: self.graph.contains(node_id).then_some(node_id),
        }
    }

    pub fn clear_selection(&self) -> GraphView<'g> {
        GraphView::new(self.graph)
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn selected(&self) -> Option<EventId> {
        self.selected
    }

    pub fn selected_node(&self) -> Option<&'g GraphNode> {
        self.selected.and_then(|id| self.graph.node(id))
    }

    pub fn is_selected(&self, node_id: EventId) -> bool {
        self.selected == Some(node_id)
    }

    /// Nodes with their selection flag
    pub fn nodes(&self) -> impl Iterator<Item = (&'g GraphNode, bool)> + '_ {
        self.graph
            .nodes()
            .iter()
            .map(move |node| (node, self.is_selected(node.id())))
    }

    /// Connections touching the selected node
    pub fn highlighted_connections(&self) -> impl Iterator<Item = &'g EventConnection> + '_ {
        self.graph
            .connections()
            .iter()
            .filter(move |c| self.selected.is_some_and(|id| c.touches(id)))
    }

    /// Pan offset for the selected node
    pub fn pan_center(&self, viewport: &Viewport) -> Option<Point> {
        self.selected
            .and_then(|id| graph_pan_center(self.graph, id, viewport))
    }
}

/// Fresh view of `graph` with only `node_id` selected
pub fn select_node(graph: &Graph, node_id: EventId) -> GraphView<'_> {
    GraphView::new(graph).select_node(node_id)
}
