//! Layered DAG layout
//!
//! Sugiyama-style hierarchical layout for the event graph.
//!
//! Algorithm steps:
//! 1. Topological sort to assign layers (longest path from a source)
//! 2. Order nodes within each layer (barycenter, initial order by id)
//! 3. Compute node centers from spacing config, each layer centered
//!
//! Event graphs are acyclic by construction (edges always point to a
//! larger id), so Kahn's algorithm visits every node.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::{ChildVec, Point};
use crate::error::GraphError;
use crate::event::EventId;

/// Flow direction of the layered layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[default]
    #[serde(rename = "tb", alias = "TB", alias = "top-to-bottom")]
    TopToBottom,
    #[serde(rename = "lr", alias = "LR", alias = "left-to-right")]
    LeftToRight,
}

impl FromStr for LayoutDirection {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tb" | "top-to-bottom" => Ok(Self::TopToBottom),
            "lr" | "left-to-right" => Ok(Self::LeftToRight),
            _ => Err(GraphError::InvalidDirection { value: value.to_string() }),
        }
    }
}

impl fmt::Display for LayoutDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopToBottom => f.write_str("tb"),
            Self::LeftToRight => f.write_str("lr"),
        }
    }
}

/// Layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between neighbours in the same layer
    pub node_spacing: f64,
    /// Gap between consecutive layers
    pub rank_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::TopToBottom,
            node_width: 180.0,
            node_height: 48.0,
            node_spacing: 40.0,
            rank_spacing: 64.0,
        }
    }
}

/// Node information for layout computation
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: EventId,
    /// Predecessor node ids
    pub dependencies: ChildVec<EventId>,
}

impl LayoutNode {
    pub fn new(id: EventId) -> Self {
        Self { id, dependencies: ChildVec::new() }
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = EventId>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }
}

/// Extent of the laid-out graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

/// Position of a node in the layout
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodePosition {
    /// Layer (0 = first rank)
    pub layer: usize,
    /// Order within layer
    pub order: usize,
    pub center: Point,
}

/// Computed layout with node positions
#[derive(Debug, Clone, Default)]
pub struct Layout {
    positions: FxHashMap<EventId, NodePosition>,
    layers: Vec<Vec<EventId>>,
    bounds: Bounds,
}

impl Layout {
    /// Empty layout for engines to fill with [`Layout::place`]
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds, ..Self::default() }
    }

    /// Place a node; it is appended to `position.layer`
    pub fn place(&mut self, id: EventId, position: NodePosition) {
        if self.layers.len() <= position.layer {
            self.layers.resize_with(position.layer + 1, Vec::new);
        }
        self.layers[position.layer].push(id);
        self.positions.insert(id, position);
    }

    pub fn get(&self, id: EventId) -> Option<&NodePosition> {
        self.positions.get(&id)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Iterate over layers (each layer is a vec of node ids, in order)
    pub fn layers(&self) -> impl Iterator<Item = &Vec<EventId>> {
        self.layers.iter()
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

/// Geometric placement of graph nodes
///
/// Implementations must be deterministic: the same nodes and config give
/// the same positions.
pub trait LayoutEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn layout(&self, nodes: &[LayoutNode], config: &LayoutConfig) -> Layout;
}

/// Default engine: longest-path layering + barycenter ordering
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredLayout;

impl LayoutEngine for LayeredLayout {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn layout(&self, nodes: &[LayoutNode], config: &LayoutConfig) -> Layout {
        if nodes.is_empty() {
            return Layout::default();
        }

        let nodes = Self::known_dependencies_only(nodes);

        // Step 1: Assign layers via topological sort
        let layer_assignments = Self::assign_layers(&nodes);

        // Step 2: Order nodes within each layer
        let layers = Self::order_within_layers(&nodes, &layer_assignments);

        // Step 3: Compute positions
        let (positions, bounds) = Self::compute_positions(&layers, config);

        Layout { positions, layers, bounds }
    }
}

impl LayeredLayout {
    const BARYCENTER_PASSES: usize = 4;

    /// Sorted by id, dangling dependencies removed
    fn known_dependencies_only(nodes: &[LayoutNode]) -> Vec<LayoutNode> {
        let known: FxHashSet<EventId> = nodes.iter().map(|n| n.id).collect();
        let mut cleaned: Vec<LayoutNode> = nodes
            .iter()
            .map(|n| {
                LayoutNode::new(n.id).with_dependencies(
                    n.dependencies
                        .iter()
                        .copied()
                        .filter(|dep| *dep != n.id && known.contains(dep)),
                )
            })
            .collect();
        cleaned.sort_by_key(|n| n.id);
        cleaned
    }

    /// Each node is assigned to layer = max(predecessor layers) + 1.
    /// Roots (no dependencies) are assigned to layer 0.
    fn assign_layers(nodes: &[LayoutNode]) -> FxHashMap<EventId, usize> {
        let mut layers: FxHashMap<EventId, usize> = FxHashMap::default();
        let mut in_degree: FxHashMap<EventId, usize> = FxHashMap::default();
        let mut successors: FxHashMap<EventId, Vec<EventId>> = FxHashMap::default();

        for node in nodes {
            in_degree.entry(node.id).or_insert(0);
            successors.entry(node.id).or_default();

            for &dep in &node.dependencies {
                *in_degree.entry(node.id).or_insert(0) += 1;
                successors.entry(dep).or_default().push(node.id);
            }
        }

        // Kahn's algorithm with layer tracking
        let mut queue: VecDeque<EventId> = VecDeque::new();

        for node in nodes {
            if node.dependencies.is_empty() {
                queue.push_back(node.id);
                layers.insert(node.id, 0);
            }
        }

        while let Some(current) = queue.pop_front() {
            let current_layer = layers.get(&current).copied().unwrap_or(0);

            if let Some(succs) = successors.get(&current) {
                for &succ in succs {
                    let succ_layer = layers.entry(succ).or_insert(0);
                    *succ_layer = (*succ_layer).max(current_layer + 1);

                    if let Some(deg) = in_degree.get_mut(&succ) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            queue.push_back(succ);
                        }
                    }
                }
            }
        }

        for node in nodes {
            layers.entry(node.id).or_insert(0);
        }

        layers
    }

    /// Order nodes within each layer using the barycenter method
    fn order_within_layers(
        nodes: &[LayoutNode],
        layer_assignments: &FxHashMap<EventId, usize>,
    ) -> Vec<Vec<EventId>> {
        let max_layer = layer_assignments.values().copied().max().unwrap_or(0);
        let mut layers: Vec<Vec<EventId>> = vec![Vec::new(); max_layer + 1];

        // nodes are sorted by id, so initial order within a layer is by id
        for node in nodes {
            if let Some(&layer) = layer_assignments.get(&node.id) {
                layers[layer].push(node.id);
            }
        }

        let mut successors: FxHashMap<EventId, Vec<EventId>> = FxHashMap::default();
        let mut predecessors: FxHashMap<EventId, Vec<EventId>> = FxHashMap::default();

        for node in nodes {
            successors.entry(node.id).or_default();
            predecessors.entry(node.id).or_default();

            for &dep in &node.dependencies {
                successors.entry(dep).or_default().push(node.id);
                predecessors.entry(node.id).or_default().push(dep);
            }
        }

        for _ in 0..Self::BARYCENTER_PASSES {
            // Forward pass: order layers based on predecessor positions
            for layer_idx in 1..layers.len() {
                Self::order_layer_by_barycenter(&mut layers, layer_idx, &predecessors, true);
            }

            // Backward pass: order layers based on successor positions
            for layer_idx in (0..layers.len().saturating_sub(1)).rev() {
                Self::order_layer_by_barycenter(&mut layers, layer_idx, &successors, false);
            }
        }

        layers
    }

    /// Each node gets barycenter = average position of its neighbours in the
    /// adjacent layer; nodes without neighbours there keep their slot.
    fn order_layer_by_barycenter(
        layers: &mut [Vec<EventId>],
        layer_idx: usize,
        neighbors: &FxHashMap<EventId, Vec<EventId>>,
        use_prev_layer: bool,
    ) {
        let adjacent_layer_idx = if use_prev_layer {
            layer_idx.saturating_sub(1)
        } else {
            layer_idx.saturating_add(1)
        };

        if adjacent_layer_idx >= layers.len() || adjacent_layer_idx == layer_idx {
            return;
        }

        let adjacent_positions: FxHashMap<EventId, usize> = layers[adjacent_layer_idx]
            .iter()
            .enumerate()
            .map(|(pos, &id)| (id, pos))
            .collect();

        let mut barycenters: Vec<(EventId, f64)> = layers[layer_idx]
            .iter()
            .enumerate()
            .map(|(slot, &node_id)| {
                let neighbor_positions: Vec<usize> = neighbors
                    .get(&node_id)
                    .map(|n| {
                        n.iter()
                            .filter_map(|neighbor| adjacent_positions.get(neighbor).copied())
                            .collect()
                    })
                    .unwrap_or_default();

                let barycenter = if neighbor_positions.is_empty() {
                    slot as f64
                } else {
                    let sum: usize = neighbor_positions.iter().sum();
                    (sum as f64) / (neighbor_positions.len() as f64)
                };

                (node_id, barycenter)
            })
            .collect();

        // stable sort, ties keep the current order
        barycenters.sort_by(|a, b| a.1.total_cmp(&b.1));

        layers[layer_idx] = barycenters.into_iter().map(|(id, _)| id).collect();
    }

    /// Node centers; every layer is centered on the widest one
    fn compute_positions(
        layers: &[Vec<EventId>],
        config: &LayoutConfig,
    ) -> (FxHashMap<EventId, NodePosition>, Bounds) {
        let (rank_extent, cross_extent) = match config.direction {
            LayoutDirection::TopToBottom => (config.node_height, config.node_width),
            LayoutDirection::LeftToRight => (config.node_width, config.node_height),
        };

        let span = |count: usize| -> f64 {
            if count == 0 {
                0.0
            } else {
                count as f64 * cross_extent + (count - 1) as f64 * config.node_spacing
            }
        };

        let widest = layers.iter().map(Vec::len).max().unwrap_or(0);
        let cross_total = span(widest);
        let rank_total = if layers.is_empty() {
            0.0
        } else {
            layers.len() as f64 * rank_extent + (layers.len() - 1) as f64 * config.rank_spacing
        };

        let mut positions: FxHashMap<EventId, NodePosition> = FxHashMap::default();

        for (layer_idx, layer) in layers.iter().enumerate() {
            let rank = layer_idx as f64 * (rank_extent + config.rank_spacing) + rank_extent / 2.0;
            let offset = (cross_total - span(layer.len())) / 2.0;

            for (order, &node_id) in layer.iter().enumerate() {
                let cross =
                    offset + order as f64 * (cross_extent + config.node_spacing) + cross_extent / 2.0;

                let center = match config.direction {
                    LayoutDirection::TopToBottom => Point::new(cross, rank),
                    LayoutDirection::LeftToRight => Point::new(rank, cross),
                };

                positions.insert(node_id, NodePosition { layer: layer_idx, order, center });
            }
        }

        let bounds = match config.direction {
            LayoutDirection::TopToBottom => Bounds { width: cross_total, height: rank_total },
            LayoutDirection::LeftToRight => Bounds { width: rank_total, height: cross_total },
        };

        (positions, bounds)
    }
}
