use serde::{Deserialize, Serialize};

use super::{GraphEdge, GraphNode};

/// A project subgraph returned by dependency traversal.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Structural connectivity metrics for a project graph.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConnectivityReport {
    pub node_count: usize,
    pub edge_count: usize,
    pub average_degree: f64,
    pub isolated_count: usize,
    /// edge_count / (node_count * (node_count - 1)) for a directed graph.
    pub density: f64,
}

/// A node ranked by total (in + out) degree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedNode {
    pub node: GraphNode,
    pub in_degree: usize,
    pub out_degree: usize,
}

impl ConnectedNode {
    pub fn degree(&self) -> usize {
        self.in_degree + self.out_degree
    }
}

/// Output of symbol impact analysis: how risky is changing this symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub symbol: String,
    pub definitions: Vec<GraphNode>,
    pub reference_count: usize,
    /// Number of distinct files that reference the symbol.
    pub file_spread: usize,
    /// 1.0..=10.0, log-scaled on reference count.
    pub complexity: f32,
    pub recommendations: Vec<String>,
}

/// Graph-derived context returned alongside query results.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphInsights {
    pub related_symbols: Vec<String>,
    pub circular_dependencies: Vec<Vec<String>>,
    pub most_connected: Vec<String>,
}
