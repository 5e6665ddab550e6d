use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::db::{GraphBackend, Neighbor};
use crate::error::Result;
use crate::models::{
    ConnectedNode, ConnectivityReport, Direction, GraphInsights, NodeType, Relationship,
};

/// Whole-project graph analysis: cycles, connectivity and hub detection.
#[derive(Clone)]
pub struct GraphAnalytics {
    db: Arc<dyn GraphBackend>,
}

impl GraphAnalytics {
    pub fn new(db: Arc<dyn GraphBackend>) -> Self {
        Self { db }
    }

    /// Detects import cycles between file nodes. Each cycle is reported
    /// once as the ordered list of file paths along it, starting at the
    /// smallest member; the closing edge back to the start is implied.
    pub async fn find_circular_dependencies(&self, project_id: &str) -> Result<Vec<Vec<String>>> {
        let edges = self
            .db
            .get_edges_by_project(project_id, Some(Relationship::Imports))
            .await?;

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &edges {
            adjacency
                .entry(edge.source_id.as_str())
                .or_default()
                .push(edge.target_id.as_str());
        }

        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut seen_cycles: HashSet<Vec<&str>> = HashSet::new();

        for &start in adjacency.keys() {
            if visited.contains(start) {
                continue;
            }
            let mut stack: Vec<&str> = Vec::new();
            let mut on_stack: HashSet<&str> = HashSet::new();
            Self::dfs_cycles(
                start,
                &adjacency,
                &mut visited,
                &mut stack,
                &mut on_stack,
                &mut seen_cycles,
            );
        }

        if seen_cycles.is_empty() {
            return Ok(cycles);
        }

        // Cycles carry node ids; report them as paths.
        let ids: Vec<String> = seen_cycles
            .iter()
            .flatten()
            .map(|id| id.to_string())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let nodes = self.db.get_nodes_by_ids(&ids).await?;
        let paths: HashMap<&str, &str> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.path.as_str()))
            .collect();

        for cycle in seen_cycles {
            let named: Vec<String> = cycle
                .iter()
                .map(|id| paths.get(id).unwrap_or(id).to_string())
                .collect();
            cycles.push(named);
        }
        cycles.sort();

        debug!(project_id, count = cycles.len(), "circular dependency scan");
        Ok(cycles)
    }

    fn dfs_cycles<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        cycles: &mut HashSet<Vec<&'a str>>,
    ) {
        visited.insert(node);
        stack.push(node);
        on_stack.insert(node);

        if let Some(targets) = adjacency.get(node) {
            for &target in targets {
                if on_stack.contains(target) {
                    if let Some(pos) = stack.iter().position(|&n| n == target) {
                        let cycle = Self::canonical_cycle(&stack[pos..]);
                        cycles.insert(cycle);
                    }
                } else if !visited.contains(target) {
                    Self::dfs_cycles(target, adjacency, visited, stack, on_stack, cycles);
                }
            }
        }

        stack.pop();
        on_stack.remove(node);
    }

    // Rotate so the smallest id leads, deduplicating rotations of one cycle.
    fn canonical_cycle<'a>(cycle: &[&'a str]) -> Vec<&'a str> {
        let min_pos = cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let mut rotated = Vec::with_capacity(cycle.len());
        rotated.extend_from_slice(&cycle[min_pos..]);
        rotated.extend_from_slice(&cycle[..min_pos]);
        rotated
    }

    pub async fn analyze_connectivity(&self, project_id: &str) -> Result<ConnectivityReport> {
        let nodes = self
            .db
            .find_nodes_by_type(None, project_id, 100_000)
            .await?;
        let edges = self.db.get_edges_by_project(project_id, None).await?;

        let node_count = nodes.len();
        let edge_count = edges.len();

        let mut connected: HashSet<&str> = HashSet::new();
        for edge in &edges {
            connected.insert(edge.source_id.as_str());
            connected.insert(edge.target_id.as_str());
        }
        let isolated_count = nodes
            .iter()
            .filter(|n| !connected.contains(n.id.as_str()))
            .count();

        let average_degree = if node_count == 0 {
            0.0
        } else {
            (edge_count as f64 * 2.0) / node_count as f64
        };
        // Directed density: edges over the n*(n-1) possible ordered pairs.
        let density = if node_count < 2 {
            0.0
        } else {
            edge_count as f64 / (node_count as f64 * (node_count as f64 - 1.0))
        };

        Ok(ConnectivityReport {
            node_count,
            edge_count,
            average_degree,
            isolated_count,
            density,
        })
    }

    pub async fn most_connected_nodes(
        &self,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<ConnectedNode>> {
        self.db.most_connected_nodes(project_id, limit).await
    }

    /// Insights bundle attached to context responses: symbols one hop out
    /// from the focus node, import cycles, and project hubs.
    pub async fn build_insights(
        &self,
        project_id: &str,
        focus_node_id: Option<&str>,
    ) -> Result<GraphInsights> {
        let mut related_symbols = Vec::new();
        if let Some(node_id) = focus_node_id {
            let neighbors = self
                .db
                .get_neighbors(node_id, None, Direction::Both)
                .await?;
            let mut seen = HashSet::new();
            for Neighbor { node, .. } in neighbors {
                if node.node_type != NodeType::File && seen.insert(node.name.clone()) {
                    related_symbols.push(node.name);
                }
            }
        }

        let circular_dependencies = self.find_circular_dependencies(project_id).await?;
        let most_connected = self
            .most_connected_nodes(project_id, 5)
            .await?
            .into_iter()
            .map(|c| c.node.name)
            .collect();

        Ok(GraphInsights {
            related_symbols,
            circular_dependencies,
            most_connected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_cycle_rotates_to_smallest_id() {
        let cycle = vec!["c", "a", "b"];
        assert_eq!(GraphAnalytics::canonical_cycle(&cycle), vec!["a", "b", "c"]);
    }

    #[test]
    fn canonical_cycle_single_node() {
        let cycle = vec!["x"];
        assert_eq!(GraphAnalytics::canonical_cycle(&cycle), vec!["x"]);
    }
}
