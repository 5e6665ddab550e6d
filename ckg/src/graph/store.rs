use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::db::{GraphBackend, Neighbor};
use crate::error::{CkgError, Result};
use crate::models::{
    DependencyGraph, Direction, GraphEdge, GraphNode, NodeType, Relationship,
};

/// Read/write facade over the graph tables. Callers never touch the
/// backend directly; batch writes stay atomic at the repository level.
#[derive(Clone)]
pub struct GraphService {
    db: Arc<dyn GraphBackend>,
}

impl GraphService {
    pub fn new(db: Arc<dyn GraphBackend>) -> Self {
        Self { db }
    }

    pub async fn upsert_nodes(&self, nodes: &[GraphNode]) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }
        debug!(count = nodes.len(), "upserting graph nodes");
        self.db.upsert_nodes_batch(nodes).await
    }

    pub async fn upsert_edges(&self, edges: &[GraphEdge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }
        debug!(count = edges.len(), "upserting graph edges");
        self.db.upsert_edges_batch(edges).await
    }

    pub async fn get_node(&self, id: &str) -> Result<Option<GraphNode>> {
        self.db.get_node(id).await
    }

    pub async fn find_node(
        &self,
        name: &str,
        node_type: Option<NodeType>,
        project_id: &str,
    ) -> Result<Vec<GraphNode>> {
        self.db.find_node(name, node_type, project_id).await
    }

    pub async fn find_nodes_by_type(
        &self,
        node_type: Option<NodeType>,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>> {
        self.db.find_nodes_by_type(node_type, project_id, limit).await
    }

    pub async fn find_nodes_by_path(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Vec<GraphNode>> {
        self.db.find_nodes_by_path(project_id, path).await
    }

    pub async fn get_neighbors(
        &self,
        node_id: &str,
        relationship: Option<Relationship>,
        direction: Direction,
    ) -> Result<Vec<Neighbor>> {
        self.db.get_neighbors(node_id, relationship, direction).await
    }

    /// Walks outgoing `imports` edges breadth-first from the file node at
    /// `path`, collecting the reachable subgraph up to `max_depth` hops.
    pub async fn get_dependency_graph(
        &self,
        project_id: &str,
        path: &str,
        max_depth: u32,
    ) -> Result<DependencyGraph> {
        let roots = self.db.find_nodes_by_path(project_id, path).await?;
        let root = roots
            .into_iter()
            .find(|n| n.node_type == NodeType::File)
            .ok_or_else(|| CkgError::NotFound(format!("file node for path '{path}'")))?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut edges: Vec<GraphEdge> = Vec::new();
        let mut queue: VecDeque<(GraphNode, u32)> = VecDeque::new();

        visited.insert(root.id.clone());
        queue.push_back((root, 0));

        while let Some((node, depth)) = queue.pop_front() {
            let node_id = node.id.clone();
            nodes.push(node);
            if depth >= max_depth {
                continue;
            }

            let neighbors = self
                .db
                .get_neighbors(&node_id, Some(Relationship::Imports), Direction::Outgoing)
                .await?;

            for Neighbor { edge, node } in neighbors {
                edges.push(edge);
                if visited.insert(node.id.clone()) {
                    queue.push_back((node, depth + 1));
                }
            }
        }

        Ok(DependencyGraph { nodes, edges })
    }

    pub async fn delete_node(&self, id: &str) -> Result<bool> {
        self.db.delete_node(id).await
    }

    /// Removes every node, edge, chunk, embedding, diagnostic and
    /// reference belonging to the project. Returns deleted node count.
    pub async fn clear_project(&self, project_id: &str) -> Result<u64> {
        let deleted = self.db.clear_project(project_id).await?;
        debug!(project_id, deleted, "cleared project graph");
        Ok(deleted)
    }
}
