mod common;

use std::sync::Arc;

use common::setup_backend;

use ckg::graph::{GraphAnalytics, GraphService};
use ckg::models::{
    ChunkEmbedding, ChunkType, CodeChunk, Diagnostic, Direction, GraphEdge, GraphNode, NodeType,
    ReferenceType, Relationship, Severity, SymbolReference,
};

const PROJECT: &str = "proj-graph";

fn file(path: &str) -> GraphNode {
    GraphNode::new(PROJECT, NodeType::File, path, path)
}

fn function(name: &str, path: &str) -> GraphNode {
    GraphNode::new(PROJECT, NodeType::Function, name, path)
}

#[tokio::test]
async fn upsert_and_lookup_nodes() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));

    let parse = function("parse", "src/parser.ts");
    graph
        .upsert_nodes(&[parse.clone(), function("render", "src/render.ts")])
        .await
        .unwrap();

    let found = graph
        .find_node("parse", Some(NodeType::Function), PROJECT)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, parse.id);

    let by_path = graph
        .find_nodes_by_path(PROJECT, "src/render.ts")
        .await
        .unwrap();
    assert_eq!(by_path.len(), 1);
    assert_eq!(by_path[0].name, "render");
}

#[tokio::test]
async fn edge_endpoints_are_validated() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));

    let a = file("a.ts");
    graph.upsert_nodes(&[a.clone()]).await.unwrap();

    let dangling = GraphEdge::new(PROJECT, &a.id, "missing-node", Relationship::Imports);
    let err = graph.upsert_edges(&[dangling]).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn neighbors_respect_direction() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));

    let a = file("a.ts");
    let b = file("b.ts");
    graph.upsert_nodes(&[a.clone(), b.clone()]).await.unwrap();
    graph
        .upsert_edges(&[GraphEdge::new(PROJECT, &a.id, &b.id, Relationship::Imports)])
        .await
        .unwrap();

    let outgoing = graph
        .get_neighbors(&a.id, None, Direction::Outgoing)
        .await
        .unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].node.id, b.id);

    let incoming = graph
        .get_neighbors(&a.id, None, Direction::Incoming)
        .await
        .unwrap();
    assert!(incoming.is_empty());

    let both = graph
        .get_neighbors(&b.id, None, Direction::Both)
        .await
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].node.id, a.id);
}

#[tokio::test]
async fn dependency_graph_walks_imports_to_depth() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));

    let a = file("a.ts");
    let b = file("b.ts");
    let c = file("c.ts");
    graph
        .upsert_nodes(&[a.clone(), b.clone(), c.clone()])
        .await
        .unwrap();
    graph
        .upsert_edges(&[
            GraphEdge::new(PROJECT, &a.id, &b.id, Relationship::Imports),
            GraphEdge::new(PROJECT, &b.id, &c.id, Relationship::Imports),
        ])
        .await
        .unwrap();

    let shallow = graph.get_dependency_graph(PROJECT, "a.ts", 1).await.unwrap();
    assert_eq!(shallow.nodes.len(), 2);
    assert_eq!(shallow.edges.len(), 1);

    let deep = graph.get_dependency_graph(PROJECT, "a.ts", 5).await.unwrap();
    assert_eq!(deep.nodes.len(), 3);
    assert_eq!(deep.edges.len(), 2);
}

#[tokio::test]
async fn delete_node_leaves_no_orphans() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));

    let f = file("owner.ts");
    let sym = function("owned", "owner.ts");
    graph.upsert_nodes(&[f.clone(), sym.clone()]).await.unwrap();
    graph
        .upsert_edges(&[GraphEdge::new(
            PROJECT,
            &f.id,
            &sym.id,
            Relationship::Contains,
        )])
        .await
        .unwrap();

    let chunk = CodeChunk::new(&sym.id, PROJECT, "fn owned() {}", ChunkType::Symbol);
    db.create_chunks_batch(&[chunk.clone()]).await.unwrap();
    db.upsert_embedding(&ChunkEmbedding::new(
        &chunk.id,
        "statistical-384",
        "local",
        vec![0.1; 384],
    ))
    .await
    .unwrap();
    db.create_diagnostics_batch(&[Diagnostic::new(&sym.id, Severity::Warning, "unused")])
        .await
        .unwrap();
    db.create_references_batch(&[SymbolReference::new(
        PROJECT,
        &f.id,
        &sym.id,
        ReferenceType::Usage,
    )])
    .await
    .unwrap();

    assert!(graph.delete_node(&sym.id).await.unwrap());

    assert!(db.get_node(&sym.id).await.unwrap().is_none());
    assert!(db.get_chunks_by_node(&sym.id).await.unwrap().is_empty());
    assert_eq!(db.count_embeddings(PROJECT).await.unwrap(), 0);
    assert!(db.get_diagnostics_by_node(&sym.id).await.unwrap().is_empty());
    assert!(db.get_references_to_symbol(&sym.id).await.unwrap().is_empty());
    assert!(graph
        .get_neighbors(&f.id, None, Direction::Both)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn clear_project_removes_everything() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));

    let a = file("a.ts");
    let b = file("b.ts");
    graph.upsert_nodes(&[a.clone(), b.clone()]).await.unwrap();
    graph
        .upsert_edges(&[GraphEdge::new(PROJECT, &a.id, &b.id, Relationship::Imports)])
        .await
        .unwrap();

    let removed = graph.clear_project(PROJECT).await.unwrap();
    assert_eq!(removed, 2);
    assert!(db
        .find_nodes_by_type(None, PROJECT, 100)
        .await
        .unwrap()
        .is_empty());
    assert!(db.get_edges_by_project(PROJECT, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn circular_dependencies_are_reported_once() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));
    let analytics = GraphAnalytics::new(Arc::clone(&db));

    let a = file("a.ts");
    let b = file("b.ts");
    let c = file("c.ts");
    let d = file("d.ts");
    graph
        .upsert_nodes(&[a.clone(), b.clone(), c.clone(), d.clone()])
        .await
        .unwrap();
    graph
        .upsert_edges(&[
            GraphEdge::new(PROJECT, &a.id, &b.id, Relationship::Imports),
            GraphEdge::new(PROJECT, &b.id, &c.id, Relationship::Imports),
            GraphEdge::new(PROJECT, &c.id, &a.id, Relationship::Imports),
            GraphEdge::new(PROJECT, &c.id, &d.id, Relationship::Imports),
        ])
        .await
        .unwrap();

    let cycles = analytics.find_circular_dependencies(PROJECT).await.unwrap();
    assert_eq!(cycles.len(), 1);
    // Each member appears exactly once; the closing edge is implied.
    let cycle = &cycles[0];
    assert_eq!(cycle.len(), 3);
    for path in ["a.ts", "b.ts", "c.ts"] {
        assert_eq!(cycle.iter().filter(|p| p.as_str() == path).count(), 1);
    }
    assert!(!cycle.contains(&"d.ts".to_string()));
}

#[tokio::test]
async fn connectivity_counts_isolated_nodes() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));
    let analytics = GraphAnalytics::new(Arc::clone(&db));

    let a = file("a.ts");
    let b = file("b.ts");
    let lonely = file("lonely.ts");
    graph
        .upsert_nodes(&[a.clone(), b.clone(), lonely])
        .await
        .unwrap();
    graph
        .upsert_edges(&[GraphEdge::new(PROJECT, &a.id, &b.id, Relationship::Imports)])
        .await
        .unwrap();

    let report = analytics.analyze_connectivity(PROJECT).await.unwrap();
    assert_eq!(report.node_count, 3);
    assert_eq!(report.edge_count, 1);
    assert_eq!(report.isolated_count, 1);
    assert!(report.density > 0.0);
}

#[tokio::test]
async fn most_connected_ranks_by_degree() {
    let (db, _tmp) = setup_backend().await;
    let graph = GraphService::new(Arc::clone(&db));
    let analytics = GraphAnalytics::new(Arc::clone(&db));

    let hub = file("hub.ts");
    let a = file("a.ts");
    let b = file("b.ts");
    graph
        .upsert_nodes(&[hub.clone(), a.clone(), b.clone()])
        .await
        .unwrap();
    graph
        .upsert_edges(&[
            GraphEdge::new(PROJECT, &a.id, &hub.id, Relationship::Imports),
            GraphEdge::new(PROJECT, &b.id, &hub.id, Relationship::Imports),
            GraphEdge::new(PROJECT, &hub.id, &a.id, Relationship::References),
        ])
        .await
        .unwrap();

    let top = analytics.most_connected_nodes(PROJECT, 2).await.unwrap();
    assert_eq!(top[0].node.id, hub.id);
    assert_eq!(top[0].in_degree, 2);
    assert_eq!(top[0].out_degree, 1);
}
