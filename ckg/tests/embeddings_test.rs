mod common;

use std::sync::Arc;

use common::setup_backend;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ckg::config::Config;
use ckg::embeddings::{ApiConfig, EmbeddingApiClient, EmbeddingService, LocalEncoder};
use ckg::error::CkgError;
use ckg::models::{
    ChunkType, CodeChunk, GraphNode, NodeType, SemanticSearchOptions,
};

const PROJECT: &str = "proj-embed";

fn embedding_response(embeddings: Vec<Vec<f32>>) -> serde_json::Value {
    json!({
        "data": embeddings.into_iter().map(|e| json!({ "embedding": e })).collect::<Vec<_>>()
    })
}

fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
        model: "text-embedding-3-small".to_string(),
        timeout_secs: 5,
        max_retries: 2,
    }
}

#[tokio::test]
async fn api_client_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.1, 0.2]])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = EmbeddingApiClient::new(api_config(&server.uri())).unwrap();
    let vectors = client.embed(&["hello"]).await.unwrap();
    assert_eq!(vectors, vec![vec![0.1, 0.2]]);
}

#[tokio::test]
async fn api_client_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![1.0]])),
        )
        .mount(&server)
        .await;

    let client = EmbeddingApiClient::new(api_config(&server.uri())).unwrap();
    let vectors = client.embed(&["retry me"]).await.unwrap();
    assert_eq!(vectors.len(), 1);
}

#[tokio::test]
async fn api_client_does_not_retry_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = EmbeddingApiClient::new(api_config(&server.uri())).unwrap();
    assert!(client.embed(&["denied"]).await.is_err());
}

#[tokio::test]
async fn local_fallback_is_deterministic_384() {
    let a = LocalEncoder::encode("hello world");
    let b = LocalEncoder::encode("hello world");
    assert_eq!(a.len(), 384);
    assert_eq!(a, b);
}

#[tokio::test]
async fn provider_failure_degrades_to_local_encoder() {
    let (db, _tmp) = setup_backend().await;

    // Unreachable provider endpoint; generation must still succeed.
    let mut config = Config::default();
    config.embeddings.model = "openai/text-embedding-3-small".to_string();
    config.embeddings.base_url = Some("http://127.0.0.1:9".to_string());
    config.embeddings.max_retries = 0;
    config.embeddings.timeout_secs = 1;
    config.embeddings.batch_delay_ms = 0;

    let service = EmbeddingService::new(Arc::clone(&db), &config.embeddings).unwrap();
    let vector = service.generate_embedding("hello world").await.unwrap();
    assert_eq!(vector, LocalEncoder::encode("hello world"));
}

#[tokio::test]
async fn batch_generation_persists_embeddings() {
    let (db, _tmp) = setup_backend().await;
    let node = GraphNode::new(PROJECT, NodeType::Function, "alpha", "a.ts");
    db.upsert_nodes_batch(&[node.clone()]).await.unwrap();
    let chunks = vec![
        CodeChunk::new(&node.id, PROJECT, "fn alpha() {}", ChunkType::Symbol),
        CodeChunk::new(&node.id, PROJECT, "alpha helper text", ChunkType::Basic),
    ];
    db.create_chunks_batch(&chunks).await.unwrap();

    let mut config = Config::default();
    config.embeddings.model = "local/statistical-384".to_string();
    config.embeddings.batch_size = 1;
    config.embeddings.batch_delay_ms = 0;
    let service = EmbeddingService::new(Arc::clone(&db), &config.embeddings).unwrap();

    let generated = service
        .batch_generate_embeddings(&chunks, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(generated, 2);
    assert_eq!(service.count_embeddings(PROJECT).await.unwrap(), 2);

    // Rerunning generates nothing new for the catch-up path.
    let missing = service
        .generate_missing_embeddings(PROJECT, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(missing, 0);
}

#[tokio::test]
async fn batch_generation_honors_cancellation() {
    let (db, _tmp) = setup_backend().await;
    let node = GraphNode::new(PROJECT, NodeType::Function, "alpha", "a.ts");
    db.upsert_nodes_batch(&[node.clone()]).await.unwrap();
    let chunks = vec![CodeChunk::new(
        &node.id,
        PROJECT,
        "fn alpha() {}",
        ChunkType::Symbol,
    )];

    let mut config = Config::default();
    config.embeddings.model = "local/statistical-384".to_string();
    let service = EmbeddingService::new(Arc::clone(&db), &config.embeddings).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = service
        .batch_generate_embeddings(&chunks, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CkgError::Cancelled(_)));
    assert_eq!(service.count_embeddings(PROJECT).await.unwrap(), 0);
}

#[tokio::test]
async fn similarity_search_finds_matching_chunk() {
    let (db, _tmp) = setup_backend().await;
    let node = GraphNode::new(PROJECT, NodeType::Function, "parseConfig", "a.ts");
    db.upsert_nodes_batch(&[node.clone()]).await.unwrap();
    let chunk = CodeChunk::new(
        &node.id,
        PROJECT,
        "function parseConfig(raw: string): Config",
        ChunkType::Symbol,
    );
    db.create_chunks_batch(&[chunk.clone()]).await.unwrap();

    let mut config = Config::default();
    config.embeddings.model = "local/statistical-384".to_string();
    config.embeddings.batch_delay_ms = 0;
    let service = EmbeddingService::new(Arc::clone(&db), &config.embeddings).unwrap();
    service
        .batch_generate_embeddings(&[chunk.clone()], &CancellationToken::new())
        .await
        .unwrap();

    // Identical text embeds to an identical vector: similarity 1.
    let hits = service
        .find_similar_chunks(
            "function parseConfig(raw: string): Config",
            Some(PROJECT),
            5,
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, chunk.id);
    assert!(hits[0].score > 0.9);
    assert_eq!(hits[0].node_name, "parseConfig");
}

#[tokio::test]
async fn hybrid_search_merges_vector_and_lexical() {
    let (db, _tmp) = setup_backend().await;
    let node = GraphNode::new(PROJECT, NodeType::Function, "parseConfig", "a.ts");
    db.upsert_nodes_batch(&[node.clone()]).await.unwrap();
    let chunk = CodeChunk::new(
        &node.id,
        PROJECT,
        "function parseConfig(raw: string): Config",
        ChunkType::Symbol,
    );
    db.create_chunks_batch(&[chunk.clone()]).await.unwrap();

    let mut config = Config::default();
    config.embeddings.model = "local/statistical-384".to_string();
    config.embeddings.batch_delay_ms = 0;
    let service = EmbeddingService::new(Arc::clone(&db), &config.embeddings).unwrap();
    service
        .batch_generate_embeddings(&[chunk.clone()], &CancellationToken::new())
        .await
        .unwrap();

    let lexical_only = service
        .semantic_search(
            "parseConfig",
            Some(PROJECT),
            &SemanticSearchOptions {
                enable_vector: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(lexical_only.len(), 1);
    assert!(lexical_only[0].score > 0.9);

    let both = service
        .semantic_search(
            "function parseConfig(raw: string): Config",
            Some(PROJECT),
            &SemanticSearchOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(both.len(), 1);
    // 0.7 * vector + 0.3 * lexical, both near 1 on an exact match.
    assert!(both[0].score > 0.9);

    let disabled = service
        .semantic_search(
            "parseConfig",
            Some(PROJECT),
            &SemanticSearchOptions {
                enable_vector: false,
                enable_lexical: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(disabled.is_empty());
}

#[tokio::test]
async fn reindex_regenerates_all_embeddings() {
    let (db, _tmp) = setup_backend().await;
    let node = GraphNode::new(PROJECT, NodeType::Function, "alpha", "a.ts");
    db.upsert_nodes_batch(&[node.clone()]).await.unwrap();
    let chunks = vec![
        CodeChunk::new(&node.id, PROJECT, "one", ChunkType::Basic),
        CodeChunk::new(&node.id, PROJECT, "two", ChunkType::Basic),
    ];
    db.create_chunks_batch(&chunks).await.unwrap();

    let mut config = Config::default();
    config.embeddings.model = "local/statistical-384".to_string();
    config.embeddings.batch_delay_ms = 0;
    let service = EmbeddingService::new(Arc::clone(&db), &config.embeddings).unwrap();

    // Stale dimensions from a previous provider get overwritten.
    db.set_embedding_dimensions(768).await.unwrap();

    let generated = service
        .reindex_project(PROJECT, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(generated, 2);
    assert_eq!(db.get_embedding_dimensions().await.unwrap(), Some(384));

    let regenerated = service
        .reindex_project(PROJECT, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(regenerated, 2);
    assert_eq!(service.count_embeddings(PROJECT).await.unwrap(), 2);
}
