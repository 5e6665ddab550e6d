mod api;
mod local;
mod provider;

pub use api::{default_base_url, ApiConfig, EmbeddingApiClient};
pub use local::{LocalEncoder, LOCAL_DIMENSIONS, LOCAL_MODEL, LOCAL_PROVIDER};
pub use provider::EmbeddingProvider;

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::content_key;
use crate::config::EmbeddingsConfig;
use crate::db::GraphBackend;
use crate::error::{CkgError, Result};
use crate::models::{ChunkEmbedding, CodeChunk, SemanticSearchOptions, SimilarChunk};

const VECTOR_WEIGHT: f32 = 0.7;
const LEXICAL_WEIGHT: f32 = 0.3;

/// Embedding generation, storage and similarity search. Provider failures
/// degrade to the deterministic local encoder instead of failing the
/// caller's operation.
pub struct EmbeddingService {
    db: Arc<dyn GraphBackend>,
    provider: EmbeddingProvider,
    cache: Arc<Mutex<LruCache<String, Vec<f32>>>>,
    batch_size: usize,
    batch_delay: Duration,
    similarity_threshold: f32,
}

impl EmbeddingService {
    pub fn new(db: Arc<dyn GraphBackend>, config: &EmbeddingsConfig) -> Result<Self> {
        let provider = EmbeddingProvider::from_config(config)?;
        let capacity =
            NonZeroUsize::new(config.cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            db,
            provider,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            similarity_threshold: config.similarity_threshold,
        })
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Health probe against the configured provider, without the local
    /// fallback masking failures.
    pub async fn probe(&self) -> Result<()> {
        let texts = ["ping".to_string()];
        self.provider.embed(&texts).await.map(|_| ())
    }

    /// Embeds one text, with a content-hash cache in front. A provider
    /// failure falls back to the local encoder rather than erroring.
    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let key = format!("{}:{}", content_key(text), self.provider.model());
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let (mut vectors, _, _) = self.embed_with_fallback(&[text.to_string()]).await;
        let vector = vectors
            .pop()
            .ok_or_else(|| CkgError::Embedding("No embedding generated".to_string()))?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, vector.clone());
        }
        Ok(vector)
    }

    /// Embeds and persists vectors for `chunks` in fixed-size batches with
    /// an inter-batch delay. Single-item store failures are logged and
    /// skipped. Returns the number of embeddings written.
    pub async fn batch_generate_embeddings(
        &self,
        chunks: &[CodeChunk],
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut generated = 0usize;

        for (batch_index, batch) in chunks.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(CkgError::Cancelled("embedding batch".to_string()));
            }
            if batch_index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let (vectors, model, provider) = self.embed_with_fallback(&texts).await;

            if vectors.len() != batch.len() {
                warn!(
                    expected = batch.len(),
                    got = vectors.len(),
                    "embedding batch returned wrong count; skipping batch"
                );
                continue;
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                let embedding = ChunkEmbedding::new(&chunk.id, &model, &provider, vector);
                match self.db.upsert_embedding(&embedding).await {
                    Ok(()) => generated += 1,
                    Err(e) => {
                        warn!(
                            chunk_id = %chunk.id,
                            project_id = %chunk.project_id,
                            error = %e,
                            "failed to store embedding; skipping"
                        );
                    }
                }
            }
        }

        debug!(generated, total = chunks.len(), "embedding batch run complete");
        Ok(generated)
    }

    /// Nearest-neighbor search by raw vector.
    pub async fn search_similar(
        &self,
        vector: &[f32],
        limit: u32,
        threshold: f32,
        project_id: Option<&str>,
    ) -> Result<Vec<SimilarChunk>> {
        self.db
            .search_similar_chunks(vector, limit, threshold, project_id)
            .await
    }

    /// Embeds `query` and returns chunks above the configured threshold.
    pub async fn find_similar_chunks(
        &self,
        query: &str,
        project_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SimilarChunk>> {
        let vector = self.generate_embedding(query).await?;
        self.search_similar(&vector, limit, self.similarity_threshold, project_id)
            .await
    }

    /// Hybrid search: vector similarity and lexical term-hit rank combined
    /// 0.7/0.3 when both are enabled.
    pub async fn semantic_search(
        &self,
        query: &str,
        project_id: Option<&str>,
        opts: &SemanticSearchOptions,
    ) -> Result<Vec<SimilarChunk>> {
        if !opts.enable_vector && !opts.enable_lexical {
            return Ok(Vec::new());
        }

        // Overfetch so the merged ranking has candidates from both legs.
        let fetch_limit = (opts.limit as u32).saturating_mul(2);
        let mut merged: HashMap<String, SimilarChunk> = HashMap::new();
        let mut vector_scores: HashMap<String, f32> = HashMap::new();
        let mut lexical_scores: HashMap<String, f32> = HashMap::new();

        if opts.enable_vector {
            let vector = self.generate_embedding(query).await?;
            let hits = self
                .search_similar(&vector, fetch_limit, opts.threshold, project_id)
                .await?;
            for hit in hits {
                vector_scores.insert(hit.chunk_id.clone(), hit.score);
                merged.entry(hit.chunk_id.clone()).or_insert(hit);
            }
        }

        if opts.enable_lexical {
            let terms = query_terms(query);
            if !terms.is_empty() {
                let hits = self
                    .db
                    .find_chunks_matching(&terms, project_id, fetch_limit)
                    .await?;
                for mut hit in hits {
                    let score = term_hit_fraction(&hit.content, &terms);
                    lexical_scores.insert(hit.chunk_id.clone(), score);
                    hit.score = score;
                    merged.entry(hit.chunk_id.clone()).or_insert(hit);
                }
            }
        }

        let mut results: Vec<SimilarChunk> = merged
            .into_values()
            .map(|mut chunk| {
                let vector = vector_scores.get(&chunk.chunk_id).copied();
                let lexical = lexical_scores.get(&chunk.chunk_id).copied();
                chunk.score = match (opts.enable_vector, opts.enable_lexical) {
                    (true, true) => {
                        VECTOR_WEIGHT * vector.unwrap_or(0.0)
                            + LEXICAL_WEIGHT * lexical.unwrap_or(0.0)
                    }
                    (true, false) => vector.unwrap_or(0.0),
                    (false, true) => lexical.unwrap_or(0.0),
                    (false, false) => 0.0,
                };
                chunk
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(opts.limit);
        Ok(results)
    }

    /// Deletes and regenerates every embedding for a project's chunks.
    /// Records the active vector dimensions so a later provider switch is
    /// visible as a stored/active mismatch.
    pub async fn reindex_project(
        &self,
        project_id: &str,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let active = self.dimensions();
        if let Some(stored) = self.db.get_embedding_dimensions().await? {
            if stored != active {
                warn!(
                    stored,
                    active, "embedding dimensions changed; rebuilding all vectors"
                );
            }
        }

        let deleted = self.db.delete_embeddings_by_project(project_id).await?;
        debug!(project_id, deleted, "cleared project embeddings");

        let chunks = self.db.get_chunks_by_project(project_id).await?;
        let generated = self.batch_generate_embeddings(&chunks, cancel).await?;
        self.db.set_embedding_dimensions(active).await?;
        Ok(generated)
    }

    /// Generates embeddings only for chunks missing one under the active
    /// model. Used to catch up after partial batch failures.
    pub async fn generate_missing_embeddings(
        &self,
        project_id: &str,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let missing = self
            .db
            .chunks_missing_embeddings(project_id, self.provider.model())
            .await?;
        if missing.is_empty() {
            return Ok(0);
        }
        self.batch_generate_embeddings(&missing, cancel).await
    }

    pub async fn count_embeddings(&self, project_id: &str) -> Result<u64> {
        self.db.count_embeddings(project_id).await
    }

    async fn embed_with_fallback(&self, texts: &[String]) -> (Vec<Vec<f32>>, String, String) {
        match self.provider.embed(texts).await {
            Ok(vectors) => (
                vectors,
                self.provider.model().to_string(),
                self.provider.provider_name().to_string(),
            ),
            Err(e) => {
                if !self.provider.is_local() {
                    warn!(
                        provider = self.provider.provider_name(),
                        error = %e,
                        "embedding provider unavailable; using local encoder"
                    );
                }
                let vectors = texts.iter().map(|t| LocalEncoder::encode(t)).collect();
                (vectors, LOCAL_MODEL.to_string(), LOCAL_PROVIDER.to_string())
            }
        }
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn term_hit_fraction(content: &str, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let haystack = content.to_lowercase();
    let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f32 / terms.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_terms_lowercases_and_dedupes() {
        let terms = query_terms("UserService userservice get_user x");
        assert_eq!(terms, vec!["get_user", "userservice"]);
    }

    #[test]
    fn term_hit_fraction_counts_partial_matches() {
        let terms = vec!["parse".to_string(), "missing".to_string()];
        let fraction = term_hit_fraction("fn parse(input: &str)", &terms);
        assert!((fraction - 0.5).abs() < 1e-6);
    }

    #[test]
    fn term_hit_fraction_empty_terms_is_zero() {
        assert_eq!(term_hit_fraction("anything", &[]), 0.0);
    }
}
