use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingsConfig,
    pub indexing: IndexingConfig,
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// Model string in `provider/model` form; an unknown provider prefix
    /// selects the deterministic local encoder.
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dimensions: usize,
    pub batch_size: usize,
    /// Pause between provider batches, to respect rate limits.
    pub batch_delay_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_size: usize,
    pub similarity_threshold: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    /// Capacity of the per-process file-change queue.
    pub change_queue_size: usize,
    pub progress_channel_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub default_token_budget: usize,
    pub cache_size: usize,
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: env::var("CKG_DATABASE_URL").unwrap_or_else(|_| "file:ckg.db".to_string()),
                auth_token: env::var("CKG_DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("CKG_DATABASE_LOCAL_PATH").ok(),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("CKG_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "local/statistical-384".to_string()),
                api_key: env::var("CKG_EMBEDDING_API_KEY").ok(),
                base_url: env::var("CKG_EMBEDDING_BASE_URL").ok(),
                dimensions: parse_env_or("CKG_EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("CKG_EMBEDDING_BATCH_SIZE", 32),
                batch_delay_ms: parse_env_or("CKG_EMBEDDING_BATCH_DELAY_MS", 100),
                timeout_secs: parse_env_or("CKG_EMBEDDING_TIMEOUT", 30),
                max_retries: parse_env_or("CKG_EMBEDDING_MAX_RETRIES", 3),
                cache_size: parse_env_or("CKG_EMBEDDING_CACHE_SIZE", 1000),
                similarity_threshold: parse_env_or("CKG_SIMILARITY_THRESHOLD", 0.3),
            },
            indexing: IndexingConfig {
                change_queue_size: parse_env_or("CKG_CHANGE_QUEUE_SIZE", 1024),
                progress_channel_size: parse_env_or("CKG_PROGRESS_CHANNEL_SIZE", 64),
            },
            context: ContextConfig {
                default_token_budget: parse_env_or("CKG_CONTEXT_TOKEN_BUDGET", 8000),
                cache_size: parse_env_or("CKG_CONTEXT_CACHE_SIZE", 500),
                cache_ttl_secs: parse_env_or("CKG_CONTEXT_CACHE_TTL_SECS", 300),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// Known embedding providers that use OpenAI-compatible APIs.
const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio", "local"];

/// Parse a model name into a (provider, model) tuple.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    // Default to local provider
    ("local", model)
}
