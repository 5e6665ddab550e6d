use tracing::info;

use crate::config::{parse_provider_model, EmbeddingsConfig};
use crate::embeddings::api::{default_base_url, ApiConfig, EmbeddingApiClient};
use crate::embeddings::local::{LocalEncoder, LOCAL_DIMENSIONS, LOCAL_MODEL, LOCAL_PROVIDER};
use crate::error::Result;

enum Backend {
    Api(EmbeddingApiClient),
    Local,
}

/// Closed dispatch over supported embedding providers. API providers share
/// one OpenAI-compatible client; `local` is the deterministic encoder.
pub struct EmbeddingProvider {
    backend: Backend,
    provider_name: String,
    model: String,
    dimensions: usize,
}

impl EmbeddingProvider {
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let (provider, model_name) = parse_provider_model(&config.model);

        if provider == "local" {
            return Ok(Self::local());
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());
        let client = EmbeddingApiClient::new(ApiConfig {
            base_url,
            api_key: config.api_key.clone(),
            model: model_name.to_string(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })?;

        info!(provider, model = model_name, "using API embedding provider");
        Ok(Self {
            backend: Backend::Api(client),
            provider_name: provider.to_string(),
            model: model_name.to_string(),
            dimensions: config.dimensions,
        })
    }

    pub fn local() -> Self {
        info!("using deterministic local embedding encoder");
        Self {
            backend: Backend::Local,
            provider_name: LOCAL_PROVIDER.to_string(),
            model: LOCAL_MODEL.to_string(),
            dimensions: LOCAL_DIMENSIONS,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.backend, Backend::Local)
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match &self.backend {
            Backend::Api(client) => {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                client.embed(&refs).await
            }
            Backend::Local => Ok(texts.iter().map(|t| LocalEncoder::encode(t)).collect()),
        }
    }
}
