use thiserror::Error;

#[derive(Error, Debug)]
pub enum CkgError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Indexing error: {0}")]
    Indexing(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("API rate limit exceeded, retry after {retry_after:?} seconds")]
    ApiRateLimit { retry_after: Option<u64> },

    #[error("API authentication error: {0}")]
    ApiAuth(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CkgError {
    /// True for failures that should be contained (logged and skipped)
    /// rather than aborting the operation that produced them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CkgError::Embedding(_)
                | CkgError::Extraction(_)
                | CkgError::Http(_)
                | CkgError::ApiRateLimit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CkgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(CkgError::Embedding("provider down".into()).is_recoverable());
        assert!(CkgError::Extraction("parse failed".into()).is_recoverable());
        assert!(!CkgError::Validation("bad input".into()).is_recoverable());
        assert!(!CkgError::NotFound("node".into()).is_recoverable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = CkgError::Extraction("src/lib.rs: unexpected token".into());
        assert!(err.to_string().contains("src/lib.rs"));
    }
}
