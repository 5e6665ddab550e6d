//! Code knowledge graph engine: a per-project graph of files and symbols
//! with symbolic and semantic retrieval on top, an incremental indexer to
//! keep it fresh, and a token-budgeted context builder for AI consumers.

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod models;
pub mod service;
pub mod symbols;

pub use config::Config;
pub use error::{CkgError, Result};
pub use service::{BuildOptions, CkgService, HealthReport, HealthStatus, QueryResponse};
