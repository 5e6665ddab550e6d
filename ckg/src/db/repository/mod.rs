mod chunks;
mod diagnostics;
mod edges;
mod embeddings;
mod nodes;
mod references;

pub use chunks::ChunkRepository;
pub use diagnostics::DiagnosticRepository;
pub use edges::EdgeRepository;
pub use embeddings::EmbeddingRepository;
pub use nodes::NodeRepository;
pub use references::ReferenceRepository;
