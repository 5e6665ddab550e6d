mod events;
mod extract;
mod incremental;

pub use events::{ChangeKind, FileChangeEvent, IndexProgressEvent};
pub use extract::{
    ChunkSplitter, Extraction, FileScanner, LineChunkSplitter, NewChunk, ScannedFile,
    SymbolExtractor,
};
pub use incremental::{FullIndexStats, IncrementalIndexer, IndexState};
