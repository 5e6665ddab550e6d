mod impact;
mod index;

pub use impact::ImpactAnalyzer;
pub use index::SymbolIndex;
