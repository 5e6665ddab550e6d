pub(crate) mod assemble;
mod builder;
pub(crate) mod rerank;
mod semantic;
mod symbolic;

pub use assemble::{estimate_tokens, format_for_ai};
pub use builder::ContextBuilder;
pub use symbolic::{extract_candidates, name_similarity};
