mod chunk;
mod common;
mod context;
mod diagnostic;
mod edge;
mod insight;
mod node;
mod reference;
mod search;

pub use chunk::*;
pub use common::*;
pub use context::*;
pub use diagnostic::*;
pub use edge::*;
pub use insight::*;
pub use node::*;
pub use reference::*;
pub use search::*;
