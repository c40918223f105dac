//! Read-only queries over object graphs
//!
//! Provides prompt context assembly and linear text search.

mod context;
mod find;

pub use context::{ContextAssembler, ContextBundle, ResolvedConnection};
pub use find::SearchQuery;
