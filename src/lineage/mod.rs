//! Page lineage: which page was derived from which
//!
//! Lineage pointers are allowed to dangle. Deleting a page never rewrites
//! the pages around it; [`LineageTracker::sweep_dangling`] cleans up on request.

mod api;
mod types;

pub use api::LineageTracker;
pub use types::{DerivationContext, LineageSource, PageLineage};
