//! AI-assisted generation for object nodes
//!
//! A [`Generator`] produces content; the [`GenerationPipeline`] turns it into
//! object commands. Generation never mutates a graph directly.

mod cancel;
mod pipeline;
mod traits;
mod types;

pub use cancel::CancellationToken;
pub use pipeline::{GenerationPipeline, GenerationPlan, DEFAULT_CHILD_TYPE, DEFAULT_MAX_CHILDREN};
pub use traits::{GenerationError, Generator, MockGenerator};
pub use types::{ChildProposal, ConnectionProposal, GenerationKind, GenerationRequest, GenerationResponse};
