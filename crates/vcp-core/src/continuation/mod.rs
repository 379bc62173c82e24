//! Multi-round continuation
//!
//! When a round executed at least one confirmed call, its results are fed
//! back to the model and the new round's stream runs through the same
//! pipeline, up to a required round limit.

mod controller;
mod format;
mod provider;
mod traits;

pub use controller::{ContinuationController, TurnEnd};
pub use format::{format_tool_results, RESULT_END, RESULT_START};
pub use provider::ProviderContinuation;
pub use traits::{Continuation, ContinuationRequest};
