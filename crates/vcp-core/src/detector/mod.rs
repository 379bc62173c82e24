//! Incremental detection of tool-request blocks in streamed text

mod buffer;
mod state;

pub use buffer::{Finalized, StreamBuffer};
pub use state::{Detector, ProcessingState};
