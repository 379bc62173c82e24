//! Detector: stream buffer plus the drain/execute state machine

use std::collections::VecDeque;

use super::buffer::{Finalized, StreamBuffer};
use crate::types::ToolRequest;

/// Processing state of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    /// Accepting deltas, no batch in flight
    #[default]
    Idle,
    /// Extracting complete blocks
    Draining,
    /// A drained batch is being dispatched; new deltas are queued
    Executing,
}

/// Incremental tool-request detector
///
/// Deltas that arrive while a batch is executing are held back and applied
/// once [`finish_execution`](Self::finish_execution) is called, so a batch is
/// never extended or re-drained mid-flight.
#[derive(Debug)]
pub struct Detector {
    buffer: StreamBuffer,
    state: ProcessingState,
    queued: VecDeque<String>,
}

impl Detector {
    pub fn new(buffer: StreamBuffer) -> Self {
        Self {
            buffer,
            state: ProcessingState::Idle,
            queued: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    /// Number of deltas waiting for the current batch to finish
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Set the prefix for request ids produced from now on
    pub fn set_id_prefix(&mut self, prefix: impl Into<String>) {
        self.buffer.set_id_prefix(prefix);
    }

    /// Feed a delta; returns `false` if it was queued behind a running batch
    pub fn append(&mut self, delta: &str) -> bool {
        match self.state {
            ProcessingState::Idle => {
                self.buffer.append(delta);
                true
            }
            ProcessingState::Draining | ProcessingState::Executing => {
                self.queued.push_back(delta.to_string());
                false
            }
        }
    }

    /// Whether the buffer holds a complete, undrained block
    pub fn has_complete_block(&self) -> bool {
        self.buffer.has_complete_block()
    }

    /// Start a batch if the buffer holds complete blocks
    ///
    /// Drains and strips every complete block. Returns `None` when idle
    /// conditions are not met or every block was malformed; otherwise the
    /// detector stays in [`ProcessingState::Executing`] until
    /// [`finish_execution`](Self::finish_execution).
    pub fn begin_batch(&mut self) -> Option<Vec<ToolRequest>> {
        if self.state != ProcessingState::Idle || !self.buffer.has_complete_block() {
            return None;
        }

        self.state = ProcessingState::Draining;
        let requests = self.buffer.drain_complete_blocks();
        self.buffer.strip_processed();

        if requests.is_empty() {
            self.state = ProcessingState::Idle;
            return None;
        }

        self.state = ProcessingState::Executing;
        Some(requests)
    }

    /// Mark the detector busy for work that did not come from the buffer
    ///
    /// Used for native tool calls; returns `false` if a batch is already
    /// in flight.
    pub fn begin_execution(&mut self) -> bool {
        if self.state != ProcessingState::Idle {
            return false;
        }
        self.state = ProcessingState::Executing;
        true
    }

    /// End the running batch and apply queued deltas
    ///
    /// Returns `true` when the queued text completed another block, meaning
    /// a new batch should be started right away.
    pub fn finish_execution(&mut self) -> bool {
        if self.state != ProcessingState::Executing {
            return false;
        }

        self.state = ProcessingState::Idle;
        while let Some(delta) = self.queued.pop_front() {
            self.buffer.append(&delta);
        }
        self.buffer.has_complete_block()
    }

    /// Drop every complete block without running it
    ///
    /// Applies queued deltas first and leaves the detector idle. The returned
    /// requests were stripped from the buffer.
    pub fn cancel_pending(&mut self) -> Vec<ToolRequest> {
        while let Some(delta) = self.queued.pop_front() {
            self.buffer.append(&delta);
        }
        self.state = ProcessingState::Idle;

        let requests = self.buffer.drain_complete_blocks();
        self.buffer.strip_processed();
        requests
    }

    /// Release prose that cannot belong to a block
    pub fn take_visible(&mut self) -> String {
        self.buffer.take_visible()
    }

    /// Flush at stream end, applying any queued deltas first
    pub fn finalize(&mut self) -> Finalized {
        while let Some(delta) = self.queued.pop_front() {
            self.buffer.append(&delta);
        }
        self.state = ProcessingState::Idle;
        self.buffer.finalize()
    }

    /// Clear all state for a new turn
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.queued.clear();
        self.state = ProcessingState::Idle;
    }
}
