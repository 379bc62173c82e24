//! Per-round session state and the turn event sink

use futures::channel::mpsc;

use crate::types::{ToolResult, TurnEvent};

/// State collected while one round streams
///
/// Reset at the start of every round and read once at its end to decide
/// whether to continue.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionState {
    /// Results of confirmed, executed requests, in execution order
    pub pending_results: Vec<ToolResult>,
    /// At least one confirm-mode request reached execution
    pub has_any_confirmed_call: bool,
    /// Visible text released during the round
    pub text: String,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record visible text
    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Record an executed confirm-mode result
    pub fn record(&mut self, result: ToolResult) {
        self.has_any_confirmed_call = true;
        self.pending_results.push(result);
    }

    /// Whether the round should trigger a continuation
    pub fn wants_continuation(&self) -> bool {
        self.has_any_confirmed_call && !self.pending_results.is_empty()
    }

    /// Clear everything for a new round
    pub fn reset(&mut self) {
        self.pending_results.clear();
        self.has_any_confirmed_call = false;
        self.text.clear();
    }
}

/// Sending half of a turn's event stream
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TurnEvent>,
}

impl EventSink {
    /// Create a sink and the receiver that feeds the host
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, rx)
    }

    /// Emit an event; returns `false` once the host stopped listening
    pub fn emit(&self, event: TurnEvent) -> bool {
        self.tx.unbounded_send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
