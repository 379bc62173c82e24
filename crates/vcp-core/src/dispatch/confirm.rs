//! Confirmation of tool requests before execution
//!
//! The dispatcher asks a [`Confirmer`] about every non-fire-and-forget
//! request. [`ChannelConfirmer`] hands the question to a UI over a channel
//! and waits for the answer:
//!
//! ```no_run
//! use vcp_core::dispatch::ChannelConfirmer;
//!
//! # async fn ui() {
//! let (confirmer, mut pending) = ChannelConfirmer::with_channels(8);
//! // hand `confirmer` to the engine, then in the UI task:
//! while let Some(question) = pending.recv().await {
//!     println!("run {}?", question.request().tool_name);
//!     question.approve();
//! }
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::types::ToolRequest;

/// Terminal outcome of a confirmation wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// What a confirmation timeout resolves to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    #[default]
    Confirm,
    Cancel,
}

impl From<TimeoutAction> for Confirmation {
    fn from(action: TimeoutAction) -> Self {
        match action {
            TimeoutAction::Confirm => Confirmation::Confirmed,
            TimeoutAction::Cancel => Confirmation::Cancelled,
        }
    }
}

/// Timeout policy for confirmation waits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// No timeout when `None`
    pub timeout: Option<Duration>,
    pub on_timeout: TimeoutAction,
}

impl ConfirmationPolicy {
    /// Wait indefinitely
    pub fn wait_forever() -> Self {
        Self::default()
    }

    /// Resolve to `on_timeout` after `timeout`
    pub fn with_timeout(timeout: Duration, on_timeout: TimeoutAction) -> Self {
        Self {
            timeout: Some(timeout),
            on_timeout,
        }
    }
}

/// Decides whether a tool request may run
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ToolRequest) -> Confirmation;
}

/// Confirms every request immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _request: &ToolRequest) -> Confirmation {
        Confirmation::Confirmed
    }
}

/// Rejects every request immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoReject;

#[async_trait]
impl Confirmer for AutoReject {
    async fn confirm(&self, _request: &ToolRequest) -> Confirmation {
        Confirmation::Cancelled
    }
}

/// A request waiting for the user's answer
///
/// Dropping it without answering counts as a rejection.
#[derive(Debug)]
pub struct PendingConfirmation {
    request: ToolRequest,
    responder: oneshot::Sender<Confirmation>,
}

impl PendingConfirmation {
    pub fn request(&self) -> &ToolRequest {
        &self.request
    }

    pub fn approve(self) {
        self.respond(Confirmation::Confirmed);
    }

    pub fn reject(self) {
        self.respond(Confirmation::Cancelled);
    }

    pub fn respond(self, confirmation: Confirmation) {
        // The waiter may already have been cancelled; nothing to do then.
        let _ = self.responder.send(confirmation);
    }
}

/// Confirmer that round-trips through a channel to a UI
#[derive(Debug, Clone)]
pub struct ChannelConfirmer {
    tx: mpsc::Sender<PendingConfirmation>,
}

impl ChannelConfirmer {
    pub fn new(tx: mpsc::Sender<PendingConfirmation>) -> Self {
        Self { tx }
    }

    /// Create a confirmer and the receiver the UI reads questions from
    pub fn with_channels(buffer_size: usize) -> (Self, mpsc::Receiver<PendingConfirmation>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl Confirmer for ChannelConfirmer {
    async fn confirm(&self, request: &ToolRequest) -> Confirmation {
        let (responder, answer) = oneshot::channel();
        let pending = PendingConfirmation {
            request: request.clone(),
            responder,
        };
        if self.tx.send(pending).await.is_err() {
            return Confirmation::Cancelled;
        }
        answer.await.unwrap_or(Confirmation::Cancelled)
    }
}
