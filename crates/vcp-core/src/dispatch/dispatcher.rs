//! Routes tool requests through confirmation and execution

use std::sync::Arc;

use super::confirm::{Confirmation, ConfirmationPolicy, Confirmer};
use super::executor::{ExecutorError, ToolExecutor};
use super::session::{EventSink, SessionState};
use crate::logging::Logger;
use crate::types::{CancellationToken, ToolRequest, ToolResult, TurnEvent};
use crate::{log_debug, log_info, log_warn};

/// Output reported for fire-and-forget requests
pub const DEFAULT_FIRE_AND_FORGET_PLACEHOLDER: &str = "dispatched";

/// What happened to one request
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// Spawned without waiting for a result
    FireAndForget,
    /// Confirmed and executed
    Completed(ToolResult),
    /// Rejected, timed out to cancel, or aborted before execution
    Cancelled,
}

/// Executes requests one at a time, in the order given
pub struct Dispatcher {
    executor: Arc<dyn ToolExecutor>,
    confirmer: Arc<dyn Confirmer>,
    policy: ConfirmationPolicy,
    placeholder: String,
    logger: Arc<dyn Logger>,
}

impl Dispatcher {
    pub fn new(
        executor: Arc<dyn ToolExecutor>,
        confirmer: Arc<dyn Confirmer>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            executor,
            confirmer,
            policy: ConfirmationPolicy::default(),
            placeholder: DEFAULT_FIRE_AND_FORGET_PLACEHOLDER.to_string(),
            logger,
        }
    }

    pub fn with_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Dispatch a batch sequentially
    ///
    /// Each request finishes, including its confirmation wait, before the
    /// next one starts.
    pub async fn dispatch_all(
        &self,
        requests: Vec<ToolRequest>,
        session: &mut SessionState,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Vec<Dispatched> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.dispatch(request, session, sink, cancel).await);
        }
        outcomes
    }

    /// Dispatch one request
    pub async fn dispatch(
        &self,
        request: ToolRequest,
        session: &mut SessionState,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Dispatched {
        sink.emit(TurnEvent::ToolPending {
            request_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            params: request.params.clone(),
            fire_and_forget: request.fire_and_forget,
        });

        if cancel.is_cancelled() {
            return self.cancelled(request, sink);
        }

        if request.fire_and_forget {
            self.fire_and_forget(request, sink, cancel);
            return Dispatched::FireAndForget;
        }

        match self.await_confirmation(&request, cancel).await {
            Confirmation::Cancelled => self.cancelled(request, sink),
            Confirmation::Confirmed => {
                let result = self.execute(&request, sink, cancel).await;
                session.record(result.clone());
                Dispatched::Completed(result)
            }
        }
    }

    fn fire_and_forget(&self, request: ToolRequest, sink: &EventSink, cancel: &CancellationToken) {
        log_debug!(
            self.logger,
            "[Dispatcher] Fire-and-forget {} ({})",
            request.tool_name,
            request.id
        );

        let executor = self.executor.clone();
        let logger = self.logger.clone();
        let token = cancel.child_token();
        let tool_name = request.tool_name.clone();
        let params = request.params.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.execute(&tool_name, &params, token).await {
                log_warn!(logger, "[Dispatcher] Fire-and-forget {} failed: {}", tool_name, e);
            }
        });

        sink.emit(TurnEvent::ToolDone {
            request_id: request.id,
            tool_name: request.tool_name,
            params: request.params,
            output: self.placeholder.clone(),
        });
    }

    /// Race the confirmer, the abort signal and the timeout; first one wins
    async fn await_confirmation(
        &self,
        request: &ToolRequest,
        cancel: &CancellationToken,
    ) -> Confirmation {
        let timeout = async {
            match self.policy.timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Confirmation::Cancelled,
            confirmation = self.confirmer.confirm(request) => confirmation,
            _ = timeout => {
                log_info!(
                    self.logger,
                    "[Dispatcher] Confirmation for {} timed out, applying {:?}",
                    request.tool_name,
                    self.policy.on_timeout
                );
                self.policy.on_timeout.into()
            }
        }
    }

    async fn execute(
        &self,
        request: &ToolRequest,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> ToolResult {
        log_debug!(
            self.logger,
            "[Dispatcher] Executing {} ({})",
            request.tool_name,
            request.id
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
            outcome = self.executor.execute(&request.tool_name, &request.params, cancel.child_token()) => outcome,
        };

        match outcome {
            Ok(output) => {
                sink.emit(TurnEvent::ToolDone {
                    request_id: request.id.clone(),
                    tool_name: request.tool_name.clone(),
                    params: request.params.clone(),
                    output: output.clone(),
                });
                ToolResult::success(request.id.clone(), request.tool_name.clone(), output)
            }
            Err(e) => {
                let error = e.to_string();
                self.logger.warn(&format!(
                    "[Dispatcher] Tool {} failed: {}",
                    request.tool_name, error
                ));
                sink.emit(TurnEvent::ToolError {
                    request_id: request.id.clone(),
                    tool_name: request.tool_name.clone(),
                    params: request.params.clone(),
                    error: error.clone(),
                });
                ToolResult::failure(request.id.clone(), request.tool_name.clone(), error)
            }
        }
    }

    fn cancelled(&self, request: ToolRequest, sink: &EventSink) -> Dispatched {
        log_info!(
            self.logger,
            "[Dispatcher] Tool {} ({}) cancelled",
            request.tool_name,
            request.id
        );
        sink.emit(TurnEvent::ToolCancelled {
            request_id: request.id,
            tool_name: request.tool_name,
            params: request.params,
        });
        Dispatched::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::confirm::{AutoConfirm, AutoReject, ChannelConfirmer, TimeoutAction};
    use crate::dispatch::executor::FnExecutor;
    use crate::logging::{LogLevel, MemoryLogger, NoOpLogger};
    use crate::types::{RawSpan, ToolParams};
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn request(id: &str, name: &str, archery: bool) -> ToolRequest {
        let mut params = ToolParams::new();
        if archery {
            params.insert("archery".to_string(), "true".to_string());
        }
        ToolRequest::textual(id, name, params, RawSpan::new(0, 1))
    }

    fn echo_executor(calls: Arc<AtomicUsize>) -> Arc<dyn ToolExecutor> {
        Arc::new(FnExecutor::new(move |name: String, _params: ToolParams| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if name == "Broken" {
                    Err(ExecutorError::unavailable("backend down"))
                } else {
                    Ok(format!("{} ok", name))
                }
            }
        }))
    }

    fn drain(rx: &mut futures::channel::mpsc::UnboundedReceiver<TurnEvent>) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = rx.try_next() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_confirmed_success_records_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(echo_executor(calls.clone()), Arc::new(AutoConfirm), Arc::new(NoOpLogger));
        let (sink, mut rx) = EventSink::channel();
        let mut session = SessionState::new();

        let outcome = dispatcher
            .dispatch(request("r1", "Read", false), &mut session, &sink, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Dispatched::Completed(ToolResult::success("r1", "Read", "Read ok")));
        assert!(session.has_any_confirmed_call);
        assert_eq!(session.pending_results.len(), 1);

        let events = drain(&mut rx);
        assert!(matches!(events[0], TurnEvent::ToolPending { fire_and_forget: false, .. }));
        assert!(matches!(&events[1], TurnEvent::ToolDone { output, .. } if output == "Read ok"));
    }

    #[tokio::test]
    async fn test_executor_error_is_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(echo_executor(calls), Arc::new(AutoConfirm), Arc::new(NoOpLogger));
        let (sink, mut rx) = EventSink::channel();
        let mut session = SessionState::new();

        dispatcher
            .dispatch(request("r1", "Broken", false), &mut session, &sink, &CancellationToken::new())
            .await;

        assert!(!session.pending_results[0].is_success());
        assert_eq!(
            session.pending_results[0].content(),
            "Tool executor unavailable: backend down"
        );
        let events = drain(&mut rx);
        assert!(matches!(events[1], TurnEvent::ToolError { .. }));
    }

    #[tokio::test]
    async fn test_fire_and_forget_isolation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let logger = Arc::new(MemoryLogger::new());
        let dispatcher = Dispatcher::new(echo_executor(calls.clone()), Arc::new(AutoReject), logger.clone())
            .with_placeholder("sent");
        let (sink, mut rx) = EventSink::channel();
        let mut session = SessionState::new();

        let outcome = dispatcher
            .dispatch(request("r1", "Broken", true), &mut session, &sink, &CancellationToken::new())
            .await;
        assert_eq!(outcome, Dispatched::FireAndForget);

        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 1 && logger.contains(LogLevel::Warn, "Broken failed") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(logger.contains(LogLevel::Warn, "Fire-and-forget Broken failed"));

        assert!(session.pending_results.is_empty());
        assert!(!session.has_any_confirmed_call);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], TurnEvent::ToolDone { output, .. } if output == "sent"));
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_executed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(echo_executor(calls.clone()), Arc::new(AutoReject), Arc::new(NoOpLogger));
        let (sink, mut rx) = EventSink::channel();
        let mut session = SessionState::new();

        let outcome = dispatcher
            .dispatch(request("r1", "Write", false), &mut session, &sink, &CancellationToken::new())
            .await;

        assert_eq!(outcome, Dispatched::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.pending_results.is_empty());
        assert!(matches!(drain(&mut rx)[1], TurnEvent::ToolCancelled { .. }));
    }

    #[tokio::test]
    async fn test_abort_during_confirmation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (confirmer, mut pending) = ChannelConfirmer::with_channels(1);
        let dispatcher = Dispatcher::new(echo_executor(calls.clone()), Arc::new(confirmer), Arc::new(NoOpLogger));
        let (sink, mut rx) = EventSink::channel();
        let mut session = SessionState::new();
        let cancel = CancellationToken::new();

        let aborter = cancel.clone();
        let ui = tokio::spawn(async move {
            let question = pending.recv().await.unwrap();
            aborter.cancel();
            question
        });

        let outcome = dispatcher
            .dispatch(request("r1", "Write", false), &mut session, &sink, &cancel)
            .await;
        let _question = ui.await.unwrap();

        assert_eq!(outcome, Dispatched::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.pending_results.is_empty());
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(TurnEvent::ToolCancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_policy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (confirmer, _pending) = ChannelConfirmer::with_channels(4);
        let confirmer = Arc::new(confirmer);
        let (sink, _rx) = EventSink::channel();
        let mut session = SessionState::new();

        let confirming = Dispatcher::new(echo_executor(calls.clone()), confirmer.clone(), Arc::new(NoOpLogger))
            .with_policy(ConfirmationPolicy::with_timeout(Duration::from_secs(30), TimeoutAction::Confirm));
        let outcome = confirming
            .dispatch(request("r1", "Read", false), &mut session, &sink, &CancellationToken::new())
            .await;
        assert!(matches!(outcome, Dispatched::Completed(_)));

        let cancelling = Dispatcher::new(echo_executor(calls.clone()), confirmer, Arc::new(NoOpLogger))
            .with_policy(ConfirmationPolicy::with_timeout(Duration::from_secs(30), TimeoutAction::Cancel));
        let outcome = cancelling
            .dispatch(request("r2", "Read", false), &mut session, &sink, &CancellationToken::new())
            .await;
        assert_eq!(outcome, Dispatched::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_all_is_sequential() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = log.clone();
        let executor = Arc::new(FnExecutor::new(move |name: String, _params: ToolParams| {
            let seen = seen.clone();
            async move {
                seen.lock().push(format!("start {}", name));
                tokio::time::sleep(Duration::from_millis(5)).await;
                seen.lock().push(format!("end {}", name));
                Ok(name)
            }
        }));
        let dispatcher = Dispatcher::new(executor, Arc::new(AutoConfirm), Arc::new(NoOpLogger));
        let (sink, rx) = EventSink::channel();
        let mut session = SessionState::new();

        let outcomes = dispatcher
            .dispatch_all(
                vec![request("r1", "WriteFile", false), request("r2", "ReadFile", false)],
                &mut session,
                &sink,
                &CancellationToken::new(),
            )
            .await;
        drop(sink);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            *log.lock(),
            vec!["start WriteFile", "end WriteFile", "start ReadFile", "end ReadFile"]
        );
        let ids: Vec<_> = session.pending_results.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);

        let events: Vec<_> = rx.collect().await;
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn test_abort_during_execution_records_failure() {
        let executor = Arc::new(FnExecutor::new(|_name: String, _params: ToolParams| async {
            std::future::pending::<()>().await;
            Ok(String::new())
        }));
        let dispatcher = Dispatcher::new(executor, Arc::new(AutoConfirm), Arc::new(NoOpLogger));
        let (sink, mut rx) = EventSink::channel();
        let mut session = SessionState::new();
        let cancel = CancellationToken::new();

        let aborter = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            aborter.cancel();
        });

        dispatcher
            .dispatch(request("r1", "Slow", false), &mut session, &sink, &cancel)
            .await;

        assert_eq!(session.pending_results[0].content(), "Tool execution cancelled");
        assert!(matches!(drain(&mut rx).last(), Some(TurnEvent::ToolError { .. })));
    }
}
