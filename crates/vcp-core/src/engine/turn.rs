//! Drives one turn: stream, detect, dispatch, continue

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures::{future, stream, Stream, StreamExt};

use super::builder::TurnEngineBuilder;
use crate::bridge::ProtocolBridge;
use crate::continuation::{ContinuationController, TurnEnd};
use crate::detector::Detector;
use crate::dispatch::{Dispatcher, EventSink, SessionState};
use crate::error::EngineError;
use crate::logging::Logger;
use crate::providers::{ProviderError, ProviderStream};
use crate::types::{CancellationToken, ProviderEvent, ToolRequest, TurnEvent};
use crate::{log_debug, log_error, log_info};

/// Events of one turn: lazy, finite, consume-once
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnEvent> + Send>>;

/// Separator between the texts of consecutive rounds
const ROUND_SEPARATOR: &str = "\n\n";

/// How a single round ended
enum RoundOutcome {
    Completed,
    Aborted,
    Failed(ProviderError),
}

/// Upstream of the round being streamed
///
/// Events read while a batch executes land here. Text goes straight into the
/// detector queue until some other event is deferred; from then on every
/// event waits in `backlog` so it replays in arrival order.
struct Upstream<'a> {
    stream: &'a mut ProviderStream,
    backlog: VecDeque<ProviderEvent>,
    failure: Option<ProviderError>,
    ended: bool,
}

impl<'a> Upstream<'a> {
    fn new(stream: &'a mut ProviderStream) -> Self {
        Self {
            stream,
            backlog: VecDeque::new(),
            failure: None,
            ended: false,
        }
    }

    fn is_open(&self) -> bool {
        !self.ended && self.failure.is_none()
    }
}

/// Per-turn protocol engine
///
/// Wraps a provider stream and yields [`TurnEvent`]s: visible text with
/// protocol blocks removed, the lifecycle of every tool request, and a final
/// `finished` event. Construct one per turn with [`TurnEngine::builder`].
pub struct TurnEngine {
    detector: Detector,
    bridge: ProtocolBridge,
    dispatcher: Dispatcher,
    controller: ContinuationController,
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl TurnEngine {
    pub fn builder() -> TurnEngineBuilder {
        TurnEngineBuilder::new()
    }

    pub(super) fn from_parts(
        detector: Detector,
        bridge: ProtocolBridge,
        dispatcher: Dispatcher,
        controller: ContinuationController,
        cancel: CancellationToken,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            detector,
            bridge,
            dispatcher,
            controller,
            cancel,
            logger,
        }
    }

    /// Token that aborts this turn
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn max_continuation_rounds(&self) -> usize {
        self.controller.max_rounds()
    }

    /// Run the turn over the first round's stream
    ///
    /// Nothing happens until the returned stream is polled. Dropping it
    /// stops the turn.
    pub fn run(self, upstream: ProviderStream) -> TurnStream {
        let (sink, rx) = EventSink::channel();
        let drive = self.drive(upstream, sink);

        let events = stream::select(rx.map(Some), stream::once(drive).map(|()| None))
            .filter_map(future::ready);
        Box::pin(events)
    }

    async fn drive(mut self, mut upstream: ProviderStream, sink: EventSink) {
        let mut texts: Vec<String> = Vec::new();
        let mut rounds = 0;

        loop {
            let mut session = SessionState::new();
            self.detector.reset();
            self.detector.set_id_prefix(format!("vcp-{}", rounds));
            rounds += 1;

            log_debug!(self.logger, "[TurnEngine] Streaming round {}", rounds);
            let outcome = self.stream_round(&mut upstream, &mut session, &sink).await;
            if !session.text.is_empty() {
                texts.push(session.text.clone());
            }

            match outcome {
                RoundOutcome::Completed if !self.cancel.is_cancelled() => {}
                RoundOutcome::Completed | RoundOutcome::Aborted => {
                    self.finish(&sink, &texts, rounds, true);
                    return;
                }
                RoundOutcome::Failed(err) => {
                    log_error!(self.logger, "[TurnEngine] Provider stream failed: {}", err);
                    sink.emit(TurnEvent::error(EngineError::Provider(err).to_string()));
                    return;
                }
            }

            match self
                .controller
                .on_turn_end(&session, rounds - 1, &self.cancel)
                .await
            {
                Ok(TurnEnd::Final) => break,
                Ok(TurnEnd::RoundLimitReached { limit }) => {
                    sink.emit(TurnEvent::RoundLimitReached { rounds: limit });
                    break;
                }
                Ok(TurnEnd::Continue(next)) => upstream = next,
                Err(EngineError::Cancelled) => {
                    self.finish(&sink, &texts, rounds, true);
                    return;
                }
                Err(err) => {
                    log_error!(self.logger, "[TurnEngine] {}", err);
                    sink.emit(TurnEvent::error(err.to_string()));
                    return;
                }
            }
        }

        self.finish(&sink, &texts, rounds, false);
    }

    fn finish(&self, sink: &EventSink, texts: &[String], rounds: usize, aborted: bool) {
        if aborted {
            log_info!(self.logger, "[TurnEngine] Turn aborted after {} round(s)", rounds);
        } else {
            log_debug!(self.logger, "[TurnEngine] Turn finished after {} round(s)", rounds);
        }
        sink.emit(TurnEvent::Finished {
            text: texts.join(ROUND_SEPARATOR),
            rounds,
            aborted,
        });
    }

    async fn stream_round(
        &mut self,
        stream: &mut ProviderStream,
        session: &mut SessionState,
        sink: &EventSink,
    ) -> RoundOutcome {
        let mut upstream = Upstream::new(stream);

        loop {
            if self.cancel.is_cancelled() {
                self.flush(session, sink);
                return RoundOutcome::Aborted;
            }

            let event = if let Some(event) = upstream.backlog.pop_front() {
                event
            } else if let Some(err) = upstream.failure.take() {
                self.flush(session, sink);
                return match err {
                    ProviderError::Cancelled => RoundOutcome::Aborted,
                    err => RoundOutcome::Failed(err),
                };
            } else if upstream.ended {
                break;
            } else {
                let next = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => continue,
                    next = upstream.stream.next() => next,
                };
                match next {
                    Some(Ok(event)) => event,
                    Some(Err(err)) => {
                        upstream.failure = Some(err);
                        continue;
                    }
                    None => {
                        upstream.ended = true;
                        continue;
                    }
                }
            };

            self.handle_event(event, &mut upstream, session, sink).await;
        }

        self.flush(session, sink);
        RoundOutcome::Completed
    }

    async fn handle_event(
        &mut self,
        event: ProviderEvent,
        upstream: &mut Upstream<'_>,
        session: &mut SessionState,
        sink: &EventSink,
    ) {
        match event {
            ProviderEvent::TextDelta { text } => {
                self.detector.append(&text);
                self.process_buffer(upstream, session, sink).await;
            }
            ProviderEvent::NativeToolCall { tool_call } => match self.bridge.from_native(&tool_call) {
                Some(request) => {
                    self.emit_visible(session, sink);
                    // A busy detector already queues text for the running batch
                    let owned = self.detector.begin_execution();
                    self.execute(vec![request], upstream, session, sink).await;
                    if owned {
                        self.detector.finish_execution();
                    }
                    self.process_buffer(upstream, session, sink).await;
                }
                None => {
                    log_debug!(
                        self.logger,
                        "[TurnEngine] Passing through provider-executed {}",
                        tool_call.name
                    );
                    sink.emit(TurnEvent::NativePassthrough {
                        event: ProviderEvent::NativeToolCall { tool_call },
                    });
                }
            },
            other => {
                sink.emit(TurnEvent::NativePassthrough { event: other });
            }
        }
    }

    /// Emit safe text and run every complete block, re-checking text that
    /// arrived while a batch executed
    async fn process_buffer(
        &mut self,
        upstream: &mut Upstream<'_>,
        session: &mut SessionState,
        sink: &EventSink,
    ) {
        loop {
            self.emit_visible(session, sink);
            if self.cancel.is_cancelled() {
                return;
            }

            let Some(batch) = self.detector.begin_batch() else {
                return;
            };
            self.emit_visible(session, sink);

            self.execute(batch, upstream, session, sink).await;
            if !self.detector.finish_execution() {
                self.emit_visible(session, sink);
                return;
            }
        }
    }

    /// Dispatch a batch while continuing to read the upstream
    async fn execute(
        &mut self,
        requests: Vec<ToolRequest>,
        upstream: &mut Upstream<'_>,
        session: &mut SessionState,
        sink: &EventSink,
    ) {
        log_debug!(
            self.logger,
            "[TurnEngine] Dispatching batch of {} request(s)",
            requests.len()
        );

        let dispatch = self
            .dispatcher
            .dispatch_all(requests, session, sink, &self.cancel);
        tokio::pin!(dispatch);

        loop {
            let open = upstream.is_open();
            tokio::select! {
                biased;
                _ = &mut dispatch => break,
                next = upstream.stream.next(), if open => match next {
                    Some(Ok(ProviderEvent::TextDelta { text })) if upstream.backlog.is_empty() => {
                        self.detector.append(&text);
                    }
                    Some(Ok(event)) => upstream.backlog.push_back(event),
                    Some(Err(err)) => upstream.failure = Some(err),
                    None => upstream.ended = true,
                },
            }
        }
    }

    fn emit_visible(&mut self, session: &mut SessionState, sink: &EventSink) {
        let text = self.detector.take_visible();
        if !text.is_empty() {
            session.push_text(&text);
            sink.emit(TurnEvent::text(text));
        }
    }

    /// Release everything left in the buffer at round end
    ///
    /// Complete blocks still buffered (only possible after an abort) are
    /// reported as cancelled and never shown.
    fn flush(&mut self, session: &mut SessionState, sink: &EventSink) {
        self.emit_visible(session, sink);
        for request in self.detector.cancel_pending() {
            log_info!(
                self.logger,
                "[TurnEngine] Cancelled {} ({}) without running it",
                request.tool_name,
                request.id
            );
            sink.emit(TurnEvent::ToolCancelled {
                request_id: request.id,
                tool_name: request.tool_name,
                params: request.params,
            });
        }

        let finalized = self.detector.finalize();
        if !finalized.visible.is_empty() {
            session.push_text(&finalized.visible);
            sink.emit(TurnEvent::text(finalized.visible));
        }
    }
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("detector", &self.detector)
            .field("bridge", &self.bridge)
            .field("max_rounds", &self.controller.max_rounds())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
