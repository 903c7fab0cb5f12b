use futures::StreamExt;
use parley_llm::GenerationClient;
use parley_persist::HistoryStore;
use parley_types::{canonical_thread_id, FragmentKind, MessageRole, StreamFragment};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::sink::{fragment_channel, FragmentSink};

/// Most recent messages given to the provider as context
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Fragments buffered between a turn and its transport
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// One chat turn as requested by an authenticated caller
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    pub message: String,
    /// Caller-supplied id; echoed on every fragment
    pub thread_id: String,
    pub session_id: String,
    pub user_id: String,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A completion fragment was forwarded. `assistant_saved` is false when
    /// the reply was empty or could not be stored.
    Completed { assistant_saved: bool },
    /// An error fragment was forwarded
    Failed { detail: String },
    /// The consumer went away; nothing further was sent
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    HistoryLoaded,
    UserMessageSaved,
    Streaming,
    Completed,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HistoryLoaded => "history_loaded",
            Self::UserMessageSaved => "user_message_saved",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Receiving end of a spawned turn
#[derive(Debug)]
pub struct TurnHandle {
    pub fragments: mpsc::Receiver<StreamFragment>,
    /// Cancel to abandon the turn; rows already written stay written
    pub cancellation: CancellationToken,
}

/// Executes chat turns: load history, save the user message, stream the
/// reply to the sink and save the assistant message on completion.
#[derive(Clone)]
pub struct Reconciler {
    history: HistoryStore,
    generation: GenerationClient,
    history_limit: usize,
    turn_timeout: Option<Duration>,
    channel_capacity: usize,
}

impl Reconciler {
    pub fn new(history: HistoryStore, generation: GenerationClient) -> Self {
        Self {
            history,
            generation,
            history_limit: DEFAULT_HISTORY_LIMIT,
            turn_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Abandon generation once it has run this long
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Run the turn on its own task and hand back the fragment receiver
    pub fn spawn_turn(&self, request: ChatTurnRequest) -> TurnHandle {
        let (sink, fragments) = fragment_channel(self.channel_capacity);
        let cancellation = sink.cancellation().clone();
        let reconciler = self.clone();

        let span = info_span!(
            "chat_turn",
            turn_id = %Uuid::new_v4(),
            thread_id = %request.thread_id,
            user_id = %request.user_id,
        );

        tokio::spawn(
            async move {
                let outcome = reconciler.run_turn(request, sink).await;
                info!(?outcome, "Turn finished");
            }
            .instrument(span),
        );

        TurnHandle {
            fragments,
            cancellation,
        }
    }

    /// Run one turn to its end, forwarding every fragment to `sink` as soon
    /// as it is produced.
    ///
    /// Unless cancelled, the sink always receives exactly one terminal
    /// fragment.
    pub async fn run_turn(&self, request: ChatTurnRequest, sink: FragmentSink) -> TurnOutcome {
        let ChatTurnRequest {
            message,
            thread_id,
            session_id,
            user_id,
        } = request;

        let history = match self.history.history(&thread_id, self.history_limit).await {
            Ok(history) => history,
            Err(e) => {
                let detail = format!("Failed to load conversation history: {}", e);
                return fail_before_stream(&sink, &thread_id, &session_id, detail).await;
            }
        };
        info!(state = %TurnState::HistoryLoaded, messages = history.len(), "History loaded");

        let storage_id = canonical_thread_id(&thread_id);

        if let Err(e) = self
            .history
            .append(&storage_id, &session_id, &user_id, MessageRole::User, &message)
            .await
        {
            let detail = format!("Failed to save message: {}", e);
            return fail_before_stream(&sink, &thread_id, &session_id, detail).await;
        }
        info!(state = %TurnState::UserMessageSaved, thread_id = %storage_id, "User message saved");

        let mut fragments = self
            .generation
            .stream_reply(&message, &history, &thread_id, &session_id);
        info!(state = %TurnState::Streaming, provider = self.generation.provider_name(), "Streaming reply");

        let deadline = async {
            match self.turn_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let cancellation = sink.cancellation().clone();
        let mut reply = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!("Turn cancelled by consumer");
                    return TurnOutcome::Cancelled;
                }
                _ = &mut deadline => {
                    let secs = self.turn_timeout.map(|t| t.as_secs()).unwrap_or_default();
                    let detail = format!("generation timed out after {}s", secs);
                    warn!(state = %TurnState::Failed, "{}", detail);
                    return forward_error(&sink, &thread_id, &session_id, detail).await;
                }
                next = fragments.next() => next,
            };

            let Some(fragment) = next else {
                let detail = "generation ended without a terminal fragment".to_string();
                error!(state = %TurnState::Failed, "{}", detail);
                return forward_error(&sink, &thread_id, &session_id, detail).await;
            };

            let kind = fragment.kind;
            if let Some(text) = fragment.text() {
                reply.push_str(text);
            }
            let error_detail = fragment.error_message.clone();

            if sink.send(fragment).await.is_err() {
                info!("Fragment consumer went away");
                return TurnOutcome::Cancelled;
            }

            match kind {
                FragmentKind::Delta => {}
                FragmentKind::Completion => {
                    let assistant_saved = self
                        .save_reply(&storage_id, &session_id, &user_id, &reply)
                        .await;
                    info!(
                        state = %TurnState::Completed,
                        reply_len = reply.len(),
                        assistant_saved,
                        "Generation completed"
                    );
                    return TurnOutcome::Completed { assistant_saved };
                }
                FragmentKind::Error => {
                    let detail = error_detail.unwrap_or_default();
                    error!(state = %TurnState::Failed, error = %detail, "Generation failed");
                    return TurnOutcome::Failed { detail };
                }
            }
        }
    }

    // The client already saw the reply, so a failed save is only logged
    async fn save_reply(
        &self,
        storage_id: &str,
        session_id: &str,
        user_id: &str,
        reply: &str,
    ) -> bool {
        if reply.is_empty() {
            return false;
        }

        match self
            .history
            .append(storage_id, session_id, user_id, MessageRole::Assistant, reply)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(thread_id = storage_id, error = %e, "Failed to save assistant reply");
                false
            }
        }
    }
}

async fn fail_before_stream(
    sink: &FragmentSink,
    thread_id: &str,
    session_id: &str,
    detail: String,
) -> TurnOutcome {
    error!(state = %TurnState::Failed, error = %detail, "Turn failed before streaming");
    forward_error(sink, thread_id, session_id, detail).await
}

async fn forward_error(
    sink: &FragmentSink,
    thread_id: &str,
    session_id: &str,
    detail: String,
) -> TurnOutcome {
    let fragment = StreamFragment::error(thread_id, session_id, detail.clone());
    match sink.send(fragment).await {
        Ok(()) => TurnOutcome::Failed { detail },
        Err(_) => TurnOutcome::Cancelled,
    }
}
