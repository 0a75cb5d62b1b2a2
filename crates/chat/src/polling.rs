use std::collections::HashMap;
use std::{sync::Arc, time::Duration};

use aiaa_core::domain::chat::ChatId;
use aiaa_core::reply::ReplyMessage;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{ChatEnvelope, EventContext, EventDispatcher, HandlerResult};

pub const WORKING_PLACEHOLDER: &str = "🤔 Thinking...";
pub const DISPATCH_FAILED_TEXT: &str = "⚠️ Something went wrong handling that. Please try again.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next inbound update; `None` once the stream has closed.
    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope: &ChatEnvelope) -> Result<(), TransportError>;
    /// Posts a new message and returns its message id.
    async fn send_reply(&self, chat: ChatId, reply: &ReplyMessage) -> Result<i64, TransportError>;
    async fn edit_reply(
        &self,
        chat: ChatId,
        message_id: i64,
        reply: &ReplyMessage,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope: &ChatEnvelope) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_reply(&self, _chat: ChatId, _reply: &ReplyMessage) -> Result<i64, TransportError> {
        Ok(0)
    }

    async fn edit_reply(
        &self,
        _chat: ChatId,
        _message_id: i64,
        _reply: &ReplyMessage,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pulls updates from the transport and answers each one on its own task.
/// Chats run independently; updates within one chat are handled strictly in
/// arrival order, placeholder included.
pub struct PollingRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopChatTransport),
            dispatcher: Arc::new(EventDispatcher::default()),
            reconnect_policy: ReconnectPolicy::default(),
        }
    }
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Runs until the transport closes or reconnects are exhausted. A
    /// connection that delivered updates before failing resets the retry
    /// budget.
    pub async fn start(&self) -> Result<()> {
        let (_keep_open, shutdown) = watch::channel(false);
        self.run_until(shutdown, Duration::ZERO).await
    }

    /// Like [`PollingRunner::start`], but stops polling once `shutdown` turns
    /// true. Replies already in flight get up to `grace` to finish.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>, grace: Duration) -> Result<()> {
        let mut attempt = 0;
        let mut delivered = 0_u64;
        loop {
            let delivered_before = delivered;
            match self.connect_and_pump(attempt, &mut delivered, &mut shutdown, grace).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    if delivered > delivered_before {
                        attempt = 0;
                    }
                    warn!(
                        event_name = "chat.transport.failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "chat.transport.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }
                    if *shutdown.borrow() {
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        delivered: &mut u64,
        shutdown: &mut watch::Receiver<bool>,
        grace: Duration,
    ) -> Result<(), TransportError> {
        info!(event_name = "chat.transport.connecting", attempt, "opening chat transport");
        self.transport.connect().await?;
        info!(event_name = "chat.transport.connected", attempt, "chat transport connected");

        let mut tasks = JoinSet::new();
        let pumped = self.pump(&mut tasks, delivered, shutdown).await;
        if *shutdown.borrow() {
            drain_with_grace(&mut tasks, grace).await;
        }
        while let Some(joined) = tasks.join_next().await {
            log_join_failure(joined);
        }
        pumped
    }

    async fn pump(
        &self,
        tasks: &mut JoinSet<()>,
        delivered: &mut u64,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), TransportError> {
        let mut shutdown_closed = false;
        let mut ordering = ChatOrdering::default();
        loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join_failure(joined);
            }

            let next = tokio::select! {
                next = self.transport.next_envelope() => Some(next?),
                requested = shutdown.wait_for(|stop| *stop), if !shutdown_closed => {
                    shutdown_closed = requested.is_err();
                    if shutdown_closed { continue } else { None }
                }
            };
            let Some(next) = next else {
                info!(
                    event_name = "chat.transport.stopping",
                    in_flight = tasks.len(),
                    "shutdown requested; no longer polling for updates"
                );
                self.transport.disconnect().await?;
                return Ok(());
            };
            let Some(envelope) = next else {
                info!(event_name = "chat.transport.closed", "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *delivered += 1;

            let chat_id = envelope.event.chat_id().map(|chat| chat.0);
            info!(
                event_name = "chat.update.received",
                update_id = envelope.update_id,
                event_type = ?envelope.event.event_type(),
                chat_id = chat_id.unwrap_or_default(),
                "received chat update"
            );

            if let Err(error) = self.transport.acknowledge(&envelope).await {
                warn!(
                    event_name = "chat.update.ack_failed",
                    update_id = envelope.update_id,
                    error = %error,
                    "failed to acknowledge chat update"
                );
            } else {
                debug!(
                    event_name = "chat.update.ack_sent",
                    update_id = envelope.update_id,
                    "acknowledged chat update"
                );
            }

            let turn = ordering.enqueue(envelope.event.chat_id());
            tasks.spawn(process_envelope(
                self.transport.clone(),
                self.dispatcher.clone(),
                envelope,
                turn,
            ));
        }
    }
}

/// Chains the updates of each chat: an update's task waits for the previous
/// update of the same chat to finish before it starts.
#[derive(Default)]
struct ChatOrdering {
    tails: HashMap<i64, oneshot::Receiver<()>>,
}

impl ChatOrdering {
    fn enqueue(&mut self, chat: Option<ChatId>) -> ChatTurn {
        // Finished chats drop out so the map only holds chats with work queued.
        self.tails.retain(|_, tail| matches!(tail.try_recv(), Err(TryRecvError::Empty)));

        let Some(chat) = chat else {
            return ChatTurn { previous: None, _release: None };
        };
        let (release, tail) = oneshot::channel();
        let previous = self.tails.insert(chat.0, tail);
        ChatTurn { previous, _release: Some(release) }
    }
}

/// Dropping the turn lets the chat's next update proceed.
struct ChatTurn {
    previous: Option<oneshot::Receiver<()>>,
    _release: Option<oneshot::Sender<()>>,
}

impl ChatTurn {
    async fn wait(&mut self) {
        if let Some(previous) = self.previous.take() {
            // The sender is only ever dropped; either outcome means our turn.
            let _ = previous.await;
        }
    }
}

async fn process_envelope(
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<EventDispatcher>,
    envelope: ChatEnvelope,
    mut turn: ChatTurn,
) {
    turn.wait().await;
    let ctx = EventContext { correlation_id: format!("update-{}", envelope.update_id) };
    let chat = envelope.event.chat_id();

    let placeholder = match chat {
        Some(chat) if envelope.event.wants_working_indicator() => {
            match transport.send_reply(chat, &ReplyMessage::plain(WORKING_PLACEHOLDER)).await {
                Ok(message_id) => Some(message_id),
                Err(error) => {
                    warn!(
                        event_name = "chat.reply.placeholder_failed",
                        chat_id = chat.0,
                        correlation_id = %ctx.correlation_id,
                        error = %error,
                        "could not post working indicator"
                    );
                    None
                }
            }
        }
        _ => None,
    };

    let reply = match dispatcher.dispatch(&envelope, &ctx).await {
        Ok(HandlerResult::Responded(reply)) => reply,
        Ok(HandlerResult::Ignored) => {
            debug!(
                event_name = "chat.update.ignored",
                correlation_id = %ctx.correlation_id,
                "no handler produced a reply"
            );
            return;
        }
        Err(error) => {
            warn!(
                event_name = "chat.update.dispatch_failed",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "event dispatch failed; continuing polling loop"
            );
            ReplyMessage::plain(DISPATCH_FAILED_TEXT)
        }
    };

    if let Some(chat) = chat {
        deliver(transport.as_ref(), chat, placeholder, &reply, &ctx).await;
    }
}

/// Replaces the placeholder with the reply, or posts the reply fresh when
/// there is no placeholder or the edit is refused.
async fn deliver(
    transport: &dyn ChatTransport,
    chat: ChatId,
    placeholder: Option<i64>,
    reply: &ReplyMessage,
    ctx: &EventContext,
) {
    if let Some(message_id) = placeholder {
        match transport.edit_reply(chat, message_id, reply).await {
            Ok(()) => return,
            Err(error) => warn!(
                event_name = "chat.reply.edit_failed",
                chat_id = chat.0,
                correlation_id = %ctx.correlation_id,
                error = %error,
                "editing placeholder failed, sending a new message"
            ),
        }
    }

    if let Err(error) = transport.send_reply(chat, reply).await {
        warn!(
            event_name = "chat.reply.send_failed",
            chat_id = chat.0,
            correlation_id = %ctx.correlation_id,
            error = %error,
            "reply could not be delivered"
        );
    }
}

/// Waits up to `grace` for in-flight replies, then aborts the rest.
async fn drain_with_grace(tasks: &mut JoinSet<()>, grace: Duration) {
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = tasks.join_next().await {
            log_join_failure(joined);
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            event_name = "chat.update.aborted",
            remaining = tasks.len(),
            "grace period elapsed; aborting unfinished replies"
        );
        tasks.abort_all();
    }
}

fn log_join_failure(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        warn!(event_name = "chat.update.task_failed", error = %error, "update task did not complete");
    }
}
