use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::{ChatEvent, DispatchError, EventContext, EventDispatcher, HandlerResult};
use crate::messages::OutboundMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
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

/// Connection to the chat platform's event queue.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `None` once the queue is closed.
    async fn next_event(&self) -> Result<Option<ChatEvent>, TransportError>;
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<ChatEvent>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

enum PumpError {
    Transport(TransportError),
    Fatal(DispatchError),
}

impl From<TransportError> for PumpError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

/// Pulls events off the transport, dispatches them and sends the replies.
pub struct BotRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl BotRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs until the transport closes cleanly. Transport failures reconnect with backoff;
    /// a failed store commit stops the runner.
    pub async fn start(&self) -> Result<(), RunnerError> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(PumpError::Fatal(error)) => {
                    warn!(
                        event_name = "rsvp.runner.stopped",
                        error = %error,
                        "event handling failed fatally; stopping"
                    );
                    let _ = self.transport.disconnect().await;
                    return Err(error.into());
                }
                Err(PumpError::Transport(transport_error)) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted"
                        );
                        return Err(transport_error.into());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), PumpError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            let Some(event) = self.transport.next_event().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            let context = EventContext { correlation_id: Uuid::new_v4().to_string() };
            debug!(
                event_name = "rsvp.ingress.event_received",
                event_type = ?event.event_type(),
                correlation_id = %context.correlation_id,
                "received chat event"
            );

            let replies = match self.dispatcher.dispatch(&event, &context).await {
                Ok(HandlerResult::Replied(replies)) => replies,
                Ok(HandlerResult::Processed | HandlerResult::Ignored) => continue,
                Err(error) if error.is_fatal() => return Err(PumpError::Fatal(error)),
                Err(error) => {
                    warn!(
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "event dispatch failed; continuing event loop"
                    );
                    continue;
                }
            };

            for reply in &replies {
                if let Err(error) = self.transport.send(reply).await {
                    warn!(
                        event_name = "rsvp.egress.send_failed",
                        correlation_id = %context.correlation_id,
                        to = %reply.to,
                        error = %error,
                        "failed to send reply"
                    );
                }
            }
        }
    }
}
