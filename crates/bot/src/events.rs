use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use rsvp_core::{DirectoryError, StoreError};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::messages::{InboundMessage, OutboundMessage};
use crate::router::Router;

/// Events delivered by the chat platform's event queue.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message { message: InboundMessage },
    RealmUser { person: RealmPerson },
    #[serde(other)]
    Unsupported,
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Message { .. } => ChatEventType::Message,
            Self::RealmUser { .. } => ChatEventType::RealmUser,
            Self::Unsupported => ChatEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Message,
    RealmUser,
    Unsupported,
}

/// Profile change for one user. Updates that don't carry a name are skipped.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RealmPerson {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied(Vec<OutboundMessage>),
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

impl DispatchError {
    /// Store failures mean the event mapping can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Handler(EventHandlerError::Store(_)))
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with message and user-directory handlers sharing one router.
pub fn default_dispatcher(router: Arc<Mutex<Router>>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(router.clone()));
    dispatcher.register(RealmUserHandler::new(router));
    dispatcher
}

/// Routes chat messages. The router lock is held for the whole message, so messages are
/// processed one at a time.
pub struct MessageHandler {
    router: Arc<Mutex<Router>>,
}

impl MessageHandler {
    pub fn new(router: Arc<Mutex<Router>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message { message } = event else {
            return Ok(HandlerResult::Ignored);
        };

        let replies = self.router.lock().await.process_message(message)?;
        debug!(
            event_name = "rsvp.message.routed",
            correlation_id = %ctx.correlation_id,
            event_id = %message.event_id(),
            replies = replies.len(),
            "message routed"
        );

        if replies.is_empty() {
            Ok(HandlerResult::Processed)
        } else {
            Ok(HandlerResult::Replied(replies))
        }
    }
}

pub struct RealmUserHandler {
    router: Arc<Mutex<Router>>,
}

impl RealmUserHandler {
    pub fn new(router: Arc<Mutex<Router>>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EventHandler for RealmUserHandler {
    fn event_type(&self) -> ChatEventType {
        ChatEventType::RealmUser
    }

    async fn handle(
        &self,
        event: &ChatEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::RealmUser { person } = event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(full_name) = person.full_name.as_deref() else {
            return Ok(HandlerResult::Ignored);
        };

        if let Err(error) = self.router.lock().await.update_user(&person.email, full_name) {
            warn!(
                event_name = "rsvp.directory.update_failed",
                correlation_id = %ctx.correlation_id,
                email = %person.email,
                error = %error,
                "user directory update failed"
            );
            return Err(error.into());
        }

        info!(
            event_name = "rsvp.directory.updated",
            correlation_id = %ctx.correlation_id,
            email = %person.email,
            "user directory updated"
        );
        Ok(HandlerResult::Processed)
    }
}
