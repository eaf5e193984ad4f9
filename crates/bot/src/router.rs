use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rsvp_core::config::AppConfig;
use rsvp_core::{
    CalendarClient, Clock, DirectoryError, Event, EventId, EventMap, EventStore, InMemoryDirectory,
    StoreError, SystemClock, UnconfiguredCalendar, UserDirectory,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::commands::{CommandKind, CommandRegistry};
use crate::executor::{CommandContext, Executor};
use crate::messages::{InboundMessage, MessageKind, OutboundMessage, Reply};
use crate::texts;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterSettings {
    pub key_word: String,
    pub site_url: String,
    pub time_zone: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            key_word: "rsvp".to_owned(),
            site_url: "https://zulip.com".to_owned(),
            time_zone: "America/New_York".to_owned(),
        }
    }
}

impl From<&AppConfig> for RouterSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            key_word: config.bot.key_word.clone(),
            site_url: config.chat.site_url.clone(),
            time_zone: config.calendar.time_zone.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("key word cannot be turned into a command pattern: {0}")]
    KeyWord(#[from] regex::Error),
}

/// Owns the event mapping and turns chat messages into replies.
///
/// Every successful command is followed by a full commit to the store before the next line
/// of the same message is looked at.
pub struct Router {
    settings: RouterSettings,
    registry: CommandRegistry,
    events: EventMap,
    store: Box<dyn EventStore>,
    calendar: Box<dyn CalendarClient>,
    directory: Box<dyn UserDirectory>,
    rng: Box<dyn RngCore + Send>,
    clock: Box<dyn Clock>,
}

impl Router {
    pub fn new(settings: RouterSettings, store: Box<dyn EventStore>) -> Result<Self, RouterError> {
        let registry = CommandRegistry::new(&settings.key_word)?;
        let events = store.load_all();
        info!(
            event_name = "rsvp.router.loaded",
            events = events.len(),
            key_word = %settings.key_word,
            "event mapping loaded"
        );

        Ok(Self {
            settings,
            registry,
            events,
            store,
            calendar: Box::new(UnconfiguredCalendar),
            directory: Box::new(InMemoryDirectory::new()),
            rng: Box::new(StdRng::from_entropy()),
            clock: Box::new(SystemClock),
        })
    }

    pub fn with_calendar(mut self, calendar: Box<dyn CalendarClient>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_directory(mut self, directory: Box<dyn UserDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore + Send>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventMap {
        &self.events
    }

    pub fn event(&self, event_id: &EventId) -> Option<&Event> {
        self.events.get(event_id)
    }

    /// Records a display name for `id` in the user directory.
    pub fn update_user(&mut self, id: &str, full_name: &str) -> Result<(), DirectoryError> {
        self.directory.upsert(id, full_name)
    }

    /// Routes every addressed line of `message` and returns the replies in line order.
    pub fn route(&mut self, message: &InboundMessage) -> Result<Vec<Reply>, StoreError> {
        let event_id = message.event_id();
        let mut replies = Vec::new();

        for line in normalize_whitespace(&message.content) {
            if !self.registry.is_addressed(&line) {
                continue;
            }

            let Some(command) = self.registry.parse(&line) else {
                debug!(
                    event_name = "rsvp.command.unrecognized",
                    event_id = %event_id,
                    line = %line,
                    "addressed line matched no command"
                );
                replies.push(Reply::private(
                    texts::invalid_command(&line, &self.settings.key_word),
                    &message.sender_email,
                ));
                continue;
            };

            let kind = command.kind();
            if kind.needs_event() && !self.events.contains_key(&event_id) {
                replies.push(Reply::private(
                    texts::not_an_event(&self.settings.key_word),
                    &message.sender_email,
                ));
                continue;
            }

            let today = self.clock.today();
            let mut executor = Executor {
                settings: &self.settings,
                events: &mut self.events,
                calendar: self.calendar.as_mut(),
                directory: self.directory.as_ref(),
                rng: self.rng.as_mut(),
                today,
            };

            match executor.execute(&command, &CommandContext { event_id: &event_id, message }) {
                Ok(command_replies) => {
                    self.store.commit_all(&self.events)?;
                    info!(
                        event_name = "rsvp.command.executed",
                        event_id = %event_id,
                        command = %kind,
                        replies = command_replies.len(),
                        "command executed"
                    );
                    replies.extend(command_replies);
                }
                Err(error) => {
                    warn!(
                        event_name = "rsvp.command.rejected",
                        event_id = %event_id,
                        command = %kind,
                        category = error.category(),
                        error = %error,
                        "command rejected"
                    );
                    let body = error.user_message().to_owned();
                    replies.push(match error_audience(kind) {
                        MessageKind::Stream => Reply::stream(body),
                        MessageKind::Private => Reply::private(body, &message.sender_email),
                    });
                }
            }
        }

        Ok(replies)
    }

    /// Routes `message` and addresses every reply for the transport.
    pub fn process_message(
        &mut self,
        message: &InboundMessage,
    ) -> Result<Vec<OutboundMessage>, StoreError> {
        Ok(self
            .route(message)?
            .into_iter()
            .map(|reply| OutboundMessage::resolve(reply, message))
            .collect())
    }
}

/// Where a failing command reports: commands that affect the whole thread answer in it.
fn error_audience(kind: CommandKind) -> MessageKind {
    match kind {
        CommandKind::Cancel | CommandKind::Move | CommandKind::AddToCalendar => MessageKind::Stream,
        _ => MessageKind::Private,
    }
}

/// Splits `content` into lines with whitespace runs collapsed, dropping blank lines.
pub fn normalize_whitespace(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}
