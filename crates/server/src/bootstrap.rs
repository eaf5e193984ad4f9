use std::sync::Arc;

use rsvp_bot::events::default_dispatcher;
use rsvp_bot::router::{Router, RouterError, RouterSettings};
use rsvp_bot::runner::{BotRunner, ChatTransport, ReconnectPolicy};
use rsvp_core::config::AppConfig;
use rsvp_core::{JsonFileStore, JsonUserDirectory, UnconfiguredCalendar};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub runner: BotRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Wires the file-backed adapters and the runner around an already loaded config.
pub fn bootstrap_with_config(
    config: AppConfig,
    transport: Arc<dyn ChatTransport>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "rsvp.bootstrap.start",
        correlation_id = "bootstrap",
        events_path = %config.storage.events_path.display(),
        users_path = %config.storage.users_path.display(),
        "starting application bootstrap"
    );

    if config.calendar.is_configured() {
        warn!(
            event_name = "rsvp.bootstrap.calendar_unavailable",
            correlation_id = "bootstrap",
            "calendar settings present but this build has no calendar client; \
             calendar commands will report that no calendar is connected"
        );
    }

    let store = JsonFileStore::new(config.storage.events_path.clone());
    let directory = JsonUserDirectory::open(config.storage.users_path.clone());
    let router = Router::new(RouterSettings::from(&config), Box::new(store))?
        .with_directory(Box::new(directory))
        .with_calendar(Box::new(UnconfiguredCalendar));

    let dispatcher = default_dispatcher(Arc::new(Mutex::new(router)));
    let runner = BotRunner::new(transport, dispatcher, ReconnectPolicy::default());
    info!(
        event_name = "rsvp.bootstrap.ready",
        correlation_id = "bootstrap",
        key_word = %config.bot.key_word,
        "bot wired"
    );

    Ok(Application { config, runner })
}
