mod bootstrap;
mod stdio;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rsvp_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "rsvp-server",
    about = "RSVP chat bot",
    long_about = "Reads chat events as JSON lines on stdin, answers RSVP commands, and writes \
                  outbound messages as JSON lines on stdout.",
    after_help = "Examples:\n  rsvp-server --config rsvpbot.toml\n  rsvp-server --key-word party --events-path /var/lib/rsvp/events.json\n\n\
                  The [calendar] calendar_id and credentials_path settings are reserved: this \
                  build has no calendar client and only warns when they are set."
)]
struct Cli {
    #[arg(long, help = "Path to a TOML config file (must exist when given)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Word that addresses the bot, e.g. `rsvp`")]
    key_word: Option<String>,
    #[arg(long, help = "Chat site URL used for topic links")]
    site_url: Option<String>,
    #[arg(long, help = "Where the event mapping is stored")]
    events_path: Option<PathBuf>,
    #[arg(long, help = "Where the user directory is stored")]
    users_path: Option<PathBuf>,
    #[arg(long, help = "trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[arg(long, help = "compact|pretty|json")]
    log_format: Option<String>,
}

impl Cli {
    fn load_options(self) -> Result<LoadOptions> {
        let log_format = self.log_format.as_deref().map(str::parse::<LogFormat>).transpose()?;
        Ok(LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config,
            overrides: ConfigOverrides {
                key_word: self.key_word,
                site_url: self.site_url,
                events_path: self.events_path,
                users_path: self.users_path,
                log_level: self.log_level,
                log_format,
            },
        })
    }
}

fn init_logging(config: &AppConfig) {
    use rsvp_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    // stdout carries the chat transport.
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.load_options()?)?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config, Arc::new(stdio::LineTransport::stdio()))?;
    tracing::info!(
        event_name = "rsvp.server.started",
        correlation_id = "bootstrap",
        key_word = %app.config.bot.key_word,
        "rsvp-server started"
    );

    tokio::select! {
        result = app.runner.start() => result?,
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "rsvp.server.stopping",
        correlation_id = "shutdown",
        "rsvp-server stopping"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use rsvp_core::config::LogFormat;

    use super::Cli;

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::parse_from([
            "rsvp-server",
            "--key-word",
            "party",
            "--events-path",
            "/tmp/events.json",
            "--log-format",
            "json",
        ]);

        let options = cli.load_options().expect("options");
        assert!(!options.require_file);
        assert_eq!(options.overrides.key_word.as_deref(), Some("party"));
        assert_eq!(options.overrides.log_format, Some(LogFormat::Json));
        assert_eq!(
            options.overrides.events_path.as_deref(),
            Some(std::path::Path::new("/tmp/events.json"))
        );
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let options = Cli::parse_from(["rsvp-server", "--config", "custom.toml"])
            .load_options()
            .expect("options");
        assert!(options.require_file);
    }

    #[test]
    fn help_marks_calendar_settings_as_reserved() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("calendar_id and credentials_path settings are reserved"));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let cli = Cli::parse_from(["rsvp-server", "--log-format", "xml"]);
        assert!(cli.load_options().is_err());
    }
}
