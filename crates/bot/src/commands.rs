//! Command recognition.
//!
//! Each line addressed to the bot is tried against the command patterns in priority order;
//! the first match wins. Decision words are matched last because they may appear anywhere in
//! the line.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rsvp_core::Decision;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Init,
    Help,
    Cancel,
    Move,
    SetLimit,
    SetDate,
    SetTime,
    SetTimeAllDay,
    SetStringAttribute,
    SetDuration,
    Summary,
    Ping,
    Credits,
    AddToCalendar,
    Confirm,
}

impl CommandKind {
    /// Matching priority.
    pub const ORDER: [CommandKind; 15] = [
        CommandKind::Init,
        CommandKind::Help,
        CommandKind::Cancel,
        CommandKind::Move,
        CommandKind::SetLimit,
        CommandKind::SetDate,
        CommandKind::SetTime,
        CommandKind::SetTimeAllDay,
        CommandKind::SetStringAttribute,
        CommandKind::SetDuration,
        CommandKind::Summary,
        CommandKind::Ping,
        CommandKind::Credits,
        CommandKind::AddToCalendar,
        CommandKind::Confirm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Help => "help",
            Self::Cancel => "cancel",
            Self::Move => "move",
            Self::SetLimit => "set_limit",
            Self::SetDate => "set_date",
            Self::SetTime => "set_time",
            Self::SetTimeAllDay => "set_time_all_day",
            Self::SetStringAttribute => "set_string_attribute",
            Self::SetDuration => "set_duration",
            Self::Summary => "summary",
            Self::Ping => "ping",
            Self::Credits => "credits",
            Self::AddToCalendar => "add_to_calendar",
            Self::Confirm => "confirm",
        }
    }

    /// Init and Help work in threads that are not events yet.
    pub fn needs_event(&self) -> bool {
        !matches!(self, Self::Init | Self::Help)
    }

    fn pattern(&self) -> Option<&'static str> {
        Some(match self {
            Self::Init => r"init$",
            Self::Help => r"help$",
            Self::Cancel => r"cancel$",
            Self::Move => r"move (?P<destination>.+)$",
            Self::SetLimit => r"set limit (?P<limit>\d+)$",
            Self::SetDate => r"set date (?P<date>.*)$",
            Self::SetTime => r"set time (?P<hours>\d{1,2}):(?P<minutes>\d{1,2})$",
            Self::SetTimeAllDay => r"set time allday$",
            Self::SetStringAttribute => {
                r"set (?P<attribute>location|place|description) (?P<value>.+)$"
            }
            Self::SetDuration => r"set duration (?P<duration>.+)$",
            Self::Summary => r"(?:summary|status)$",
            Self::Ping => r"ping(?: (?P<message>.+))?$",
            Self::Credits => r"credits$",
            Self::AddToCalendar => r"add to calendar$",
            Self::Confirm => return None,
        })
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringAttribute {
    Place,
    Description,
}

impl StringAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Place => "place",
            Self::Description => "description",
        }
    }
}

/// A recognised command with its captured arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Init,
    Help,
    Cancel,
    Move { destination: String },
    /// Digits as typed; may not fit a `u32`.
    SetLimit { limit: String },
    SetDate { date: String },
    SetTime { hours: u32, minutes: u32 },
    SetTimeAllDay,
    SetStringAttribute { attribute: StringAttribute, value: String },
    SetDuration { duration: String },
    Summary,
    Ping { message: Option<String> },
    Credits,
    AddToCalendar,
    Confirm { decision: Decision },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Init => CommandKind::Init,
            Self::Help => CommandKind::Help,
            Self::Cancel => CommandKind::Cancel,
            Self::Move { .. } => CommandKind::Move,
            Self::SetLimit { .. } => CommandKind::SetLimit,
            Self::SetDate { .. } => CommandKind::SetDate,
            Self::SetTime { .. } => CommandKind::SetTime,
            Self::SetTimeAllDay => CommandKind::SetTimeAllDay,
            Self::SetStringAttribute { .. } => CommandKind::SetStringAttribute,
            Self::SetDuration { .. } => CommandKind::SetDuration,
            Self::Summary => CommandKind::Summary,
            Self::Ping { .. } => CommandKind::Ping,
            Self::Credits => CommandKind::Credits,
            Self::AddToCalendar => CommandKind::AddToCalendar,
            Self::Confirm { .. } => CommandKind::Confirm,
        }
    }
}

/// Failures a command reports back to the user. None of them mutate state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Precondition(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    Capacity(String),
    #[error("{0}")]
    Unrecognized(String),
    /// An outside service refused or is missing.
    #[error("{0}")]
    Adapter(String),
}

impl CommandError {
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::Precondition(message)
            | Self::Authorization(message)
            | Self::Capacity(message)
            | Self::Unrecognized(message)
            | Self::Adapter(message) => message,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Precondition(_) => "precondition",
            Self::Authorization(_) => "authorization",
            Self::Capacity(_) => "capacity",
            Self::Unrecognized(_) => "unrecognized",
            Self::Adapter(_) => "adapter",
        }
    }
}

#[derive(Debug)]
pub struct CommandRegistry {
    addressed: Regex,
    confirm: Regex,
    patterns: Vec<(CommandKind, Regex)>,
}

impl CommandRegistry {
    pub fn new(key_word: &str) -> Result<Self, regex::Error> {
        let prefix = regex::escape(key_word);
        let mut patterns = Vec::with_capacity(CommandKind::ORDER.len());
        for kind in CommandKind::ORDER {
            if let Some(pattern) = kind.pattern() {
                patterns.push((kind, Regex::new(&format!("(?is)^{prefix} {pattern}"))?));
            }
        }

        Ok(Self {
            addressed: Regex::new(&format!("(?i)^{prefix}"))?,
            confirm: Regex::new(&format!("(?is)^{prefix} (?P<rest>.*)$"))?,
            patterns,
        })
    }

    /// Whether the line is meant for the bot at all.
    pub fn is_addressed(&self, line: &str) -> bool {
        self.addressed.is_match(line)
    }

    pub fn parse(&self, line: &str) -> Option<Command> {
        for (kind, pattern) in &self.patterns {
            if let Some(captures) = pattern.captures(line) {
                return build_command(*kind, &captures);
            }
        }

        let rest = self.confirm.captures(line)?.name("rest")?.as_str();
        find_decision(rest).map(|decision| Command::Confirm { decision })
    }
}

fn build_command(kind: CommandKind, captures: &regex::Captures<'_>) -> Option<Command> {
    let text = |name: &str| captures.name(name).map(|value| value.as_str().to_owned());

    Some(match kind {
        CommandKind::Init => Command::Init,
        CommandKind::Help => Command::Help,
        CommandKind::Cancel => Command::Cancel,
        CommandKind::Move => Command::Move { destination: text("destination")? },
        CommandKind::SetLimit => Command::SetLimit { limit: text("limit")? },
        CommandKind::SetDate => Command::SetDate { date: text("date").unwrap_or_default() },
        CommandKind::SetTime => Command::SetTime {
            hours: text("hours")?.parse().ok()?,
            minutes: text("minutes")?.parse().ok()?,
        },
        CommandKind::SetTimeAllDay => Command::SetTimeAllDay,
        CommandKind::SetStringAttribute => {
            let attribute = match text("attribute")?.to_ascii_lowercase().as_str() {
                "description" => StringAttribute::Description,
                _ => StringAttribute::Place,
            };
            Command::SetStringAttribute { attribute, value: text("value")? }
        }
        CommandKind::SetDuration => Command::SetDuration { duration: text("duration")? },
        CommandKind::Summary => Command::Summary,
        CommandKind::Ping => Command::Ping { message: text("message") },
        CommandKind::Credits => Command::Credits,
        CommandKind::AddToCalendar => Command::AddToCalendar,
        CommandKind::Confirm => return None,
    })
}

const YES_WORDS: &[&str] =
    &["ye(s+)", "yea(h+)", "in", "yep", "ya(s+)", ":thumbs_?up:", "y", r":\+1:"];
const NO_WORDS: &[&str] = &["n(o+)", "out", "nope", "na(h+)", ":thumbs_?down:", "n", ":-1:"];
const MAYBE_WORDS: &[&str] = &["maybe"];

struct DecisionMatcher {
    alternatives: Vec<(Decision, Regex)>,
}

impl DecisionMatcher {
    fn build() -> Result<Self, regex::Error> {
        let mut alternatives = Vec::new();
        for (decision, words) in
            [(Decision::Yes, YES_WORDS), (Decision::No, NO_WORDS), (Decision::Maybe, MAYBE_WORDS)]
        {
            for word in words {
                alternatives.push((decision, Regex::new(&format!("(?i)^(?:{word})"))?));
            }
        }
        Ok(Self { alternatives })
    }

    /// First decision word standing on its own. A word is delimited by anything that is not
    /// alphanumeric or `_`, so `:+1:` counts as a word while `yesterday` does not match `yes`.
    fn find(&self, text: &str) -> Option<Decision> {
        let mut previous: Option<char> = None;
        for (offset, ch) in text.char_indices() {
            if !previous.is_some_and(is_word_char) {
                let candidate = &text[offset..];
                for (decision, pattern) in &self.alternatives {
                    let Some(found) = pattern.find(candidate) else {
                        continue;
                    };
                    let after = candidate[found.end()..].chars().next();
                    if !after.is_some_and(is_word_char) {
                        return Some(*decision);
                    }
                }
            }
            previous = Some(ch);
        }
        None
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

static DECISIONS: LazyLock<DecisionMatcher> =
    LazyLock::new(|| DecisionMatcher::build().expect("regex"));

/// Finds the decision expressed in free text such as `yes! see you there` or `:thumbsup:`.
pub fn find_decision(text: &str) -> Option<Decision> {
    DECISIONS.find(text)
}

#[cfg(test)]
mod tests {
    use rsvp_core::Decision;

    use super::{
        find_decision, Command, CommandKind, CommandRegistry, DecisionMatcher, StringAttribute,
    };

    fn registry() -> CommandRegistry {
        CommandRegistry::new("rsvp").expect("registry")
    }

    #[test]
    fn recognises_every_command() {
        let registry = registry();
        let cases = [
            ("rsvp init", Command::Init),
            ("rsvp help", Command::Help),
            ("rsvp cancel", Command::Cancel),
            (
                "rsvp move https://zulip.com/#narrow/stream/a/topic/b",
                Command::Move {
                    destination: "https://zulip.com/#narrow/stream/a/topic/b".to_owned(),
                },
            ),
            ("rsvp set limit 10", Command::SetLimit { limit: "10".to_owned() }),
            ("rsvp set date tomorrow", Command::SetDate { date: "tomorrow".to_owned() }),
            ("rsvp set time 9:05", Command::SetTime { hours: 9, minutes: 5 }),
            ("rsvp set time allday", Command::SetTimeAllDay),
            (
                "rsvp set location Hopper!",
                Command::SetStringAttribute {
                    attribute: StringAttribute::Place,
                    value: "Hopper!".to_owned(),
                },
            ),
            ("rsvp set duration 1h 30m", Command::SetDuration { duration: "1h 30m".to_owned() }),
            ("rsvp summary", Command::Summary),
            ("rsvp status", Command::Summary),
            ("rsvp ping", Command::Ping { message: None }),
            ("rsvp ping come on!", Command::Ping { message: Some("come on!".to_owned()) }),
            ("rsvp credits", Command::Credits),
            ("rsvp add to calendar", Command::AddToCalendar),
            ("rsvp maybe", Command::Confirm { decision: Decision::Maybe }),
        ];

        for (line, expected) in cases {
            assert_eq!(registry.parse(line), Some(expected), "line: {line}");
        }
    }

    #[test]
    fn key_word_is_case_insensitive() {
        let registry = registry();
        assert_eq!(registry.parse("RSVP yes plz"), Some(Command::Confirm { decision: Decision::Yes }));
        assert!(registry.is_addressed("Rsvp whatever"));
        assert!(!registry.is_addressed("see you at the rsvp"));
    }

    #[test]
    fn attribute_values_may_contain_decision_words() {
        assert_eq!(
            registry().parse("rsvp set description lets do this yes!"),
            Some(Command::SetStringAttribute {
                attribute: StringAttribute::Description,
                value: "lets do this yes!".to_owned(),
            })
        );
    }

    #[test]
    fn decision_words_must_stand_alone() {
        let registry = registry();
        assert_eq!(registry.parse("rsvp yesterday"), None);
        assert_eq!(registry.parse("rsvp nose jobs"), None);
        assert_eq!(registry.parse("rsvp eyes"), None);
        assert_eq!(registry.parse("rsvp init now"), None);
    }

    #[test]
    fn every_decision_word_compiles() {
        assert!(DecisionMatcher::build().is_ok());
    }

    #[test]
    fn first_standalone_decision_wins() {
        assert_eq!(find_decision("no, yes i was there yesterday."), Some(Decision::No));
        assert_eq!(find_decision("yes! i couldn't say no"), Some(Decision::Yes));
        assert_eq!(find_decision("no eyes"), Some(Decision::No));
        assert_eq!(find_decision("hell NO!"), Some(Decision::No));
        assert_eq!(find_decision("nah can't make it :(!"), Some(Decision::No));
        assert_eq!(find_decision("nooooooooooooo!"), Some(Decision::No));
    }

    #[test]
    fn recognises_yes_variants_and_emoji() {
        let yes_words =
            ["yes", "yesss", "yeah", "yeahhh", "in", "yep", "yasss", "y", ":thumbsup:", ":+1:"];
        for text in yes_words {
            assert_eq!(find_decision(text), Some(Decision::Yes), "text: {text}");
        }
        for text in ["out", "nope", ":thumbsdown:", ":-1:", "n"] {
            assert_eq!(find_decision(text), Some(Decision::No), "text: {text}");
        }
    }

    #[test]
    fn custom_key_words_are_escaped() {
        let registry = CommandRegistry::new("r.s").expect("registry");
        assert_eq!(registry.parse("r.s init"), Some(Command::Init));
        assert_eq!(registry.parse("rxs init"), None);
    }

    #[test]
    fn ordering_keeps_confirm_last() {
        assert_eq!(CommandKind::ORDER.last(), Some(&CommandKind::Confirm));
        assert!(!CommandKind::Help.needs_event());
        assert!(CommandKind::Credits.needs_event());
    }
}
