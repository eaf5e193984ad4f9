use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rsvp_core::calendar::{CalendarClient, CalendarEntry};
use rsvp_core::narrow::parse_narrow_url;
use rsvp_core::schedule::{parse_date, parse_duration};
use rsvp_core::{
    CalendarError, ConfirmOutcome, Decision, DomainError, Event, EventId, EventMap, EventTime,
    SenderId, UserDirectory,
};
use tracing::{debug, info, warn};

use crate::commands::{Command, CommandError, StringAttribute};
use crate::messages::{InboundMessage, Reply};
use crate::router::RouterSettings;
use crate::texts;

const FLOURISH_PROBABILITY: f64 = 0.1;

/// Who issued a command and where.
#[derive(Clone, Copy, Debug)]
pub struct CommandContext<'a> {
    pub event_id: &'a EventId,
    pub message: &'a InboundMessage,
}

impl CommandContext<'_> {
    fn sender_email(&self) -> &str {
        &self.message.sender_email
    }

    fn sender_id(&self) -> &SenderId {
        &self.message.sender_id
    }
}

/// Runs one command against the event mapping. On error nothing has been mutated.
pub struct Executor<'a> {
    pub settings: &'a RouterSettings,
    pub events: &'a mut EventMap,
    pub calendar: &'a mut dyn CalendarClient,
    pub directory: &'a dyn UserDirectory,
    pub rng: &'a mut (dyn RngCore + Send),
    pub today: NaiveDate,
}

impl Executor<'_> {
    pub fn execute(
        &mut self,
        command: &Command,
        context: &CommandContext<'_>,
    ) -> Result<Vec<Reply>, CommandError> {
        if command.kind().needs_event() && !self.events.contains_key(context.event_id) {
            return Err(CommandError::Precondition(texts::not_an_event(&self.settings.key_word)));
        }

        match command {
            Command::Init => self.init(context),
            Command::Help => Ok(vec![Reply::private(
                texts::help(&self.settings.key_word),
                context.sender_email(),
            )]),
            Command::Cancel => self.cancel(context),
            Command::Move { destination } => self.move_event(context, destination),
            Command::SetLimit { limit } => self.set_limit(context, limit),
            Command::SetDate { date } => self.set_date(context, date),
            Command::SetTime { hours, minutes } => self.set_time(context, *hours, *minutes),
            Command::SetTimeAllDay => {
                self.event_mut(context.event_id)?.time = None;
                Ok(vec![Reply::private(texts::all_day(context.event_id), context.sender_email())])
            }
            Command::SetStringAttribute { attribute, value } => {
                self.set_string_attribute(context, *attribute, value)
            }
            Command::SetDuration { duration } => self.set_duration(context, duration),
            Command::Summary => {
                let event = self.event(context.event_id)?;
                Ok(vec![Reply::stream(texts::summary(event, self.directory))])
            }
            Command::Ping { message } => {
                let event = self.event(context.event_id)?;
                Ok(vec![Reply::stream(texts::ping(event, self.directory, message.as_deref()))])
            }
            Command::Credits => Ok(vec![Reply::private(texts::credits(), context.sender_email())]),
            Command::AddToCalendar => self.add_to_calendar(context),
            Command::Confirm { decision } => self.confirm(context, *decision),
        }
    }

    fn event(&self, event_id: &EventId) -> Result<&Event, CommandError> {
        self.events.get(event_id).ok_or_else(|| {
            CommandError::Precondition(texts::not_an_event(&self.settings.key_word))
        })
    }

    fn event_mut(&mut self, event_id: &EventId) -> Result<&mut Event, CommandError> {
        let key_word = &self.settings.key_word;
        self.events
            .get_mut(event_id)
            .ok_or_else(|| CommandError::Precondition(texts::not_an_event(key_word)))
    }

    fn init(&mut self, context: &CommandContext<'_>) -> Result<Vec<Reply>, CommandError> {
        if self.events.contains_key(context.event_id) {
            return Err(CommandError::Precondition(texts::ALREADY_AN_EVENT.to_owned()));
        }

        let event = Event::new(
            &context.message.subject,
            context.sender_id().clone(),
            self.today,
            context.sender_email(),
        );
        self.events.insert(context.event_id.clone(), event);
        info!(
            event_name = "rsvp.event.created",
            event_id = %context.event_id,
            creator = %context.sender_id(),
            "event created"
        );
        Ok(vec![Reply::stream(texts::init_successful(&self.settings.key_word))])
    }

    fn ensure_creator(
        &self,
        context: &CommandContext<'_>,
        action: &'static str,
    ) -> Result<(), CommandError> {
        if self.event(context.event_id)?.is_creator(context.sender_id()) {
            return Ok(());
        }
        info!(
            event_name = "rsvp.command.unauthorized",
            event_id = %context.event_id,
            sender_id = %context.sender_id(),
            action,
            "only the creator may do this"
        );
        Err(CommandError::Authorization(texts::NOT_AUTHORIZED.to_owned()))
    }

    fn cancel(&mut self, context: &CommandContext<'_>) -> Result<Vec<Reply>, CommandError> {
        self.ensure_creator(context, "cancel")?;
        self.events.remove(context.event_id);
        info!(event_name = "rsvp.event.cancelled", event_id = %context.event_id, "event cancelled");
        Ok(vec![Reply::stream(texts::EVENT_CANCELED)])
    }

    fn move_event(
        &mut self,
        context: &CommandContext<'_>,
        destination: &str,
    ) -> Result<Vec<Reply>, CommandError> {
        self.ensure_creator(context, "move")?;

        let target = parse_narrow_url(destination)
            .ok_or_else(|| CommandError::Validation(texts::bad_move_destination(destination)))?;
        let new_id = EventId::new(&target.stream, &target.topic);
        if self.events.contains_key(&new_id) {
            return Err(CommandError::Precondition(texts::move_already_an_event(&new_id)));
        }

        let Some(mut event) = self.events.remove(context.event_id) else {
            return Err(CommandError::Precondition(texts::not_an_event(&self.settings.key_word)));
        };
        event.name = target.topic.clone();
        self.events.insert(new_id.clone(), event);
        info!(
            event_name = "rsvp.event.moved",
            event_id = %context.event_id,
            destination_event_id = %new_id,
            "event moved"
        );

        Ok(vec![
            Reply::stream(texts::event_moved(&new_id, destination)),
            Reply::to_topic(
                texts::init_successful(&self.settings.key_word),
                target.stream,
                target.topic,
            ),
        ])
    }

    fn set_limit(
        &mut self,
        context: &CommandContext<'_>,
        raw: &str,
    ) -> Result<Vec<Reply>, CommandError> {
        let limit: u32 =
            raw.parse().map_err(|_| CommandError::Validation(texts::limit_not_valid(raw)))?;
        let event = self.event_mut(context.event_id)?;
        if limit > 0 && event.yes.len() > limit as usize {
            return Err(CommandError::Validation(texts::limit_below_attendance(
                limit,
                event.yes.len(),
            )));
        }

        event.limit = Some(limit);
        Ok(vec![Reply::stream(texts::limit_set(limit, &self.settings.key_word))])
    }

    fn set_date(
        &mut self,
        context: &CommandContext<'_>,
        raw: &str,
    ) -> Result<Vec<Reply>, CommandError> {
        let date = parse_date(raw, self.today)
            .filter(|date| *date >= self.today)
            .ok_or_else(|| CommandError::Validation(texts::date_not_valid(raw)))?;

        self.event_mut(context.event_id)?.date = Some(date);
        self.sync_calendar(context.event_id);
        Ok(vec![Reply::private(texts::date_set(context.event_id, date), context.sender_email())])
    }

    fn set_time(
        &mut self,
        context: &CommandContext<'_>,
        hours: u32,
        minutes: u32,
    ) -> Result<Vec<Reply>, CommandError> {
        let time = EventTime::new(hours, minutes)
            .ok_or_else(|| CommandError::Validation(texts::time_not_valid(hours, minutes)))?;

        self.event_mut(context.event_id)?.time = Some(time);
        self.sync_calendar(context.event_id);
        Ok(vec![Reply::private(texts::time_set(context.event_id, time), context.sender_email())])
    }

    fn set_string_attribute(
        &mut self,
        context: &CommandContext<'_>,
        attribute: StringAttribute,
        value: &str,
    ) -> Result<Vec<Reply>, CommandError> {
        let event = self.event_mut(context.event_id)?;
        match attribute {
            StringAttribute::Place => event.place = Some(value.to_owned()),
            StringAttribute::Description => event.description = Some(value.to_owned()),
        }

        self.sync_calendar(context.event_id);
        Ok(vec![Reply::private(
            texts::attribute_set(attribute.as_str(), value),
            context.sender_email(),
        )])
    }

    fn set_duration(
        &mut self,
        context: &CommandContext<'_>,
        raw: &str,
    ) -> Result<Vec<Reply>, CommandError> {
        let seconds = parse_duration(raw)
            .ok_or_else(|| CommandError::Validation(texts::duration_not_valid(raw)))?;

        self.event_mut(context.event_id)?.duration = Some(seconds);
        self.sync_calendar(context.event_id);
        Ok(vec![Reply::private(
            texts::duration_set(context.event_id, seconds),
            context.sender_email(),
        )])
    }

    fn add_to_calendar(&mut self, context: &CommandContext<'_>) -> Result<Vec<Reply>, CommandError> {
        let entry = CalendarEntry::from_event(
            self.event(context.event_id)?,
            context.event_id,
            &self.settings.site_url,
            &self.settings.time_zone,
        )
        .map_err(calendar_command_error)?;

        let created = self.calendar.create(&entry).map_err(|error| {
            warn!(
                event_name = "rsvp.calendar.create_failed",
                event_id = %context.event_id,
                error = %error,
                "calendar entry could not be created"
            );
            calendar_command_error(error)
        })?;

        let body = texts::added_to_calendar(&created.calendar_name, &created.link.html_link);
        info!(
            event_name = "rsvp.calendar.created",
            event_id = %context.event_id,
            calendar_event_id = %created.link.id,
            "calendar entry created"
        );
        self.event_mut(context.event_id)?.calendar_event = Some(created.link);
        Ok(vec![Reply::stream(body)])
    }

    fn confirm(
        &mut self,
        context: &CommandContext<'_>,
        decision: Decision,
    ) -> Result<Vec<Reply>, CommandError> {
        let outcome = self
            .event_mut(context.event_id)?
            .confirm(context.sender_email(), decision)
            .map_err(|DomainError::LimitReached { .. }| {
                CommandError::Capacity(texts::LIMIT_REACHED.to_owned())
            })?;

        if outcome != ConfirmOutcome::Unchanged {
            self.sync_calendar(context.event_id);
        }
        debug!(
            event_name = "rsvp.attendance.confirmed",
            event_id = %context.event_id,
            decision = decision.label(),
            outcome = ?outcome,
            "attendance recorded"
        );

        let body = self.flourish(decision, texts::confirmed(decision, context.event_id));
        Ok(vec![Reply::private(body, context.sender_email())])
    }

    fn flourish(&mut self, decision: Decision, body: String) -> String {
        if !self.rng.gen_bool(FLOURISH_PROBABILITY) {
            return body;
        }
        match decision {
            Decision::Yes => match texts::FLOURISH_YES_PREFIXES.choose(&mut *self.rng) {
                Some(prefix) => format!("{prefix}{body}"),
                None => body,
            },
            Decision::No => match texts::FLOURISH_NO_SUFFIXES.choose(&mut *self.rng) {
                Some(suffix) => format!("{body}{suffix}"),
                None => body,
            },
            Decision::Maybe => body,
        }
    }

    /// Pushes the event to its linked calendar entry, if any. Failures never fail the command.
    fn sync_calendar(&mut self, event_id: &EventId) {
        let Some(event) = self.events.get(event_id) else {
            return;
        };
        let Some(link) = event.calendar_event.clone() else {
            return;
        };

        let result = CalendarEntry::from_event(
            event,
            event_id,
            &self.settings.site_url,
            &self.settings.time_zone,
        )
        .and_then(|entry| self.calendar.update(&link, &entry));

        match result {
            Ok(()) => debug!(
                event_name = "rsvp.calendar.synced",
                event_id = %event_id,
                calendar_event_id = %link.id,
                "calendar entry updated"
            ),
            Err(CalendarError::NotConfigured) => debug!(
                event_name = "rsvp.calendar.sync_skipped",
                event_id = %event_id,
                "calendar integration not configured"
            ),
            Err(error) => warn!(
                event_name = "rsvp.calendar.sync_failed",
                event_id = %event_id,
                calendar_event_id = %link.id,
                error = %error,
                "calendar entry update failed; continuing"
            ),
        }
    }
}

fn calendar_command_error(error: CalendarError) -> CommandError {
    match error {
        CalendarError::DateAndTimeNotSupplied => {
            CommandError::Precondition(texts::CALENDAR_DATE_AND_TIME_MISSING.to_owned())
        }
        CalendarError::DurationNotSupplied => {
            CommandError::Precondition(texts::CALENDAR_DURATION_MISSING.to_owned())
        }
        CalendarError::NotConfigured => {
            CommandError::Adapter(texts::CALENDAR_NOT_CONFIGURED.to_owned())
        }
        CalendarError::Remote(reason) => CommandError::Adapter(texts::calendar_failed(&reason)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rand::rngs::mock::StepRng;
    use rsvp_core::calendar::{CalendarCall, RecordingCalendar, UnconfiguredCalendar};
    use rsvp_core::{
        CalendarLink, Decision, Event, EventId, EventMap, EventTime, InMemoryDirectory, SenderId,
    };

    use super::{CommandContext, Executor};
    use crate::commands::{Command, CommandError};
    use crate::messages::{InboundMessage, MessageKind};
    use crate::router::RouterSettings;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 21).expect("date")
    }

    fn message(sender_id: &str, email: &str) -> InboundMessage {
        InboundMessage {
            content: String::new(),
            subject: "Testing".to_owned(),
            display_recipient: "test-stream".to_owned(),
            sender_id: SenderId::new(sender_id),
            sender_full_name: "Tester".to_owned(),
            sender_email: email.to_owned(),
            kind: MessageKind::Stream,
        }
    }

    fn seeded_events() -> EventMap {
        let mut events = EventMap::new();
        events.insert(
            EventId::new("test-stream", "Testing"),
            Event::new("Testing", SenderId::new("12345"), today(), "a@example.com"),
        );
        events
    }

    fn run(
        events: &mut EventMap,
        calendar: &mut dyn rsvp_core::CalendarClient,
        rng: &mut StepRng,
        command: Command,
        message: &InboundMessage,
    ) -> Result<Vec<crate::messages::Reply>, CommandError> {
        let settings = RouterSettings::default();
        let directory = InMemoryDirectory::new();
        let event_id = message.event_id();
        let mut executor = Executor {
            settings: &settings,
            events,
            calendar,
            directory: &directory,
            rng,
            today: today(),
        };
        executor.execute(&command, &CommandContext { event_id: &event_id, message })
    }

    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn flourish_uses_injected_randomness() {
        let mut events = seeded_events();
        let sender = message("2", "b@example.com");

        let replies = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut StepRng::new(0, 0),
            Command::Confirm { decision: Decision::Yes },
            &sender,
        )
        .expect("confirm");
        assert_eq!(replies[0].body, "GET EXCITED!! **You** are attending **test-stream/Testing**!");

        let replies = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut StepRng::new(0, 0),
            Command::Confirm { decision: Decision::No },
            &sender,
        )
        .expect("confirm");
        assert_eq!(replies[0].body, "You are **not** attending **test-stream/Testing**! :confounded:");

        let replies = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::Confirm { decision: Decision::Maybe },
            &sender,
        )
        .expect("confirm");
        assert_eq!(
            replies[0].body,
            "You **might** be attending **test-stream/Testing**. It's complicated."
        );
    }

    #[test]
    fn rejected_commands_leave_events_untouched() {
        let mut events = seeded_events();
        let before = events.clone();
        let creator = message("12345", "a@example.com");

        for command in [
            Command::SetDate { date: "02/25/1000".to_owned() },
            Command::SetTime { hours: 24, minutes: 0 },
            Command::SetDuration { duration: "forever".to_owned() },
            Command::SetLimit { limit: "99999999999".to_owned() },
            Command::Init,
        ] {
            let result = run(&mut events, &mut UnconfiguredCalendar, &mut never(), command, &creator);
            assert!(result.is_err());
        }
        assert_eq!(events, before);
    }

    #[test]
    fn limit_cannot_drop_below_current_attendance() {
        let mut events = seeded_events();
        let creator = message("12345", "a@example.com");
        run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::Confirm { decision: Decision::Yes },
            &message("2", "b@example.com"),
        )
        .expect("second attendee");

        let result = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::SetLimit { limit: "1".to_owned() },
            &creator,
        );
        assert!(matches!(result, Err(CommandError::Validation(_))));

        run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::SetLimit { limit: "0".to_owned() },
            &creator,
        )
        .expect("zero removes the limit");
    }

    #[test]
    fn calendar_errors_are_reported_on_explicit_add() {
        let mut events = seeded_events();
        let creator = message("12345", "a@example.com");

        let result = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::AddToCalendar,
            &creator,
        );
        assert_eq!(
            result,
            Err(CommandError::Precondition(
                "Oops! The `date` and `time` are required to add this to the calendar!".to_owned()
            ))
        );

        let event = events.get_mut(&EventId::new("test-stream", "Testing")).expect("event");
        event.time = EventTime::new(10, 30);
        event.duration = Some(1800);
        let result = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::AddToCalendar,
            &creator,
        );
        assert!(matches!(result, Err(CommandError::Adapter(_))));
    }

    #[test]
    fn linked_events_sync_after_changes() {
        let mut events = seeded_events();
        let event = events.get_mut(&EventId::new("test-stream", "Testing")).expect("event");
        event.time = EventTime::new(10, 30);
        event.duration = Some(1800);
        event.calendar_event =
            Some(CalendarLink { id: "cal-9".to_owned(), html_link: "https://cal/9".to_owned() });

        let observer = RecordingCalendar::new("Community");
        let mut calendar = observer.clone();
        let creator = message("12345", "a@example.com");

        run(
            &mut events,
            &mut calendar,
            &mut never(),
            Command::SetTime { hours: 11, minutes: 0 },
            &creator,
        )
        .expect("set time");
        run(
            &mut events,
            &mut calendar,
            &mut never(),
            Command::Confirm { decision: Decision::Yes },
            &creator,
        )
        .expect("unchanged confirm");

        let calls = observer.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            CalendarCall::Update(link, entry)
                if link.id == "cal-9" && entry.start.date_time.to_string().ends_with("11:00:00")
        ));
    }

    #[test]
    fn sync_failures_do_not_fail_the_command() {
        let mut events = seeded_events();
        let event = events.get_mut(&EventId::new("test-stream", "Testing")).expect("event");
        event.calendar_event =
            Some(CalendarLink { id: "cal-9".to_owned(), html_link: "https://cal/9".to_owned() });

        let replies = run(
            &mut events,
            &mut UnconfiguredCalendar,
            &mut never(),
            Command::SetDuration { duration: "30m".to_owned() },
            &message("12345", "a@example.com"),
        )
        .expect("duration set despite calendar");
        assert!(replies[0].body.contains("**0:30:00**"));
    }
}
