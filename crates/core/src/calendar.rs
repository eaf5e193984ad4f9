//! Calendar entries derived from events, and the client seam that publishes them.

use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::domain::{CalendarLink, Event, EventId};
use crate::errors::CalendarError;
use crate::narrow::narrow_url;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+").expect("regex"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarTime {
    pub date_time: NaiveDateTime,
    pub time_zone: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Accepted,
    Tentative,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAttendee {
    pub email: String,
    pub response_status: ResponseStatus,
}

/// Request body for creating or patching a remote calendar entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    pub summary: String,
    pub location: Option<String>,
    pub description: String,
    pub start: CalendarTime,
    pub end: CalendarTime,
    pub attendees: Vec<CalendarAttendee>,
}

impl CalendarEntry {
    /// Builds the entry for `event`. A start time and a non-zero duration are required;
    /// attendees whose ids are not e-mail addresses are left off.
    pub fn from_event(
        event: &Event,
        event_id: &EventId,
        site_url: &str,
        time_zone: &str,
    ) -> Result<Self, CalendarError> {
        let time = event.time.ok_or(CalendarError::DateAndTimeNotSupplied)?;
        let duration = event
            .duration
            .filter(|seconds| *seconds > 0)
            .ok_or(CalendarError::DurationNotSupplied)?;

        let start = event
            .date
            .and_then(|date| date.and_hms_opt(time.hour(), time.minute(), 0))
            .ok_or(CalendarError::DateAndTimeNotSupplied)?;
        let length = i64::try_from(duration)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or(CalendarError::DurationNotSupplied)?;
        let end = start.checked_add_signed(length).ok_or(CalendarError::DurationNotSupplied)?;

        let (stream, topic) = event_id.split();
        let mut description = event.description.clone().unwrap_or_default();
        description.push_str(&format!(
            "\r\rFor more information or to RSVP, see {}",
            narrow_url(site_url, stream, topic)
        ));

        let attendees = event
            .yes
            .iter()
            .map(|email| (email, ResponseStatus::Accepted))
            .chain(event.maybe.iter().map(|email| (email, ResponseStatus::Tentative)))
            .filter(|(email, _)| EMAIL.is_match(email))
            .map(|(email, response_status)| CalendarAttendee {
                email: email.clone(),
                response_status,
            })
            .collect();

        Ok(Self {
            summary: event.name.clone(),
            location: event.place.clone(),
            description,
            start: CalendarTime { date_time: start, time_zone: time_zone.to_owned() },
            end: CalendarTime { date_time: end, time_zone: time_zone.to_owned() },
            attendees,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedCalendarEvent {
    pub link: CalendarLink,
    pub calendar_name: String,
}

pub trait CalendarClient: Send {
    fn create(&mut self, entry: &CalendarEntry) -> Result<CreatedCalendarEvent, CalendarError>;

    fn update(&mut self, link: &CalendarLink, entry: &CalendarEntry) -> Result<(), CalendarError>;
}

/// Used when no calendar id or credentials are configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredCalendar;

impl CalendarClient for UnconfiguredCalendar {
    fn create(&mut self, _entry: &CalendarEntry) -> Result<CreatedCalendarEvent, CalendarError> {
        Err(CalendarError::NotConfigured)
    }

    fn update(&mut self, _link: &CalendarLink, _entry: &CalendarEntry) -> Result<(), CalendarError> {
        Err(CalendarError::NotConfigured)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalendarCall {
    Create(CalendarEntry),
    Update(CalendarLink, CalendarEntry),
}

#[derive(Debug, Default)]
struct RecordingState {
    calls: Vec<CalendarCall>,
    created: usize,
}

/// Accepts every request and remembers it. Clones share the call log.
#[derive(Clone, Debug)]
pub struct RecordingCalendar {
    calendar_name: String,
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingCalendar {
    pub fn new(calendar_name: impl Into<String>) -> Self {
        Self { calendar_name: calendar_name.into(), state: Arc::default() }
    }

    pub fn calls(&self) -> Vec<CalendarCall> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).calls.clone()
    }
}

impl CalendarClient for RecordingCalendar {
    fn create(&mut self, entry: &CalendarEntry) -> Result<CreatedCalendarEvent, CalendarError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.created += 1;
        state.calls.push(CalendarCall::Create(entry.clone()));
        let id = format!("cal-{}", state.created);
        Ok(CreatedCalendarEvent {
            link: CalendarLink {
                html_link: format!("https://calendar.example.com/event?eid={id}"),
                id,
            },
            calendar_name: self.calendar_name.clone(),
        })
    }

    fn update(&mut self, link: &CalendarLink, entry: &CalendarEntry) -> Result<(), CalendarError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .push(CalendarCall::Update(link.clone(), entry.clone()));
        Ok(())
    }
}
