use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DomainError;

/// Composite key of an event: `<stream>/<topic>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(container: &str, topic: &str) -> Self {
        Self(format!("{container}/{topic}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key back into stream and topic. Topics may themselves contain `/`,
    /// streams may not, so the split happens on the first separator.
    pub fn split(&self) -> (&str, &str) {
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Opaque sender identifier. The chat platform hands out integers, older stores hold strings;
/// whichever form was read is the form written back.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "RawSenderId", into = "RawSenderId")]
pub struct SenderId {
    value: String,
    numeric: bool,
}

impl SenderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), numeric: false }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl PartialEq for SenderId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SenderId {}

impl Hash for SenderId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSenderId {
    Number(i64),
    Text(String),
}

impl From<RawSenderId> for SenderId {
    fn from(value: RawSenderId) -> Self {
        match value {
            RawSenderId::Number(number) => Self { value: number.to_string(), numeric: true },
            RawSenderId::Text(value) => Self { value, numeric: false },
        }
    }
}

impl From<SenderId> for RawSenderId {
    fn from(id: SenderId) -> Self {
        match id.value.parse::<i64>() {
            Ok(number) if id.numeric => Self::Number(number),
            _ => Self::Text(id.value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Yes,
    No,
    Maybe,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Yes, Decision::No, Decision::Maybe];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Maybe => "maybe",
        }
    }
}

/// Wall-clock start time stored as `HH:MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventTime {
    hour: u32,
    minute: u32,
}

impl EventTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl From<EventTime> for String {
    fn from(value: EventTime) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for EventTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (hour, minute) =
            value.split_once(':').ok_or_else(|| format!("`{value}` is not an HH:MM time"))?;
        let hour = hour.trim().parse::<u32>().map_err(|_| format!("bad hour in `{value}`"))?;
        let minute =
            minute.trim().parse::<u32>().map_err(|_| format!("bad minute in `{value}`"))?;
        Self::new(hour, minute).ok_or_else(|| format!("`{value}` is out of range"))
    }
}

/// External calendar entry linked to an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLink {
    pub id: String,
    pub html_link: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub creator: SenderId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub place: Option<String>,
    /// Older stores may carry `null` here.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<EventTime>,
    /// Seconds. Older stores may hold these as floats.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub yes: Vec<String>,
    #[serde(default)]
    pub no: Vec<String>,
    #[serde(default)]
    pub maybe: Vec<String>,
    #[serde(default)]
    pub calendar_event: Option<CalendarLink>,
}

pub type EventMap = BTreeMap<EventId, Event>;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeconds {
    Whole(u64),
    Fractional(f64),
}

fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawSeconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawSeconds::Whole(seconds)) => Ok(Some(seconds)),
        Some(RawSeconds::Fractional(seconds))
            if seconds.is_finite() && seconds >= 0.0 && seconds < u64::MAX as f64 =>
        {
            Ok(Some(seconds.round() as u64))
        }
        Some(RawSeconds::Fractional(seconds)) => {
            Err(serde::de::Error::custom(format!("{seconds} is not a duration in seconds")))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Added,
    Switched { from: Decision },
    Unchanged,
}

impl Event {
    /// A freshly initialised event: all-day, unlimited, dated `date`, with `first_attendee`
    /// already on the yes list.
    pub fn new(
        name: impl Into<String>,
        creator: SenderId,
        date: NaiveDate,
        first_attendee: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            creator,
            description: None,
            place: None,
            date: Some(date),
            time: None,
            duration: None,
            limit: None,
            yes: vec![first_attendee.into()],
            no: Vec::new(),
            maybe: Vec::new(),
            calendar_event: None,
        }
    }

    pub fn attendees(&self, decision: Decision) -> &[String] {
        match decision {
            Decision::Yes => &self.yes,
            Decision::No => &self.no,
            Decision::Maybe => &self.maybe,
        }
    }

    fn attendees_mut(&mut self, decision: Decision) -> &mut Vec<String> {
        match decision {
            Decision::Yes => &mut self.yes,
            Decision::No => &mut self.no,
            Decision::Maybe => &mut self.maybe,
        }
    }

    pub fn decision_of(&self, attendee: &str) -> Option<Decision> {
        Decision::ALL
            .into_iter()
            .find(|decision| self.attendees(*decision).iter().any(|entry| entry == attendee))
    }

    /// `None` when attendance is unlimited; a stored limit of zero also means unlimited.
    pub fn effective_limit(&self) -> Option<u32> {
        self.limit.filter(|limit| *limit > 0)
    }

    pub fn spots_left(&self) -> Option<i64> {
        self.effective_limit().map(|limit| i64::from(limit) - self.yes.len() as i64)
    }

    pub fn is_creator(&self, sender: &SenderId) -> bool {
        &self.creator == sender
    }

    /// Records `attendee` under `decision`, removing them from the other lists.
    ///
    /// Only new additions to the yes list are checked against the limit; re-confirming a
    /// yes never fails.
    pub fn confirm(
        &mut self,
        attendee: &str,
        decision: Decision,
    ) -> Result<ConfirmOutcome, DomainError> {
        let current = self.decision_of(attendee);
        if current == Some(decision) {
            return Ok(ConfirmOutcome::Unchanged);
        }

        if decision == Decision::Yes {
            if let Some(limit) = self.effective_limit() {
                if self.yes.len() >= limit as usize {
                    return Err(DomainError::LimitReached { limit });
                }
            }
        }

        for other in Decision::ALL.into_iter().filter(|other| *other != decision) {
            self.attendees_mut(other).retain(|entry| entry != attendee);
        }
        self.attendees_mut(decision).push(attendee.to_owned());

        Ok(match current {
            Some(from) => ConfirmOutcome::Switched { from },
            None => ConfirmOutcome::Added,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ConfirmOutcome, Decision, Event, EventId, EventTime, SenderId};
    use crate::errors::DomainError;

    fn event() -> Event {
        Event::new(
            "Testing",
            SenderId::new("12345"),
            NaiveDate::from_ymd_opt(2100, 2, 25).expect("date"),
            "a@example.com",
        )
    }

    fn memberships(event: &Event, attendee: &str) -> usize {
        Decision::ALL
            .into_iter()
            .filter(|decision| event.attendees(*decision).iter().any(|entry| entry == attendee))
            .count()
    }

    #[test]
    fn new_event_enrolls_first_attendee_as_yes() {
        let event = event();
        assert_eq!(event.yes, vec!["a@example.com"]);
        assert_eq!(event.time, None);
        assert_eq!(event.effective_limit(), None);
    }

    #[test]
    fn confirm_keeps_attendee_in_exactly_one_list() {
        let mut event = event();
        for decision in [Decision::No, Decision::Maybe, Decision::Yes, Decision::Maybe] {
            event.confirm("b@example.com", decision).expect("confirm");
            assert_eq!(memberships(&event, "b@example.com"), 1);
            assert_eq!(event.decision_of("b@example.com"), Some(decision));
        }
    }

    #[test]
    fn repeated_confirm_is_idempotent() {
        let mut event = event();
        event.confirm("b@example.com", Decision::Maybe).expect("first");
        let outcome = event.confirm("b@example.com", Decision::Maybe).expect("second");
        assert_eq!(outcome, ConfirmOutcome::Unchanged);
        assert_eq!(event.maybe, vec!["b@example.com"]);
    }

    #[test]
    fn switching_reports_previous_decision() {
        let mut event = event();
        let outcome = event.confirm("a@example.com", Decision::No).expect("switch");
        assert_eq!(outcome, ConfirmOutcome::Switched { from: Decision::Yes });
        assert!(event.yes.is_empty());
    }

    #[test]
    fn limit_blocks_new_yes_but_not_reconfirmation() {
        let mut event = event();
        event.limit = Some(1);

        assert_eq!(event.confirm("a@example.com", Decision::Yes), Ok(ConfirmOutcome::Unchanged));
        assert_eq!(
            event.confirm("b@example.com", Decision::Yes),
            Err(DomainError::LimitReached { limit: 1 })
        );
        assert!(!event.yes.iter().any(|entry| entry == "b@example.com"));
    }

    #[test]
    fn limit_applies_to_switches_into_yes() {
        let mut event = event();
        event.limit = Some(1);
        event.confirm("b@example.com", Decision::Maybe).expect("maybe");

        assert!(event.confirm("b@example.com", Decision::Yes).is_err());
        assert_eq!(event.decision_of("b@example.com"), Some(Decision::Maybe));
    }

    #[test]
    fn limit_one_below_capacity_fills_up() {
        let mut event = event();
        event.limit = Some(2);
        event.confirm("b@example.com", Decision::Yes).expect("fits");
        assert_eq!(event.yes.len(), 2);
        assert_eq!(event.spots_left(), Some(0));
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let mut event = event();
        event.limit = Some(0);
        event.confirm("b@example.com", Decision::Yes).expect("unlimited");
        assert_eq!(event.spots_left(), None);
    }

    #[test]
    fn event_id_splits_on_first_separator() {
        let id = EventId::new("455 Broadway", "Practical web app security 6/22");
        assert_eq!(id.split(), ("455 Broadway", "Practical web app security 6/22"));
    }

    #[test]
    fn event_time_rejects_out_of_range_values() {
        assert!(EventTime::new(24, 0).is_none());
        assert!(EventTime::new(10, 60).is_none());
        assert_eq!(EventTime::new(9, 5).map(|time| time.to_string()).as_deref(), Some("09:05"));
    }

    #[test]
    fn legacy_store_entries_deserialize() {
        let raw = r#"{
            "name": "Lunch",
            "creator": 12345,
            "description": null,
            "place": null,
            "date": "2100-02-25",
            "time": "10:30",
            "limit": null,
            "yes": ["a@example.com"],
            "no": []
        }"#;

        let event: Event = serde_json::from_str(raw).expect("legacy event");
        assert_eq!(event.creator, SenderId::new("12345"));
        assert!(event.maybe.is_empty());
        assert_eq!(event.time, EventTime::new(10, 30));
        assert_eq!(event.calendar_event, None);
    }

    #[test]
    fn legacy_null_dates_and_float_durations_deserialize() {
        let raw = r#"{
            "name": "Lunch",
            "creator": "12345",
            "date": null,
            "time": null,
            "duration": 5400.0,
            "yes": []
        }"#;

        let event: Event = serde_json::from_str(raw).expect("legacy event");
        assert_eq!(event.date, None);
        assert_eq!(event.duration, Some(5400));

        let missing: Event =
            serde_json::from_str(r#"{"name": "Lunch", "creator": 1}"#).expect("sparse event");
        assert_eq!(missing.date, None);
        assert_eq!(missing.duration, None);
    }

    #[test]
    fn negative_durations_are_rejected() {
        let raw = r#"{"name": "Lunch", "creator": 1, "duration": -5.0}"#;
        assert!(serde_json::from_str::<Event>(raw).is_err());
    }

    #[test]
    fn sender_ids_keep_their_stored_form() {
        let numeric: SenderId = serde_json::from_str("12345").expect("number");
        let text: SenderId = serde_json::from_str(r#""12345""#).expect("text");

        assert_eq!(numeric, text);
        assert_eq!(serde_json::to_string(&numeric).expect("json"), "12345");
        assert_eq!(serde_json::to_string(&text).expect("json"), r#""12345""#);
        assert_eq!(serde_json::to_string(&SenderId::new("abc")).expect("json"), r#""abc""#);
    }
}
