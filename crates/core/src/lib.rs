pub mod calendar;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod narrow;
pub mod schedule;
pub mod store;

pub use calendar::{
    CalendarClient, CalendarEntry, CreatedCalendarEvent, RecordingCalendar, UnconfiguredCalendar,
};
pub use directory::{InMemoryDirectory, JsonUserDirectory, UserDirectory};
pub use domain::{
    CalendarLink, ConfirmOutcome, Decision, Event, EventId, EventMap, EventTime, SenderId,
};
pub use errors::{CalendarError, DirectoryError, DomainError, StoreError};
pub use schedule::{Clock, FixedClock, SystemClock};
pub use store::{EventStore, JsonFileStore, MemoryStore};
