pub mod event;

pub use event::{
    CalendarLink, ConfirmOutcome, Decision, Event, EventId, EventMap, EventTime, SenderId,
};
