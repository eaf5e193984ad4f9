//! Everything the bot says, rendered as chat markdown.

use chrono::NaiveDate;
use rsvp_core::schedule::{format_duration, weekday_name};
use rsvp_core::{Decision, Event, EventId, EventTime, UserDirectory};

pub const FLOURISH_YES_PREFIXES: &[&str] = &[
    "GET EXCITED!! ",
    "AWWW YISS!! ",
    "YASSSSS HENNY! ",
    "OMG OMG OMG ",
    "HYPE HYPE HYPE HYPE HYPE ",
    "WOW THIS IS AWESOME: ",
    "YEAAAAAAHHH!!!! :tada: ",
];

pub const FLOURISH_NO_SUFFIXES: &[&str] = &[" :confounded:", " Bummer!", " Oh no!!"];

pub const EVENT_CANCELED: &str = "The event has been canceled!";
pub const ALREADY_AN_EVENT: &str = "Oops! This thread is already an RSVPBot event!";
pub const NOT_AUTHORIZED: &str =
    "Oops! Only the person who created this event can cancel or move it.";
pub const LIMIT_REACHED: &str = "The **limit** for this event has been reached!";
pub const CALENDAR_DATE_AND_TIME_MISSING: &str =
    "Oops! The `date` and `time` are required to add this to the calendar!";
pub const CALENDAR_DURATION_MISSING: &str =
    "Oops! The `duration` is required to add this to the calendar!";
pub const CALENDAR_NOT_CONFIGURED: &str =
    "Oops! This RSVPBot is not connected to a calendar, so the event can't be added.";

pub fn init_successful(key_word: &str) -> String {
    format!("This thread is now an RSVPBot event! Type `{key_word} help` for more options.")
}

pub fn not_an_event(key_word: &str) -> String {
    format!(
        "This thread is not an RSVPBot event! Type `{key_word} init` to make it into an event."
    )
}

pub fn invalid_command(line: &str, key_word: &str) -> String {
    format!("`{line}` is not a valid RSVPBot command! Type `{key_word} help` for the correct syntax.")
}

pub fn event_moved(new_id: &EventId, destination: &str) -> String {
    format!("This event has been moved to [{new_id}]({destination})!")
}

pub fn move_already_an_event(new_id: &EventId) -> String {
    format!("Oops! `{new_id}` is already an RSVPBot event!")
}

pub fn bad_move_destination(destination: &str) -> String {
    format!(
        "Oops! `{destination}` is not a valid destination. Paste the full link to a stream topic."
    )
}

pub fn limit_set(limit: u32, key_word: &str) -> String {
    if limit == 0 {
        return "The attendance limit for this event has been removed!".to_owned();
    }
    format!(
        "The attendance limit for this event has been set to **{limit}**! \
         Hurry up and `{key_word} yes` now!"
    )
}

pub fn limit_not_valid(raw: &str) -> String {
    format!("Oops! **{raw}** is not a valid attendance limit!")
}

pub fn limit_below_attendance(limit: u32, attending: usize) -> String {
    format!(
        "Oops! **{attending}** people are already attending, so the limit can't be set to \
         **{limit}**!"
    )
}

pub fn date_set(event_id: &EventId, date: NaiveDate) -> String {
    format!("The date for **{event_id}** has been set to **{}**!", date.format("%m/%d/%y"))
}

pub fn date_not_valid(raw: &str) -> String {
    format!("Oops! **{raw}** is not a valid date in the **future**!")
}

pub fn time_set(event_id: &EventId, time: EventTime) -> String {
    format!("The time for **{event_id}** has been set to **{time}**!")
}

pub fn time_not_valid(hours: u32, minutes: u32) -> String {
    format!("Oops! **{hours}:{minutes}** is not a valid time!")
}

pub fn all_day(event_id: &EventId) -> String {
    format!("**{event_id}** is now an all day long event.")
}

pub fn attribute_set(attribute: &str, value: &str) -> String {
    format!("The {attribute} for this event has been set to **{value}**!")
}

pub fn duration_set(event_id: &EventId, seconds: u64) -> String {
    format!("The duration for **{event_id}** has been set to **{}**!", format_duration(seconds))
}

pub fn duration_not_valid(raw: &str) -> String {
    format!("Oops! **{raw}** is not a valid duration! Try something like `30m` or `1h 30m`.")
}

pub fn added_to_calendar(calendar_name: &str, url: &str) -> String {
    format!("Event [added to {calendar_name} Calendar]({url})!")
}

pub fn calendar_failed(reason: &str) -> String {
    format!("Oops! The calendar could not be updated: {reason}")
}

pub fn confirmed(decision: Decision, event_id: &EventId) -> String {
    match decision {
        Decision::Yes => format!("**You** are attending **{event_id}**!"),
        Decision::No => format!("You are **not** attending **{event_id}**!"),
        Decision::Maybe => format!("You **might** be attending **{event_id}**. It's complicated."),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Centered,
    Plain,
}

/// Chat markdown table. Cells are written as given, so callers control padding.
#[derive(Clone, Debug)]
pub struct MarkdownTable {
    header: Vec<String>,
    alignment: Alignment,
    rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    pub fn new<I, S>(header: I, alignment: Alignment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { header: header.into_iter().map(Into::into).collect(), alignment, rows: Vec::new() }
    }

    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn render(&self) -> String {
        let (rule, separator) = match self.alignment {
            Alignment::Centered => (":---:", "|"),
            Alignment::Plain => ("---", " | "),
        };

        let mut output = self.header.join("|");
        output.push('\n');
        output.push_str(&vec![rule; self.header.len()].join(separator));
        output.push('\n');
        for row in &self.rows {
            output.push_str(&row.join("|"));
            output.push('\n');
        }
        output
    }
}

/// Event card followed by the attendance table.
pub fn summary(event: &Event, directory: &dyn UserDirectory) -> String {
    let mut details =
        MarkdownTable::new([format!("**{}**\t", event.name), "\t".to_owned()], Alignment::Centered);

    if let Some(description) = event.description.as_deref().filter(|value| !value.is_empty()) {
        details.push_row(["**What**", description]);
    }
    let time = event.time.map(|time| time.to_string()).unwrap_or_else(|| "(All day)".to_owned());
    let date = event.date.map(|date| date.to_string()).unwrap_or_else(|| "(No date)".to_owned());
    details.push_row(["**When**".to_owned(), format!("{date} @ {time}")]);
    if let Some(date) = event.date {
        details.push_row(["**Day**".to_owned(), format!("{} ", weekday_name(date))]);
    }
    if let Some(duration) = event.duration.filter(|seconds| *seconds > 0) {
        details.push_row(["**Duration**".to_owned(), format_duration(duration)]);
    }
    if let Some(place) = event.place.as_deref().filter(|value| !value.is_empty()) {
        details.push_row(["**Where**", place]);
    }
    if let (Some(limit), Some(left)) = (event.effective_limit(), event.spots_left()) {
        details.push_row(["**Limit**".to_owned(), format!("{left}/{limit} spots left")]);
    }

    let mut attendance = MarkdownTable::new(
        [
            format!("YES ({}) ", event.yes.len()),
            format!("NO ({}) ", event.no.len()),
            format!("MAYBE({}) ", event.maybe.len()),
        ],
        Alignment::Centered,
    );
    let rows = event.yes.len().max(event.no.len()).max(event.maybe.len());
    for index in 0..rows {
        attendance.push_row(Decision::ALL.map(|decision| {
            event
                .attendees(decision)
                .get(index)
                .map(|attendee| directory.display_name(attendee))
                .unwrap_or_default()
        }));
    }

    format!("{}\n\n{}\t|\t", details.render(), attendance.render())
}

/// Mentions everyone who said yes or maybe.
pub fn ping(event: &Event, directory: &dyn UserDirectory, message: Option<&str>) -> String {
    let mut body = String::from("**Pinging all participants who RSVP'd!!**\n");
    for attendee in event.yes.iter().chain(event.maybe.iter()) {
        body.push_str(&format!("@**{}** ", directory.display_name(attendee)));
    }
    if let Some(message) = message {
        body.push('\n');
        body.push_str(message);
    }
    body
}

const CONTRIBUTORS: &[&str] = &[
    "Mudit Ameta (SP2'15)",
    "Diego Berrocal (F2'15)",
    "Shad William Hopson (F1'15)",
    "Tom Murphy (F2'15)",
    "Miriam Shiffman (F2'15)",
    "Anjana Sofia Vakil (F2'15)",
    "Steven McCarthy (SP2'15)",
    "Kara McNair (F2'15)",
    "Pris Nasrat (SP2'16)",
    "Benjamin Gilbert (F2'15)",
    "Andrew Drozdov (SP1'15)",
    "Alex Wilson (S1'16)",
    "Jérémie Jost (S1'16)",
    "Amulya Reddy (S1'16)",
    "James J. Porter (S'13)",
    "Kracekumar (F2'16)",
];

const TESTERS: &[&str] = &[
    "Nikki Bee (SP2'15)",
    "Anthony Burdi (SP1'15)",
    "Noella D'sa (SP2'15)",
    "Mudit Ameta (SP2'15)",
];

pub fn credits() -> String {
    format!(
        "The RSVPBot was created by @**Carlos Rey (SP2'15)**\nWith **contributions** from:\n\n{}\
         \n\n and invaluable test feedback from:\n\n{}\
         \n\nThe code for **RSVPBot** is available at https://github.com/kokeshii/RSVPBot",
        CONTRIBUTORS.join("\n "),
        TESTERS.join("\n "),
    )
}

pub fn help(key_word: &str) -> String {
    let command = |usage: &str| format!("**`{key_word} {usage}`**");
    let table = MarkdownTable::new(["**Command**", "**Description**"], Alignment::Plain)
        .row([
            command("init"),
            "Initializes a thread as an RSVPBot event. Must be used before any other command."
                .to_owned(),
        ])
        .row([command("help"), "Shows this handy table.".to_owned()])
        .row([
            command("yes"),
            "Marks **you** as attending this event. Also works with `yeah`, `yep`, `in` \
             and :thumbs_up:."
                .to_owned(),
        ])
        .row([
            command("no"),
            "Marks you as **not** attending this event. Also works with `nope`, `nah` and `out`."
                .to_owned(),
        ])
        .row([command("maybe"), "Marks you as a **potential** attendee.".to_owned()])
        .row([
            command("summary"),
            "Displays a summary of this event, including the description and list of attendees. \
             `status` works too."
                .to_owned(),
        ])
        .row([
            command("move <destination_url>"),
            "Moves this event to another stream/topic. The destination must be a full link to \
             a topic. Only the creator can do this."
                .to_owned(),
        ])
        .row([
            command("set time HH:MM"),
            format!("Sets the start time (24-hour clock), e.g. `{key_word} set time 13:30`."),
        ])
        .row([command("set time allday"), "Makes this an all day long event.".to_owned()])
        .row([
            command("set date <date>"),
            "Sets the date of this event. See **Date format** below.".to_owned(),
        ])
        .row([
            command("set duration <duration>"),
            "Sets how long the event lasts, e.g. `30m`, `1h 30m` or `1:30`.".to_owned(),
        ])
        .row([command("set description <text>"), "Describes what this event is about.".to_owned()])
        .row([
            command("set place <place>"),
            "Sets where this event happens. `location` works too.".to_owned(),
        ])
        .row([
            command("set limit <number>"),
            "Sets the attendance limit. `0` removes the limit.".to_owned(),
        ])
        .row([
            command("ping <message>"),
            "Pings everyone who said yes or maybe, with an optional message.".to_owned(),
        ])
        .row([
            command("add to calendar"),
            "Adds this event to the shared calendar. The date, time and duration must be set."
                .to_owned(),
        ])
        .row([command("cancel"), "Cancels this event. Only the creator can do this.".to_owned()])
        .row([
            command("credits"),
            "Lists all the awesome people that made RSVPBot a reality.".to_owned(),
        ]);

    format!(
        "{}\n**Date format**\n\
         Dates can be written as `MM/DD/YYYY` (`02/25/2100`), `YYYY-MM-DD`, `Feb 25` or \
         `February 25, 2100`, or in words: `today`, `tomorrow`, a weekday such as `friday` \
         (always the next one to come) or `in 2 weeks`. Dates in the past are rejected.",
        table.render()
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rsvp_core::{Event, EventTime, InMemoryDirectory, SenderId};

    use super::{help, ping, summary, Alignment, MarkdownTable};

    fn thursday_event() -> Event {
        Event::new(
            "Testing",
            SenderId::new("12345"),
            NaiveDate::from_ymd_opt(2100, 2, 25).expect("date"),
            "a@example.com",
        )
    }

    #[test]
    fn renders_centered_table() {
        let table = MarkdownTable::new(["A", "B"], Alignment::Centered).row(["1", "2"]);
        assert_eq!(table.render(), "A|B\n:---:|:---:\n1|2\n");
    }

    #[test]
    fn summary_shows_only_set_attributes() {
        let event = thursday_event();
        let directory = InMemoryDirectory::new().with_user("a@example.com", "A");

        assert_eq!(
            summary(&event, &directory),
            "**Testing**\t|\t\n:---:|:---:\n\
             **When**|2100-02-25 @ (All day)\n\
             **Day**|Thursday \n\
             \n\n\
             YES (1) |NO (0) |MAYBE(0) \n:---:|:---:|:---:\n\
             A||\n\
             \t|\t"
        );
    }

    #[test]
    fn summary_includes_optional_rows() {
        let mut event = thursday_event();
        event.description = Some("Noodles".to_owned());
        event.place = Some("Hopper!".to_owned());
        event.time = EventTime::new(10, 30);
        event.duration = Some(1800);
        event.limit = Some(5);
        event.no.push("b@example.com".to_owned());
        event.no.push("c@example.com".to_owned());

        let rendered = summary(&event, &InMemoryDirectory::new());

        assert!(rendered.contains("**What**|Noodles\n"));
        assert!(rendered.contains("**When**|2100-02-25 @ 10:30\n"));
        assert!(rendered.contains("**Duration**|0:30:00\n"));
        assert!(rendered.contains("**Where**|Hopper!\n"));
        assert!(rendered.contains("**Limit**|4/5 spots left\n"));
        assert!(rendered.contains("YES (1) |NO (2) |MAYBE(0) "));
        assert!(rendered.contains("a@example.com|b@example.com|\n|c@example.com|\n"));
    }

    #[test]
    fn summary_tolerates_undated_events() {
        let mut event = thursday_event();
        event.date = None;

        let rendered = summary(&event, &InMemoryDirectory::new());
        assert!(rendered.contains("**When**|(No date) @ (All day)\n"));
        assert!(!rendered.contains("**Day**"));
    }

    #[test]
    fn ping_mentions_yes_and_maybe_only() {
        let mut event = thursday_event();
        event.maybe.push("w@example.com".to_owned());
        event.no.push("e@example.com".to_owned());
        let directory = InMemoryDirectory::new()
            .with_user("a@example.com", "A")
            .with_user("w@example.com", "W")
            .with_user("e@example.com", "E");

        let body = ping(&event, &directory, Some("message!!!"));

        assert_eq!(body, "**Pinging all participants who RSVP'd!!**\n@**A** @**W** \nmessage!!!");
        assert!(!body.contains("@**E**"));
    }

    #[test]
    fn help_lists_commands_and_date_format() {
        let text = help("party");
        assert!(text.starts_with("**Command**|**Description**\n--- | ---\n"));
        assert!(text.contains("**`party init`**"));
        assert!(text.contains("**`party add to calendar`**"));
        assert!(text.contains("**Date format**"));
    }
}
