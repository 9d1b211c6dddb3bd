//! Date buckets for rendering a conversation.

use chrono::{Datelike, Local, NaiveDate, TimeZone, Weekday};
use serde::Serialize;

use huddle_shared::ChatMessage;

const MONTHS: [&str; 12] = [
    "Januar", "Februar", "März", "April", "Mai", "Juni", "Juli", "August", "September", "Oktober",
    "November", "Dezember",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroup {
    pub date: NaiveDate,
    pub label: String,
    pub messages: Vec<ChatMessage>,
}

/// Group `messages` by local calendar day, in order of first appearance.
pub fn group_by_date(messages: &[ChatMessage]) -> Vec<DateGroup> {
    group_by_date_in(messages, Local::now().date_naive(), &Local)
}

pub fn group_by_date_in<Tz: TimeZone>(
    messages: &[ChatMessage],
    today: NaiveDate,
    tz: &Tz,
) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for message in messages {
        let date = message.created_at.with_timezone(tz).date_naive();
        match groups.iter_mut().find(|g| g.date == date) {
            Some(group) => group.messages.push(message.clone()),
            None => groups.push(DateGroup {
                date,
                label: date_label(date, today),
                messages: vec![message.clone()],
            }),
        }
    }
    groups
}

/// `Heute`, `Gestern`, or e.g. `Montag, 3. März`.
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "Heute".to_string();
    }
    if today.pred_opt() == Some(date) {
        return "Gestern".to_string();
    }
    format!(
        "{}, {}. {}",
        weekday_name(date.weekday()),
        date.day(),
        MONTHS[date.month0() as usize]
    )
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Montag",
        Weekday::Tue => "Dienstag",
        Weekday::Wed => "Mittwoch",
        Weekday::Thu => "Donnerstag",
        Weekday::Fri => "Freitag",
        Weekday::Sat => "Samstag",
        Weekday::Sun => "Sonntag",
    }
}
