use serde::Serialize;
use time::{Date, OffsetDateTime};

use haven_core::journal::{streak, trailing_year, STREAK_CAP_DAYS};
use haven_core::{Journal, JournalDate, JournalEntry, JournalMonth};

use crate::cli::{JournalAddArgs, JournalListArgs, JournalStreakArgs};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct JournalAddData<'a> {
    entry: &'a JournalEntry,
    total: usize,
    streak: u32,
}

#[derive(Debug, Serialize)]
struct JournalListData {
    entries: Vec<JournalEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    calendar: Option<Vec<JournalMonth>>,
}

#[derive(Debug, Serialize)]
struct JournalStreakData {
    today: JournalDate,
    streak: u32,
    cap: u32,
}

#[derive(Debug, Serialize)]
struct JournalClearData {
    removed: bool,
}

pub async fn add(args: &JournalAddArgs, journal: &Journal) -> Result<CommandResult, CliError> {
    let today = today_or(args.date.as_deref())?;
    let entry = JournalEntry::new(today, args.level, args.note.clone())?;

    let entries = journal.record(entry.clone()).await?;
    let data = serde_json::to_value(JournalAddData {
        entry: &entry,
        total: entries.len(),
        streak: streak(&entries, today),
    })?;
    Ok(CommandResult::ok(data))
}

pub async fn list(args: &JournalListArgs, journal: &Journal) -> Result<CommandResult, CliError> {
    let entries = journal.entries().await?;
    let calendar = if args.calendar {
        Some(trailing_year(&entries, today_or(args.today.as_deref())?))
    } else {
        None
    };

    let data = serde_json::to_value(JournalListData { entries, calendar })?;
    Ok(CommandResult::ok(data))
}

pub async fn clear(journal: &Journal) -> Result<CommandResult, CliError> {
    let removed = journal.clear().await?;
    Ok(CommandResult::ok(serde_json::to_value(JournalClearData {
        removed,
    })?))
}

pub async fn streak_of(
    args: &JournalStreakArgs,
    journal: &Journal,
) -> Result<CommandResult, CliError> {
    let today = today_or(args.today.as_deref())?;
    let data = serde_json::to_value(JournalStreakData {
        today: JournalDate::new(today),
        streak: journal.streak(today).await?,
        cap: STREAK_CAP_DAYS,
    })?;
    Ok(CommandResult::ok(data))
}

fn today_or(raw: Option<&str>) -> Result<Date, CliError> {
    match raw {
        Some(raw) => Ok(JournalDate::parse(raw)?.date()),
        None => Ok(OffsetDateTime::now_utc().date()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_args(date: &str, level: u8) -> JournalAddArgs {
        JournalAddArgs {
            date: Some(String::from(date)),
            level,
            note: None,
        }
    }

    #[tokio::test]
    async fn adding_reports_total_and_running_streak() {
        let journal = Journal::in_memory();
        add(&add_args("2026-10-17", 2), &journal).await.expect("add");
        add(&add_args("2026-10-18", 3), &journal).await.expect("add");

        let result = add(&add_args("2026-10-18", 4), &journal).await.expect("add");

        assert_eq!(result.data["total"], 2);
        assert_eq!(result.data["streak"], 2);
        assert_eq!(result.data["entry"]["date"], "2026-10-18");
        assert_eq!(result.data["entry"]["level"], 4);
    }

    #[tokio::test]
    async fn streak_reads_from_yesterday_when_today_is_blank() {
        let journal = Journal::in_memory();
        add(&add_args("2026-10-18", 1), &journal).await.expect("add");

        let result = streak_of(
            &JournalStreakArgs {
                today: Some(String::from("2026-10-19")),
            },
            &journal,
        )
        .await
        .expect("streak");

        assert_eq!(result.data["streak"], 1);
        assert_eq!(result.data["today"], "2026-10-19");
    }

    #[tokio::test]
    async fn list_with_calendar_groups_the_trailing_year() {
        let journal = Journal::in_memory();
        add(&add_args("2026-10-19", 4), &journal).await.expect("add");

        let result = list(
            &JournalListArgs {
                calendar: true,
                today: Some(String::from("2026-10-19")),
            },
            &journal,
        )
        .await
        .expect("list");

        let calendar = result.data["calendar"].as_array().expect("calendar");
        assert_eq!(calendar.len(), 13);
        assert_eq!(calendar[12]["month"], "2026-10");
        assert_eq!(calendar[12]["days"][18]["level"], 4);
        assert_eq!(result.data["entries"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn clear_then_list_is_empty() {
        let journal = Journal::in_memory();
        add(&add_args("2026-10-19", 4), &journal).await.expect("add");

        let cleared = clear(&journal).await.expect("clear");
        let listed = list(
            &JournalListArgs {
                calendar: false,
                today: None,
            },
            &journal,
        )
        .await
        .expect("list");

        assert_eq!(cleared.data["removed"], true);
        assert_eq!(listed.data["entries"].as_array().map(Vec::len), Some(0));
        assert!(listed.data.get("calendar").is_none());
    }

    #[tokio::test]
    async fn malformed_date_is_a_validation_error() {
        let error = add(&add_args("19/10/2026", 4), &Journal::in_memory())
            .await
            .err()
            .expect("date rejected");

        assert_eq!(error.exit_code(), 2);
    }
}
