pub mod day;
pub mod month;
pub mod report;

use crate::analyzer::day::DayAggregate;
use crate::analyzer::month::MonthWindow;
use crate::analyzer::report::{MonthlyReport, SavedReport, WeeklyReport};
use crate::config::Config;
use crate::db::{Database, RecordStore};
use crate::validation::{ValidationError, parse_day};
use anyhow::Result;
use tracing::info;

pub fn calendar_month<S>(
    store: &S,
    config: &Config,
    user_id: i64,
    year: &str,
    month: &str,
) -> Result<(MonthWindow, Vec<DayAggregate>)>
where
    S: RecordStore + ?Sized,
{
    let window = MonthWindow::parse(year, month, config.min_year, config.max_year)?;
    let days = month::aggregate_month(store, user_id, &window)?;

    info!(user_id, month = %window.label(), days = days.len(), "calendar aggregated");

    Ok((window, days))
}

pub fn weekly_report<S>(
    store: &S,
    user_id: i64,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<WeeklyReport>
where
    S: RecordStore + ?Sized,
{
    let (Some(start), Some(end)) = (non_blank(start), non_blank(end)) else {
        return Err(ValidationError::new("startDate and endDate are required").into());
    };

    let start = parse_day(start)?;
    let end = parse_day(end)?;
    if start > end {
        return Err(ValidationError::new(format!(
            "startDate ({start}) must not be after endDate ({end})"
        ))
        .into());
    }

    let records = store.find_by_user_and_date_range(user_id, start, end)?;
    let report = report::build_weekly_report(start, end, &records);

    info!(
        user_id,
        %start,
        %end,
        records = report.total_records,
        "weekly report built"
    );

    Ok(report)
}

pub fn monthly_report<S>(
    store: &S,
    config: &Config,
    user_id: i64,
    year: Option<&str>,
    month: Option<&str>,
) -> Result<MonthlyReport>
where
    S: RecordStore + ?Sized,
{
    let (Some(year), Some(month)) = (non_blank(year), non_blank(month)) else {
        return Err(ValidationError::new("year and month are required").into());
    };

    let window = MonthWindow::parse(year, month, config.min_year, config.max_year)?;
    let records = store.find_by_user_and_date_range(user_id, window.first_day, window.last_day)?;
    let report = report::build_monthly_report(&window, &records);

    info!(
        user_id,
        month = %window.label(),
        records = report.statistics.total_records,
        "monthly report built"
    );

    Ok(report)
}

pub fn generate_and_save_monthly_report(
    config: &Config,
    user_id: i64,
    year: &str,
    month: &str,
) -> Result<(MonthlyReport, SavedReport)> {
    let database = Database::open(&config.db_path)?;
    let report = monthly_report(&database, config, user_id, Some(year), Some(month))?;
    let saved = report::save_report_files(&report, user_id, &config.report_dir)?;

    Ok((report, saved))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::db::RecordStore;
    use crate::models::{Emotion, Record, RecordType};
    use anyhow::{Result, bail};
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use std::cell::RefCell;

    /// Builds a text record for user 1; `created_at` follows `date`.
    pub(crate) fn record(stamp: &str, emotion: Emotion, score: u8, content: &str) -> Record {
        let date = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").expect("timestamp");

        Record {
            id: None,
            user_id: 1,
            date,
            record_type: RecordType::Text,
            content: content.to_string(),
            emotion: Some(emotion),
            emotion_emoji: Some(emotion.emoji().to_string()),
            emotion_score: Some(score),
            stress_keywords: Vec::new(),
            summary: None,
            atmosphere: None,
            chat_history: Vec::new(),
            created_at: DateTime::<Utc>::from_naive_utc_and_offset(date, Utc),
        }
    }

    /// Vec-backed store with the same filtering contract as SQLite.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        records: RefCell<Vec<Record>>,
    }

    impl MemoryStore {
        pub(crate) fn new(records: Vec<Record>) -> Self {
            Self {
                records: RefCell::new(records),
            }
        }
    }

    impl RecordStore for MemoryStore {
        fn find_by_user_and_date_range(
            &self,
            user_id: i64,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<Record>> {
            Ok(self
                .records
                .borrow()
                .iter()
                .filter(|record| record.user_id == user_id && record.has_content())
                .filter(|record| (start..=end).contains(&record.day()))
                .cloned()
                .collect())
        }

        fn save(&self, record: Record) -> Result<Record> {
            let mut records = self.records.borrow_mut();
            match record.id {
                Some(id) => match records.iter_mut().find(|stored| stored.id == Some(id)) {
                    Some(stored) => {
                        *stored = record.clone();
                        Ok(record)
                    }
                    None => bail!("Record not found: {id}"),
                },
                None => {
                    let saved = Record {
                        id: Some(records.len() as i64 + 1),
                        ..record
                    };
                    records.push(saved.clone());
                    Ok(saved)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{MemoryStore, record};
    use super::{calendar_month, monthly_report, weekly_report};
    use crate::config::Config;
    use crate::db::RecordStore;
    use crate::models::Emotion;
    use crate::validation::ValidationError;

    #[test]
    fn missing_report_dates_are_validation_errors() {
        let store = MemoryStore::default();

        let error = weekly_report(&store, 1, Some("2024-11-01"), None).expect_err("missing end");
        assert!(error.downcast_ref::<ValidationError>().is_some());

        let error = monthly_report(&store, &Config::default(), 1, None, Some("11"))
            .expect_err("missing year");
        assert!(error.downcast_ref::<ValidationError>().is_some());

        let error = weekly_report(&store, 1, Some("2024-11-08"), Some("2024-11-01"))
            .expect_err("reversed");
        assert!(error.downcast_ref::<ValidationError>().is_some());
    }

    #[test]
    fn calendar_rejects_years_outside_the_configured_range() {
        let store = MemoryStore::default();
        let config = Config::default();

        let error = calendar_month(&store, &config, 1, "1850", "1").expect_err("too early");
        assert!(error.downcast_ref::<ValidationError>().is_some());
        assert!(calendar_month(&store, &config, 1, "2024", "13").is_err());
    }

    #[test]
    fn saved_text_is_read_back_with_a_valid_label() {
        let store = MemoryStore::default();
        let saved = store
            .save(record("2024-11-01 10:00:00", Emotion::Anxious, 45, "exam tomorrow"))
            .expect("save");
        assert_eq!(saved.id, Some(1));

        let day = saved.day();
        let found = store.find_by_user_and_day(1, day).expect("query");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "exam tomorrow");
        assert_eq!(found[0].emotion, Some(Emotion::Anxious));
    }

    #[test]
    fn weekly_report_only_sees_its_range() {
        let store = MemoryStore::new(vec![
            record("2024-11-03 23:59:59", Emotion::Sad, 10, "before"),
            record("2024-11-04 00:00:00", Emotion::Happy, 90, "first"),
            record("2024-11-10 23:59:59", Emotion::Happy, 70, "last"),
            record("2024-11-11 00:00:00", Emotion::Sad, 10, "after"),
        ]);

        let report = weekly_report(&store, 1, Some("2024-11-04"), Some("2024-11-10")).expect("report");
        assert_eq!(report.total_records, 2);
        assert_eq!(report.average_score, 80);
    }
}
