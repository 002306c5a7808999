use crate::analyzer::day::{DayAggregate, aggregate_day};
use crate::db::RecordStore;
use crate::models::Record;
use crate::validation::ValidationError;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// A validated calendar month and its inclusive day bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl MonthWindow {
    pub fn new(year: i32, month: u32, min_year: i32, max_year: i32) -> Result<Self, ValidationError> {
        if !(min_year..=max_year).contains(&year) {
            return Err(ValidationError::new(format!(
                "Invalid year: {year}. Use a year between {min_year} and {max_year}"
            )));
        }
        if !(1..=12).contains(&month) {
            return Err(ValidationError::new(format!(
                "Invalid month: {month}. Use a month between 1 and 12"
            )));
        }

        let first_day = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ValidationError::new(format!("Invalid month: {year}-{month}")))?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last_day = next_first
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| ValidationError::new(format!("Invalid month: {year}-{month}")))?;

        Ok(Self {
            year,
            month,
            first_day,
            last_day,
        })
    }

    /// Parses path or query strings; both must be plain integers.
    pub fn parse(
        year: &str,
        month: &str,
        min_year: i32,
        max_year: i32,
    ) -> Result<Self, ValidationError> {
        let year = year
            .trim()
            .parse::<i32>()
            .map_err(|_| ValidationError::new(format!("Invalid year: {}", year.trim())))?;
        let month = month
            .trim()
            .parse::<u32>()
            .map_err(|_| ValidationError::new(format!("Invalid month: {}", month.trim())))?;

        Self::new(year, month, min_year, max_year)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        (self.first_day..=self.last_day).contains(&day)
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Sparse calendar for one month: only days with at least one valid record,
/// ascending by date.
pub fn aggregate_month<S>(store: &S, user_id: i64, window: &MonthWindow) -> Result<Vec<DayAggregate>>
where
    S: RecordStore + ?Sized,
{
    let records = store.find_by_user_and_date_range(user_id, window.first_day, window.last_day)?;

    let by_day = records
        .into_iter()
        .filter(|record| record.has_content() && window.contains(record.day()))
        .fold(BTreeMap::<NaiveDate, Vec<Record>>::new(), |mut acc, record| {
            acc.entry(record.day()).or_default().push(record);
            acc
        });

    let days = by_day
        .iter()
        .map(|(day, records)| aggregate_day(*day, records))
        .filter(|aggregate| aggregate.has_record)
        .collect::<Vec<_>>();

    debug!(user_id, month = %window.label(), days = days.len(), "month aggregated");

    Ok(days)
}
