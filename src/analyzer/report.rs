use crate::analyzer::day::average_score;
use crate::analyzer::month::MonthWindow;
use crate::models::{DEFAULT_SCORE, Emotion, NEUTRAL_EMOJI, Record, RecordType};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const WEEKLY_TOP_KEYWORDS: usize = 5;
pub const MONTHLY_TOP_KEYWORDS: usize = 10;
const CONTENT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub score: u8,
    pub emotion: Emotion,
    pub emotion_emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub period: WeeklyPeriod,
    pub emotion_trend: Vec<TrendPoint>,
    pub top_keywords: Vec<KeywordCount>,
    pub emotion_distribution: BTreeMap<String, usize>,
    pub average_score: u8,
    pub total_records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPeriod {
    pub year: i32,
    pub month: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Positive / negative / neutral record counts. Independent of the calendar's
/// resolved emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodBuckets {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStatistics {
    pub total_records: usize,
    pub average_score: u8,
    pub emotion_distribution: MoodBuckets,
    pub top_keywords: Vec<KeywordCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub date: NaiveDate,
    pub summary: String,
    pub emotion: Emotion,
    pub emotion_emoji: String,
    pub record_type: RecordType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedEntry {
    pub date: NaiveDate,
    pub record_type: RecordType,
    pub emotion: Emotion,
    pub emotion_score: u8,
    pub stress_keywords: Vec<String>,
    pub summary: Option<String>,
    pub content_preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub period: MonthlyPeriod,
    pub statistics: MonthlyStatistics,
    pub emotion_trend: Vec<TrendPoint>,
    pub timeline: Vec<TimelineEntry>,
    pub detailed_data: Vec<DetailedEntry>,
}

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

pub fn build_weekly_report(start: NaiveDate, end: NaiveDate, records: &[Record]) -> WeeklyReport {
    let records = chronological(records);

    WeeklyReport {
        period: WeeklyPeriod {
            start_date: start,
            end_date: end,
        },
        emotion_trend: emotion_trend(&records),
        top_keywords: top_keywords(&records, WEEKLY_TOP_KEYWORDS),
        emotion_distribution: emotion_distribution(&records),
        average_score: rounded_average(&records),
        total_records: records.len(),
    }
}

pub fn build_monthly_report(window: &MonthWindow, records: &[Record]) -> MonthlyReport {
    let records = chronological(records);

    let timeline = records
        .iter()
        .filter_map(|record| {
            let summary = record.summary.as_deref().map(str::trim)?;
            (!summary.is_empty()).then(|| TimelineEntry {
                date: record.day(),
                summary: summary.to_string(),
                emotion: emotion_of(record),
                emotion_emoji: emoji_of(record),
                record_type: record.record_type,
            })
        })
        .collect::<Vec<_>>();

    let detailed_data = records
        .iter()
        .map(|record| DetailedEntry {
            date: record.day(),
            record_type: record.record_type,
            emotion: emotion_of(record),
            emotion_score: score_of(record),
            stress_keywords: record.stress_keywords.clone(),
            summary: record.summary.clone(),
            content_preview: content_preview(&record.content),
        })
        .collect::<Vec<_>>();

    MonthlyReport {
        period: MonthlyPeriod {
            year: window.year,
            month: window.month,
            start_date: window.first_day,
            end_date: window.last_day,
        },
        statistics: MonthlyStatistics {
            total_records: records.len(),
            average_score: rounded_average(&records),
            emotion_distribution: mood_buckets(&records),
            top_keywords: top_keywords(&records, MONTHLY_TOP_KEYWORDS),
        },
        emotion_trend: emotion_trend(&records),
        timeline,
        detailed_data,
    }
}

/// Keyword frequencies, highest first; equal counts keep first-seen order.
pub fn top_keywords(records: &[&Record], n: usize) -> Vec<KeywordCount> {
    let mut counts = records
        .iter()
        .flat_map(|record| record.stress_keywords.iter())
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .fold(Vec::<KeywordCount>::new(), |mut acc, keyword| {
            match acc.iter_mut().find(|entry| entry.keyword == keyword) {
                Some(entry) => entry.count += 1,
                None => acc.push(KeywordCount {
                    keyword: keyword.to_string(),
                    count: 1,
                }),
            }
            acc
        });

    counts.sort_by(|left, right| right.count.cmp(&left.count));
    counts.into_iter().take(n).collect()
}

/// Positive is `Happy` or a score above 60. Negative is `Sad`, `Angry`,
/// `Anxious` or a score below 40. A record can land in both; neutral is what
/// is left, never below zero.
pub fn mood_buckets(records: &[&Record]) -> MoodBuckets {
    let positive = records
        .iter()
        .filter(|record| {
            record.emotion == Some(Emotion::Happy)
                || record.emotion_score.is_some_and(|score| score > 60)
        })
        .count();
    let negative = records
        .iter()
        .filter(|record| {
            matches!(
                record.emotion,
                Some(Emotion::Sad | Emotion::Angry | Emotion::Anxious)
            ) || record.emotion_score.is_some_and(|score| score < 40)
        })
        .count();

    MoodBuckets {
        positive,
        negative,
        neutral: records.len().saturating_sub(positive + negative),
    }
}

pub fn render_markdown(report: &MonthlyReport) -> String {
    let stats = &report.statistics;

    let keyword_rows = if stats.top_keywords.is_empty() {
        "- No data".to_string()
    } else {
        stats
            .top_keywords
            .iter()
            .enumerate()
            .map(|(index, entry)| format!("{}. {} ({})", index + 1, entry.keyword, entry.count))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let trend_rows = if report.emotion_trend.is_empty() {
        "| - | - | - |".to_string()
    } else {
        report
            .emotion_trend
            .iter()
            .map(|point| {
                format!(
                    "| {} | {} {} | {} |",
                    point.date, point.emotion_emoji, point.emotion, point.score
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let timeline_rows = if report.timeline.is_empty() {
        "- No summarized entries".to_string()
    } else {
        report
            .timeline
            .iter()
            .map(|entry| {
                format!(
                    "- {} {} ({}): {}",
                    entry.date,
                    entry.emotion_emoji,
                    entry.record_type.as_str(),
                    entry.summary
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# Monthly Mood Report - {:04}-{:02}\n\n## Summary\n- Period: {} ~ {}\n- Records: {}\n- Average score: {}\n- Positive / Negative / Neutral: {} / {} / {}\n\n## Top Keywords ({})\n{}\n\n## Emotion Trend\n| Date | Emotion | Score |\n|------|---------|-------|\n{}\n\n## Timeline\n{}\n",
        report.period.year,
        report.period.month,
        report.period.start_date,
        report.period.end_date,
        stats.total_records,
        stats.average_score,
        stats.emotion_distribution.positive,
        stats.emotion_distribution.negative,
        stats.emotion_distribution.neutral,
        MONTHLY_TOP_KEYWORDS,
        keyword_rows,
        trend_rows,
        timeline_rows
    )
}

pub fn save_report_files(
    report: &MonthlyReport,
    user_id: i64,
    report_dir: &Path,
) -> Result<SavedReport> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let stem = format!(
        "user{}-{:04}-{:02}",
        user_id, report.period.year, report.period.month
    );
    let markdown_path = report_dir.join(format!("{stem}.md"));
    let json_path = report_dir.join(format!("{stem}.json"));

    fs::write(&markdown_path, render_markdown(report)).with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
    })
}

fn chronological(records: &[Record]) -> Vec<&Record> {
    let mut sorted = records
        .iter()
        .filter(|record| record.has_content())
        .collect::<Vec<_>>();

    sorted.sort_by(|left, right| {
        left.date
            .cmp(&right.date)
            .then_with(|| left.created_at.cmp(&right.created_at))
            .then_with(|| left.id.cmp(&right.id))
    });
    sorted
}

fn emotion_trend(records: &[&Record]) -> Vec<TrendPoint> {
    records
        .iter()
        .map(|record| TrendPoint {
            date: record.day(),
            score: score_of(record),
            emotion: emotion_of(record),
            emotion_emoji: emoji_of(record),
        })
        .collect()
}

fn emotion_distribution(records: &[&Record]) -> BTreeMap<String, usize> {
    records.iter().fold(BTreeMap::new(), |mut acc, record| {
        *acc.entry(emotion_of(record).label().to_string()).or_insert(0) += 1;
        acc
    })
}

fn rounded_average(records: &[&Record]) -> u8 {
    if records.is_empty() {
        return DEFAULT_SCORE;
    }

    average_score(records.iter().map(|record| Some(score_of(record))))
        .round()
        .clamp(0.0, 100.0) as u8
}

fn score_of(record: &Record) -> u8 {
    record.emotion_score.unwrap_or(DEFAULT_SCORE).min(100)
}

fn emotion_of(record: &Record) -> Emotion {
    record.emotion.unwrap_or(Emotion::Neutral)
}

fn emoji_of(record: &Record) -> String {
    record
        .emotion_emoji
        .as_deref()
        .map(str::trim)
        .filter(|emoji| !emoji.is_empty())
        .unwrap_or(NEUTRAL_EMOJI)
        .to_string()
}

fn content_preview(content: &str) -> String {
    let preview = content.chars().take(CONTENT_PREVIEW_CHARS).collect::<String>();
    if content.chars().count() > CONTENT_PREVIEW_CHARS {
        format!("{preview}...")
    } else {
        preview
    }
}
