pub mod chat;

use crate::ai::EmotionAnalyzer;
use crate::ai::guard::{self, EmotionAnalysis};
use crate::config::Config;
use crate::db::{Database, RecordStore};
use crate::models::{Record, RecordType};
use crate::validation::{ValidationError, require_text};
use anyhow::Result;
use chrono::{Local, NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Analyzes and stores a free-text diary entry.
///
/// Emotion and atmosphere run concurrently; either one failing falls back
/// without failing the save.
pub async fn save_text_diary(
    config: &Config,
    analyzer: Arc<dyn EmotionAnalyzer>,
    user_id: i64,
    content: &str,
    date: Option<NaiveDateTime>,
) -> Result<Record> {
    let content = require_text(Some(content), "Diary content is required.")?;
    let limits = config.analysis_limits();

    let (analysis, atmosphere) = tokio::join!(
        guard::analyze_or_fallback(analyzer.clone(), content, &limits),
        guard::atmosphere_or_fallback(analyzer, content, &limits),
    );

    let record = Record {
        id: None,
        user_id,
        date: date.unwrap_or_else(|| Local::now().naive_local()),
        record_type: RecordType::Text,
        content: content.to_string(),
        emotion: None,
        emotion_emoji: None,
        emotion_score: None,
        stress_keywords: Vec::new(),
        summary: None,
        atmosphere: Some(atmosphere),
        chat_history: Vec::new(),
        created_at: Utc::now(),
    };

    let saved = Database::open(&config.db_path)?.save(apply_analysis(record, analysis))?;

    info!(
        user_id,
        record_id = saved.id,
        emotion = ?saved.emotion,
        score = saved.emotion_score,
        "text diary saved"
    );

    Ok(saved)
}

/// Replaces a record's content and every analysis field in one update.
/// `None` when the record does not exist.
pub async fn update_diary_content(
    config: &Config,
    analyzer: Arc<dyn EmotionAnalyzer>,
    record_id: i64,
    content: &str,
) -> Result<Option<Record>> {
    let content = require_text(Some(content), "Diary content is required.")?;

    let Some(existing) = Database::open(&config.db_path)?.find_by_id(record_id)? else {
        return Ok(None);
    };

    let limits = config.analysis_limits();
    let (analysis, atmosphere) = tokio::join!(
        guard::analyze_or_fallback(analyzer.clone(), content, &limits),
        guard::atmosphere_or_fallback(analyzer, content, &limits),
    );

    let record = Record {
        content: content.to_string(),
        atmosphere: Some(atmosphere),
        ..existing
    };
    let saved = Database::open(&config.db_path)?.save(apply_analysis(record, analysis))?;

    info!(record_id, emotion = ?saved.emotion, "diary content re-analyzed");

    Ok(Some(saved))
}

pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDateTime>, ValidationError> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(crate::validation::parse_date_time)
        .transpose()
}

fn apply_analysis(record: Record, analysis: EmotionAnalysis) -> Record {
    Record {
        emotion: Some(analysis.emotion),
        emotion_emoji: Some(analysis.emotion_emoji),
        emotion_score: Some(analysis.emotion_score),
        stress_keywords: analysis.stress_keywords,
        summary: Some(analysis.summary),
        ..record
    }
}
