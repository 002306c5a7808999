//! Timeout and fallback wrapper around every [`EmotionAnalyzer`] call.
//!
//! Nothing in here returns an error: a failed, slow, or panicking analyzer is
//! logged and replaced by a fixed fallback so records always carry a complete
//! analysis.

use super::{ATMOSPHERE_VOCABULARY, EmotionAnalyzer, RawAnalysis};
use crate::config::AnalysisLimits;
use crate::models::{ChatTurn, DEFAULT_SCORE, Emotion, NEUTRAL_EMOJI};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_ATMOSPHERE: &str = "calm";
pub const FALLBACK_CONVERSATION_SUMMARY: &str = "Conversation saved.";
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't put a reply together just now. Could you tell me a little more?";

const SUMMARY_PREVIEW_CHARS: usize = 50;
const MAX_KEYWORDS: usize = 5;
const SUMMARY_TURNS: usize = 10;
const REPLY_HISTORY_TURNS: usize = 20;

/// A normalized analysis: every field valid and present.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionAnalysis {
    pub emotion: Emotion,
    pub emotion_emoji: String,
    pub emotion_score: u8,
    pub stress_keywords: Vec<String>,
    pub summary: String,
}

impl EmotionAnalysis {
    pub fn fallback(text: &str) -> Self {
        Self {
            emotion: Emotion::Neutral,
            emotion_emoji: NEUTRAL_EMOJI.to_string(),
            emotion_score: DEFAULT_SCORE,
            stress_keywords: Vec::new(),
            summary: fallback_summary(text),
        }
    }

    pub fn normalize(raw: RawAnalysis, text: &str) -> Self {
        let parsed = raw.emotion.as_deref().and_then(Emotion::parse);
        let emotion = Emotion::from_analyzer(raw.emotion.as_deref());

        let emotion_emoji = raw
            .emotion_emoji
            .map(|emoji| emoji.trim().to_string())
            .filter(|emoji| !emoji.is_empty() && parsed == Some(emotion))
            .unwrap_or_else(|| emotion.emoji().to_string());

        let summary = raw
            .summary
            .map(|summary| summary.trim().to_string())
            .filter(|summary| !summary.is_empty())
            .unwrap_or_else(|| fallback_summary(text));

        Self {
            emotion,
            emotion_emoji,
            emotion_score: normalize_score(raw.emotion_score.as_ref()),
            stress_keywords: normalize_keywords(raw.stress_keywords.as_ref()),
            summary,
        }
    }
}

/// Keeps at most `max_chars` characters, marking a cut with `"..."`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn fallback_summary(text: &str) -> String {
    let preview = text.chars().take(SUMMARY_PREVIEW_CHARS).collect::<String>();
    format!("{preview}...")
}

pub async fn analyze_or_fallback(
    analyzer: Arc<dyn EmotionAnalyzer>,
    text: &str,
    limits: &AnalysisLimits,
) -> EmotionAnalysis {
    let input = truncate_chars(text, limits.analysis_max_chars);

    match run_guarded("analyze", limits.analysis_timeout, move || {
        analyzer.analyze(&input)
    })
    .await
    {
        Some(raw) => EmotionAnalysis::normalize(raw, text),
        None => EmotionAnalysis::fallback(text),
    }
}

pub async fn atmosphere_or_fallback(
    analyzer: Arc<dyn EmotionAnalyzer>,
    text: &str,
    limits: &AnalysisLimits,
) -> String {
    let input = truncate_chars(text, limits.atmosphere_max_chars);

    run_guarded("atmosphere", limits.atmosphere_timeout, move || {
        analyzer.analyze_atmosphere(&input)
    })
    .await
    .and_then(|answer| match_atmosphere(&answer))
    .unwrap_or(DEFAULT_ATMOSPHERE)
    .to_string()
}

pub async fn summary_or_fallback(
    analyzer: Arc<dyn EmotionAnalyzer>,
    turns: &[ChatTurn],
    limits: &AnalysisLimits,
) -> String {
    let recent = tail(turns, SUMMARY_TURNS);

    run_guarded("summarize", limits.summary_timeout, move || {
        analyzer.summarize_conversation(&recent)
    })
    .await
    .map(|summary| summary.trim().to_string())
    .filter(|summary| !summary.is_empty())
    .unwrap_or_else(|| FALLBACK_CONVERSATION_SUMMARY.to_string())
}

pub async fn reply_or_fallback(
    analyzer: Arc<dyn EmotionAnalyzer>,
    message: &str,
    history: &[ChatTurn],
    limits: &AnalysisLimits,
) -> String {
    let message = message.to_string();
    let recent = tail(history, REPLY_HISTORY_TURNS);

    run_guarded("chat_reply", limits.reply_timeout, move || {
        analyzer.chat_reply(&message, &recent)
    })
    .await
    .map(|reply| reply.trim().to_string())
    .filter(|reply| !reply.is_empty())
    .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}

async fn run_guarded<T, F>(operation: &'static str, limit: Duration, call: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(Ok(value))) => Some(value),
        Ok(Ok(Err(error))) => {
            warn!(operation, error = %error, "analyzer call failed, using fallback");
            None
        }
        Ok(Err(join_error)) => {
            warn!(operation, error = %join_error, "analyzer task aborted, using fallback");
            None
        }
        Err(_) => {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "analyzer call timed out, using fallback"
            );
            None
        }
    }
}

fn tail(turns: &[ChatTurn], count: usize) -> Vec<ChatTurn> {
    turns[turns.len().saturating_sub(count)..].to_vec()
}

fn normalize_score(raw: Option<&Value>) -> u8 {
    raw.and_then(Value::as_f64)
        .filter(|score| score.is_finite())
        .map(|score| score.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(DEFAULT_SCORE)
}

fn normalize_keywords(raw: Option<&Value>) -> Vec<String> {
    raw.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .take(MAX_KEYWORDS)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// The vocabulary word appearing earliest in the answer.
fn match_atmosphere(answer: &str) -> Option<&'static str> {
    let answer = answer.to_lowercase();

    ATMOSPHERE_VOCABULARY
        .iter()
        .filter_map(|word| answer.find(word).map(|position| (position, *word)))
        .min_by_key(|(position, word)| (*position, std::cmp::Reverse(word.len())))
        .map(|(_, word)| word)
}

#[cfg(test)]
mod tests {
    use super::{
        DEFAULT_ATMOSPHERE, EmotionAnalysis, FALLBACK_CONVERSATION_SUMMARY, FALLBACK_REPLY,
        analyze_or_fallback, atmosphere_or_fallback, match_atmosphere, reply_or_fallback,
        summary_or_fallback, truncate_chars,
    };
    use crate::ai::RawAnalysis;
    use crate::ai::testing::StubAnalyzer;
    use crate::config::Config;
    use crate::models::{ChatRole, ChatTurn, Emotion};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn turns(count: usize) -> Vec<ChatTurn> {
        (0..count)
            .map(|index| ChatTurn {
                role: if index % 2 == 0 {
                    ChatRole::User
                } else {
                    ChatRole::Assistant
                },
                content: format!("turn {index}"),
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("안녕하세요", 2), "안녕...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn normalization_coerces_labels_and_clamps_scores() {
        let raw = RawAnalysis {
            emotion: Some("Euphoric".to_string()),
            emotion_emoji: Some("🤩".to_string()),
            emotion_score: Some(json!(140.6)),
            stress_keywords: Some(json!(["  ", "deadline", 7, "boss"])),
            summary: None,
        };

        let analysis = EmotionAnalysis::normalize(raw, "a very long day at the office");
        assert_eq!(analysis.emotion, Emotion::Neutral);
        assert_eq!(analysis.emotion_emoji, "😐");
        assert_eq!(analysis.emotion_score, 100);
        assert_eq!(analysis.stress_keywords, vec!["deadline", "boss"]);
        assert_eq!(analysis.summary, "a very long day at the office...");
    }

    #[test]
    fn non_numeric_scores_default_to_fifty() {
        let raw = RawAnalysis {
            emotion: Some("Sad".to_string()),
            emotion_score: Some(json!("75")),
            ..RawAnalysis::default()
        };

        let analysis = EmotionAnalysis::normalize(raw, "text");
        assert_eq!(analysis.emotion, Emotion::Sad);
        assert_eq!(analysis.emotion_emoji, "😢");
        assert_eq!(analysis.emotion_score, 50);
    }

    #[tokio::test]
    async fn failing_analyzer_yields_the_fixed_fallback() {
        let limits = Config::default().analysis_limits();
        let text = "x".repeat(80);

        let analysis =
            analyze_or_fallback(Arc::new(StubAnalyzer::failing()), &text, &limits).await;

        assert_eq!(analysis, EmotionAnalysis::fallback(&text));
        assert_eq!(analysis.summary, format!("{}...", "x".repeat(50)));
    }

    #[tokio::test]
    async fn slow_analyzer_times_out_into_the_fallback() {
        let mut limits = Config::default().analysis_limits();
        limits.analysis_timeout = Duration::from_millis(20);

        let stub = StubAnalyzer {
            delay: Some(Duration::from_millis(250)),
            ..StubAnalyzer::scripted("Happy", json!(90))
        };

        let analysis = analyze_or_fallback(Arc::new(stub), "late", &limits).await;
        assert_eq!(analysis.emotion, Emotion::Neutral);
        assert_eq!(analysis.emotion_score, 50);
    }

    #[tokio::test]
    async fn analyzer_sees_truncated_input() {
        let mut limits = Config::default().analysis_limits();
        limits.analysis_max_chars = 10;

        let stub = Arc::new(StubAnalyzer::scripted("Happy", json!(81)));
        let analysis = analyze_or_fallback(stub.clone(), &"y".repeat(30), &limits).await;

        assert_eq!(analysis.emotion, Emotion::Happy);
        assert_eq!(analysis.emotion_score, 81);
        assert_eq!(stub.seen(), vec![format!("{}...", "y".repeat(10))]);
    }

    #[tokio::test]
    async fn atmosphere_is_matched_against_the_vocabulary() {
        let limits = Config::default().analysis_limits();

        let stub = StubAnalyzer {
            atmosphere: Some("Mostly hopeful, a bit tense".to_string()),
            ..StubAnalyzer::default()
        };
        let word = atmosphere_or_fallback(Arc::new(stub), "text", &limits).await;
        assert_eq!(word, "hopeful");

        let failed = atmosphere_or_fallback(Arc::new(StubAnalyzer::failing()), "text", &limits).await;
        assert_eq!(failed, DEFAULT_ATMOSPHERE);

        assert_eq!(match_atmosphere("serene"), None);
        assert_eq!(match_atmosphere("HOPELESS"), Some("hopeless"));
    }

    #[tokio::test]
    async fn summaries_use_the_last_ten_turns() {
        let limits = Config::default().analysis_limits();
        let stub = Arc::new(StubAnalyzer::scripted("Neutral", json!(50)));

        let summary = summary_or_fallback(stub.clone(), &turns(14), &limits).await;
        assert_eq!(summary, "We talked about the day.");
        assert_eq!(stub.seen(), vec!["10 turns".to_string()]);

        let fallback =
            summary_or_fallback(Arc::new(StubAnalyzer::failing()), &turns(3), &limits).await;
        assert_eq!(fallback, FALLBACK_CONVERSATION_SUMMARY);
    }

    #[tokio::test]
    async fn replies_carry_at_most_twenty_prior_turns() {
        let limits = Config::default().analysis_limits();
        let stub = Arc::new(StubAnalyzer::scripted("Neutral", json!(50)));

        reply_or_fallback(stub.clone(), "hi", &turns(25), &limits).await;
        assert_eq!(stub.seen(), vec!["hi (20 prior)".to_string()]);

        let fallback =
            reply_or_fallback(Arc::new(StubAnalyzer::failing()), "hi", &[], &limits).await;
        assert_eq!(fallback, FALLBACK_REPLY);
    }
}
