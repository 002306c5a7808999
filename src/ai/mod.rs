pub mod guard;

use crate::config::{API_KEY_ENV, Config};
use crate::models::ChatTurn;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const ATMOSPHERE_VOCABULARY: [&str; 19] = [
    "warm",
    "calm",
    "tense",
    "lively",
    "gloomy",
    "bright",
    "dark",
    "peaceful",
    "exciting",
    "quiet",
    "dynamic",
    "comfortable",
    "uneasy",
    "hopeful",
    "hopeless",
    "passionate",
    "cool",
    "friendly",
    "distant",
];

/// Analyzer output as it arrives, before any normalization.
///
/// Every field is optional and loosely typed: the score may come back as a
/// string or be missing entirely, and the guard layer decides what to keep.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysis {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub emotion_emoji: Option<String>,
    #[serde(default)]
    pub emotion_score: Option<Value>,
    #[serde(default)]
    pub stress_keywords: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// The external emotion-analysis collaborator.
///
/// Calls are blocking and may be slow; callers go through [`guard`], which
/// bounds them with a timeout and substitutes fallbacks.
pub trait EmotionAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<RawAnalysis>;

    fn analyze_atmosphere(&self, text: &str) -> Result<String>;

    fn summarize_conversation(&self, turns: &[ChatTurn]) -> Result<String>;

    fn chat_reply(&self, message: &str, history: &[ChatTurn]) -> Result<String>;
}

/// Stands in when AI is switched off or no key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledAnalyzer;

impl EmotionAnalyzer for DisabledAnalyzer {
    fn analyze(&self, _text: &str) -> Result<RawAnalysis> {
        bail!("AI analysis is disabled")
    }

    fn analyze_atmosphere(&self, _text: &str) -> Result<String> {
        bail!("AI analysis is disabled")
    }

    fn summarize_conversation(&self, _turns: &[ChatTurn]) -> Result<String> {
        bail!("AI analysis is disabled")
    }

    fn chat_reply(&self, _message: &str, _history: &[ChatTurn]) -> Result<String> {
        bail!("AI analysis is disabled")
    }
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct AiAnalyzer {
    base_url: String,
    model: String,
    timeout_seconds: u64,
    api_key: String,
}

impl AiAnalyzer {
    pub fn new(config: &Config, api_key: &str) -> Self {
        Self {
            base_url: config.ai_api_base_url.clone(),
            model: config.ai_model.clone(),
            timeout_seconds: config.ai_timeout_seconds.max(5),
            api_key: api_key.to_string(),
        }
    }

    fn complete(&self, messages: Vec<Value>, temperature: f32) -> Result<String> {
        chat_completion(
            &self.base_url,
            &self.model,
            self.timeout_seconds,
            &self.api_key,
            messages,
            temperature,
        )
    }
}

impl EmotionAnalyzer for AiAnalyzer {
    fn analyze(&self, text: &str) -> Result<RawAnalysis> {
        let system_prompt = r#"You analyse diary entries. Return JSON only: {"emotion":"Happy|Sad|Angry|Anxious|Neutral","emotionEmoji":"😊|😢|😠|😰|😐","emotionScore":0-100,"stressKeywords":["..."],"summary":"..."}. emotionScore is an integer where 0 is the most negative and 100 the most positive mood. stressKeywords holds 3 to 5 short stress-related keywords. summary is one or two sentences."#;

        let content = self.complete(
            vec![
                json!({"role": "system", "content": system_prompt}),
                json!({"role": "user", "content": text}),
            ],
            0.1,
        )?;

        parse_analysis_payload(&content)
    }

    fn analyze_atmosphere(&self, text: &str) -> Result<String> {
        let system_prompt = format!(
            "Describe the atmosphere of the message with exactly one word from this list: {}. Answer with the word only.",
            ATMOSPHERE_VOCABULARY.join(", ")
        );

        self.complete(
            vec![
                json!({"role": "system", "content": system_prompt}),
                json!({"role": "user", "content": text}),
            ],
            0.1,
        )
    }

    fn summarize_conversation(&self, turns: &[ChatTurn]) -> Result<String> {
        let system_prompt = "Summarize this counselling conversation from the user's point of view in two or three sentences, as a diary entry. Return the summary only.";

        self.complete(
            vec![
                json!({"role": "system", "content": system_prompt}),
                json!({"role": "user", "content": transcript(turns)}),
            ],
            0.3,
        )
    }

    fn chat_reply(&self, message: &str, history: &[ChatTurn]) -> Result<String> {
        let system_prompt = "You are a warm, empathetic counsellor helping the user reflect on their day. Keep answers short, ask one gentle follow-up question, and never give medical advice.";

        let mut messages = vec![json!({"role": "system", "content": system_prompt})];
        messages.extend(
            history
                .iter()
                .map(|turn| json!({"role": turn.role.as_str(), "content": turn.content})),
        );
        messages.push(json!({"role": "user", "content": message}));

        self.complete(messages, 0.7)
    }
}

/// Picks the live client when AI is enabled and a key is available.
pub fn build_analyzer(config: &Config) -> Arc<dyn EmotionAnalyzer> {
    if !config.ai_enabled {
        return Arc::new(DisabledAnalyzer);
    }

    match config.resolve_api_key() {
        Some(api_key) => Arc::new(AiAnalyzer::new(config, &api_key)),
        None => {
            tracing::warn!("AI is enabled but no API key is configured; analyses will use fallbacks");
            Arc::new(DisabledAnalyzer)
        }
    }
}

pub fn test_connection(config: &Config) -> Result<String> {
    let api_key = config.resolve_api_key().with_context(|| {
        format!(
            "AI API key is missing. Set `MoodJournal config set ai.api_key <KEY>` or `{API_KEY_ENV}`."
        )
    })?;

    AiAnalyzer::new(config, &api_key).complete(
        vec![
            json!({"role": "system", "content": "Return exactly one short sentence confirming AI API connectivity is healthy."}),
            json!({"role": "user", "content": "Health check for MoodJournal."}),
        ],
        0.1,
    )
}

pub fn has_api_key(config: &Config) -> bool {
    config.resolve_api_key().is_some()
}

/// One `role: content` line per turn.
pub fn transcript(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

fn chat_completion(
    base_url: &str,
    model: &str,
    timeout_seconds: u64,
    api_key: &str,
    messages: Vec<Value>,
    temperature: f32,
) -> Result<String> {
    let base_url = base_url.to_string();
    let model = model.to_string();
    let api_key = api_key.to_string();

    std::thread::spawn(move || {
        chat_completion_blocking(
            &base_url,
            &model,
            timeout_seconds,
            &api_key,
            &messages,
            temperature,
        )
    })
    .join()
    .map_err(|_| anyhow!("AI worker thread panicked"))?
}

fn chat_completion_blocking(
    base_url: &str,
    model: &str,
    timeout_seconds: u64,
    api_key: &str,
    messages: &[Value],
    temperature: f32,
) -> Result<String> {
    if api_key.trim().is_empty() {
        bail!("AI API key is empty");
    }

    let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Failed to build Authorization header")?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let request_body = json!({
        "model": model,
        "temperature": temperature,
        "messages": messages,
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .context("AI API request failed")?;

    let status = response.status();
    let body = response.text().context("Failed to read AI response body")?;

    if !status.is_success() {
        bail!("AI API error {}: {}", status, body);
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse AI response: {body}"))?;

    parsed
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow!("AI response did not include message.content"))
}

fn parse_analysis_payload(content: &str) -> Result<RawAnalysis> {
    let extracted = extract_json_block(content);
    serde_json::from_str(&extracted)
        .with_context(|| format!("Failed to parse AI JSON payload. content: {content}"))
}

fn extract_json_block(content: &str) -> String {
    let fenced = content.split("```").map(str::trim).find_map(|block| {
        block
            .strip_prefix("json")
            .map(str::trim)
            .or_else(|| block.starts_with('{').then_some(block))
    });

    match fenced {
        Some(block) => block.to_string(),
        None => {
            let first = content.find('{');
            let last = content.rfind('}');

            match (first, last) {
                (Some(start), Some(end)) if end > start => content[start..=end].to_string(),
                _ => content.trim().to_string(),
            }
        }
    }
}
