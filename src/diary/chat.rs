use crate::ai::guard::{self, FALLBACK_CONVERSATION_SUMMARY};
use crate::ai::{EmotionAnalyzer, transcript};
use crate::config::Config;
use crate::db::{Database, RecordStore};
use crate::models::{ChatMessage, ChatRole, ChatTurn, Record, RecordType};
use crate::validation::{ValidationError, require_text};
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const RECENT_MESSAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: String,
    pub messages: Vec<ChatTurn>,
    pub last_message_time: DateTime<Utc>,
}

pub fn append_chat_message(
    config: &Config,
    user_id: i64,
    session_id: &str,
    role: &str,
    content: &str,
) -> Result<ChatMessage> {
    let session_id = require_text(Some(session_id), "A session ID is required.")?;
    let content = require_text(Some(content), "Message content is required.")?;
    let role = ChatRole::parse(role)
        .ok_or_else(|| ValidationError::new("role must be either user or assistant."))?;

    let database = Database::open(&config.db_path)?;
    database.insert_chat_message(user_id, session_id.trim(), role, content, None, Utc::now())
}

/// Stores the user's turn, asks the analyzer for a reply, and stores that too.
///
/// The reply falls back to a fixed sentence when the analyzer fails. A failure
/// to store the reply is logged and the reply is still returned.
pub async fn chat_exchange(
    config: &Config,
    analyzer: Arc<dyn EmotionAnalyzer>,
    user_id: i64,
    session_id: &str,
    message: &str,
) -> Result<ChatExchange> {
    let message = require_text(Some(message), "A user ID and a message are required.")?;
    let session_id = require_text(Some(session_id), "A session ID is required.")?.trim();
    let limits = config.analysis_limits();

    let atmosphere = guard::atmosphere_or_fallback(analyzer.clone(), message, &limits).await;

    let history = {
        let database = Database::open(&config.db_path)?;
        let stored = database.insert_chat_message(
            user_id,
            session_id,
            ChatRole::User,
            message,
            Some(&atmosphere),
            Utc::now(),
        )?;

        database
            .chat_session(session_id)?
            .into_iter()
            .filter(|turn| turn.id != stored.id)
            .map(|turn| turn.to_turn())
            .collect::<Vec<_>>()
    };

    let response = guard::reply_or_fallback(analyzer, message, &history, &limits).await;

    let stored_reply = Database::open(&config.db_path).and_then(|database| {
        database.insert_chat_message(
            user_id,
            session_id,
            ChatRole::Assistant,
            &response,
            None,
            Utc::now(),
        )
    });
    if let Err(error) = stored_reply {
        warn!(user_id, session_id, error = %error, "failed to store assistant reply");
    }

    info!(user_id, session_id, history = history.len(), "chat turn answered");

    Ok(ChatExchange {
        response,
        session_id: session_id.to_string(),
    })
}

/// Finalizes a chat session into one `chatbot` record.
/// `None` when the session has no turns for this user.
pub async fn save_chat_diary(
    config: &Config,
    analyzer: Arc<dyn EmotionAnalyzer>,
    user_id: i64,
    session_id: &str,
    date: Option<NaiveDateTime>,
) -> Result<Option<Record>> {
    let session_id = require_text(Some(session_id), "A session ID is required.")?.trim();

    let turns = Database::open(&config.db_path)?
        .chat_session_for_user(user_id, session_id)?
        .iter()
        .map(ChatMessage::to_turn)
        .collect::<Vec<_>>();

    if turns.is_empty() {
        return Ok(None);
    }

    let conversation = transcript(&turns);
    let limits = config.analysis_limits();

    let (analysis, atmosphere, summary) = tokio::join!(
        guard::analyze_or_fallback(analyzer.clone(), &conversation, &limits),
        guard::atmosphere_or_fallback(analyzer.clone(), &conversation, &limits),
        guard::summary_or_fallback(analyzer, &turns, &limits),
    );

    let record = Record {
        id: None,
        user_id,
        date: date.unwrap_or_else(|| Local::now().naive_local()),
        record_type: RecordType::Chatbot,
        content: conversation,
        emotion: Some(analysis.emotion),
        emotion_emoji: Some(analysis.emotion_emoji),
        emotion_score: Some(analysis.emotion_score),
        stress_keywords: analysis.stress_keywords,
        summary: Some(summary),
        atmosphere: Some(atmosphere),
        chat_history: turns,
        created_at: Utc::now(),
    };

    let saved = Database::open(&config.db_path)?.save(record)?;

    info!(
        user_id,
        session_id,
        record_id = saved.id,
        turns = saved.chat_history.len(),
        summarized = saved.summary.as_deref() != Some(FALLBACK_CONVERSATION_SUMMARY),
        "chat diary saved"
    );

    Ok(Some(saved))
}

pub fn session_history(config: &Config, session_id: &str) -> Result<Vec<ChatMessage>> {
    Database::open(&config.db_path)?.chat_session(session_id.trim())
}

/// The user's last 100 messages grouped by session, newest session first.
/// Messages inside a session are chronological.
pub fn recent_sessions(config: &Config, user_id: i64) -> Result<Vec<ChatSession>> {
    let messages = Database::open(&config.db_path)?.recent_chat_messages(user_id, RECENT_MESSAGE_LIMIT)?;
    Ok(group_sessions(messages))
}

fn group_sessions(newest_first: Vec<ChatMessage>) -> Vec<ChatSession> {
    let mut order = Vec::<String>::new();
    let mut sessions = HashMap::<String, ChatSession>::new();

    for message in newest_first {
        let session = sessions
            .entry(message.session_id.clone())
            .or_insert_with(|| {
                order.push(message.session_id.clone());
                ChatSession {
                    session_id: message.session_id.clone(),
                    messages: Vec::new(),
                    last_message_time: message.timestamp,
                }
            });
        session.messages.push(message.to_turn());
    }

    order
        .into_iter()
        .filter_map(|session_id| sessions.remove(&session_id))
        .map(|mut session| {
            session.messages.reverse();
            session
        })
        .collect()
}
