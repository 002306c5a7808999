use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NEUTRAL_EMOJI: &str = "😐";
pub const DEFAULT_SCORE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Anxious,
    Neutral,
    /// Never produced by the analyzer, but may be present in stored data.
    Stressed,
}

impl Emotion {
    pub fn label(self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Anxious => "Anxious",
            Emotion::Neutral => "Neutral",
            Emotion::Stressed => "Stressed",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Emotion::Happy => "😊",
            Emotion::Sad => "😢",
            Emotion::Angry | Emotion::Stressed => "😠",
            Emotion::Anxious => "😰",
            Emotion::Neutral => NEUTRAL_EMOJI,
        }
    }

    /// Parses any known label, including `Stressed`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "happy" => Some(Emotion::Happy),
            "sad" => Some(Emotion::Sad),
            "angry" => Some(Emotion::Angry),
            "anxious" => Some(Emotion::Anxious),
            "neutral" => Some(Emotion::Neutral),
            "stressed" => Some(Emotion::Stressed),
            _ => None,
        }
    }

    /// Coerces an analyzer label into one of the five analyzer labels.
    pub fn from_analyzer(raw: Option<&str>) -> Self {
        match raw.and_then(Self::parse) {
            Some(Emotion::Stressed) | None => Emotion::Neutral,
            Some(emotion) => emotion,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Text,
    Chatbot,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Text => "text",
            RecordType::Chatbot => "chatbot",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(RecordType::Text),
            "chatbot" => Some(RecordType::Chatbot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One journal entry, written either as a diary post or as a finalized chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: Option<i64>,
    pub user_id: i64,
    /// Local wall-clock time; days are compared on its calendar date.
    pub date: NaiveDateTime,
    pub record_type: RecordType,
    pub content: String,
    pub emotion: Option<Emotion>,
    pub emotion_emoji: Option<String>,
    pub emotion_score: Option<u8>,
    pub stress_keywords: Vec<String>,
    pub summary: Option<String>,
    pub atmosphere: Option<String>,
    pub chat_history: Vec<ChatTurn>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub atmosphere: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn {
            role: self.role,
            content: self.content.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Emotion, RecordType};

    #[test]
    fn analyzer_labels_coerce_unknown_and_stressed_to_neutral() {
        assert_eq!(Emotion::from_analyzer(Some("happy ")), Emotion::Happy);
        assert_eq!(Emotion::from_analyzer(Some("Furious")), Emotion::Neutral);
        assert_eq!(Emotion::from_analyzer(Some("Stressed")), Emotion::Neutral);
        assert_eq!(Emotion::from_analyzer(None), Emotion::Neutral);
    }

    #[test]
    fn stressed_shares_the_angry_glyph_but_keeps_its_label() {
        assert_eq!(Emotion::Stressed.emoji(), Emotion::Angry.emoji());
        assert_eq!(Emotion::parse("Stressed"), Some(Emotion::Stressed));
        assert_eq!(Emotion::Stressed.to_string(), "Stressed");
    }

    #[test]
    fn record_type_serializes_lowercase() {
        let json = serde_json::to_string(&RecordType::Chatbot).unwrap_or_default();
        assert_eq!(json, "\"chatbot\"");
        assert_eq!(RecordType::parse("text"), Some(RecordType::Text));
    }
}
