pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  nickname   TEXT NOT NULL UNIQUE,
  created_at INTEGER NOT NULL
);
"#;

pub const CREATE_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS records (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id         INTEGER NOT NULL,
  date            TEXT NOT NULL,
  record_type     TEXT NOT NULL CHECK (record_type IN ('text', 'chatbot')),
  content         TEXT NOT NULL,
  emotion         TEXT,
  emotion_emoji   TEXT,
  emotion_score   INTEGER DEFAULT 50,
  stress_keywords TEXT NOT NULL DEFAULT '[]',
  summary         TEXT,
  atmosphere      TEXT,
  chat_history    TEXT NOT NULL DEFAULT '[]',
  created_at      INTEGER NOT NULL
);
"#;

pub const CREATE_CHAT_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS chat_messages (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id    INTEGER NOT NULL,
  session_id TEXT NOT NULL,
  role       TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
  content    TEXT NOT NULL,
  atmosphere TEXT,
  timestamp  INTEGER NOT NULL
);
"#;

pub const INDEX_RECORDS_USER_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_user_date ON records(user_id, date);";

pub const INDEX_CHAT_SESSION_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, timestamp);";

pub const INDEX_CHAT_USER_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_user ON chat_messages(user_id, timestamp);";

pub const RECORD_COLUMNS: &str = "id, user_id, date, record_type, content, emotion, emotion_emoji, emotion_score, stress_keywords, summary, atmosphere, chat_history, created_at";

pub const CHAT_COLUMNS: &str = "id, user_id, session_id, role, content, atmosphere, timestamp";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_RECORDS,
        CREATE_CHAT_MESSAGES,
        INDEX_RECORDS_USER_DATE,
        INDEX_CHAT_SESSION_TIMESTAMP,
        INDEX_CHAT_USER_TIMESTAMP,
    ]
}
