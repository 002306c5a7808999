pub mod queries;

use crate::models::{ChatMessage, ChatRole, Emotion, Record, RecordType, User};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;

/// Persistence contract for journal records.
///
/// Every query leaves out records whose content is blank, so callers never see
/// them. Result order is not part of the contract.
pub trait RecordStore {
    /// Records whose `date` falls on any calendar day in `[start, end]`.
    fn find_by_user_and_date_range(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Record>>;

    fn find_by_user_and_day(&self, user_id: i64, day: NaiveDate) -> Result<Vec<Record>> {
        self.find_by_user_and_date_range(user_id, day, day)
    }

    /// Inserts when `id` is `None`, otherwise overwrites the stored row.
    fn save(&self, record: Record) -> Result<Record>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM records WHERE id = ?1 AND TRIM(content) <> ''",
            queries::RECORD_COLUMNS
        );

        self.conn
            .query_row(&sql, params![id], record_from_row)
            .optional()
            .context("Failed to query record")
    }

    /// All of a user's records, newest first.
    pub fn find_all_by_user(&self, user_id: i64) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records
             WHERE user_id = ?1 AND TRIM(content) <> ''
             ORDER BY date DESC, created_at DESC, id DESC",
            queries::RECORD_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id], record_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query records")?;

        Ok(rows)
    }

    pub fn count_records(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE TRIM(content) <> ''",
                [],
                |row| row.get(0),
            )
            .context("Failed to count records")
    }

    pub fn latest_record_date(&self) -> Result<Option<NaiveDateTime>> {
        self.conn
            .query_row(
                "SELECT date FROM records WHERE TRIM(content) <> '' ORDER BY date DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query latest record date")
    }

    pub fn find_or_create_user(&self, nickname: &str) -> Result<User> {
        let nickname = nickname.trim();
        if let Some(user) = self.find_user_by_nickname(nickname)? {
            return Ok(user);
        }

        let created_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO users (nickname, created_at) VALUES (?1, ?2)",
                params![nickname, created_at.timestamp_millis()],
            )
            .context("Failed to insert user")?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            nickname: nickname.to_string(),
            created_at,
        })
    }

    pub fn find_user(&self, id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, nickname, created_at FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
            .context("Failed to query user")
    }

    pub fn find_user_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, nickname, created_at FROM users WHERE nickname = ?1",
                params![nickname.trim()],
                user_from_row,
            )
            .optional()
            .context("Failed to query user by nickname")
    }

    /// The user owning the most records, with that record count.
    pub fn user_with_most_records(&self) -> Result<Option<(User, i64)>> {
        let top = self
            .conn
            .query_row(
                "SELECT user_id, COUNT(*) AS total FROM records
                 WHERE TRIM(content) <> ''
                 GROUP BY user_id
                 ORDER BY total DESC, user_id ASC
                 LIMIT 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .context("Failed to rank users by record count")?;

        match top {
            Some((user_id, total)) => Ok(self.find_user(user_id)?.map(|user| (user, total))),
            None => Ok(None),
        }
    }

    pub fn count_users(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")
    }

    pub fn insert_chat_message(
        &self,
        user_id: i64,
        session_id: &str,
        role: ChatRole,
        content: &str,
        atmosphere: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        self.conn
            .execute(
                "INSERT INTO chat_messages (user_id, session_id, role, content, atmosphere, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    session_id,
                    role.as_str(),
                    content,
                    atmosphere,
                    timestamp.timestamp_millis()
                ],
            )
            .context("Failed to insert chat message")?;

        Ok(ChatMessage {
            id: self.conn.last_insert_rowid(),
            user_id,
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            atmosphere: atmosphere.map(ToOwned::to_owned),
            timestamp,
        })
    }

    /// A session's turns in chronological order.
    pub fn chat_session(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC",
            queries::CHAT_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![session_id], chat_message_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query chat session")?;

        Ok(rows)
    }

    pub fn chat_session_for_user(&self, user_id: i64, session_id: &str) -> Result<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages
             WHERE user_id = ?1 AND session_id = ?2
             ORDER BY timestamp ASC, id ASC",
            queries::CHAT_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id, session_id], chat_message_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query user chat session")?;

        Ok(rows)
    }

    /// A user's most recent chat messages, newest first.
    pub fn recent_chat_messages(&self, user_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages
             WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
            queries::CHAT_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id, limit as i64], chat_message_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query recent chat messages")?;

        Ok(rows)
    }

    fn insert_record(&self, record: &Record) -> Result<i64> {
        let stress_keywords = serde_json::to_string(&record.stress_keywords)
            .context("Failed to serialize stress keywords")?;
        let chat_history = serde_json::to_string(&record.chat_history)
            .context("Failed to serialize chat history")?;

        self.conn
            .execute(
                "INSERT INTO records (user_id, date, record_type, content, emotion, emotion_emoji, emotion_score, stress_keywords, summary, atmosphere, chat_history, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.user_id,
                    record.date,
                    record.record_type.as_str(),
                    record.content,
                    record.emotion.map(Emotion::label),
                    record.emotion_emoji,
                    record.emotion_score.map(|score| i64::from(score.min(100))),
                    stress_keywords,
                    record.summary,
                    record.atmosphere,
                    chat_history,
                    record.created_at.timestamp_millis(),
                ],
            )
            .context("Failed to insert record")?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_record(&self, id: i64, record: &Record) -> Result<()> {
        let stress_keywords = serde_json::to_string(&record.stress_keywords)
            .context("Failed to serialize stress keywords")?;
        let chat_history = serde_json::to_string(&record.chat_history)
            .context("Failed to serialize chat history")?;

        let updated = self
            .conn
            .execute(
                "UPDATE records
                 SET user_id = ?2, date = ?3, record_type = ?4, content = ?5, emotion = ?6, emotion_emoji = ?7,
                     emotion_score = ?8, stress_keywords = ?9, summary = ?10, atmosphere = ?11, chat_history = ?12
                 WHERE id = ?1",
                params![
                    id,
                    record.user_id,
                    record.date,
                    record.record_type.as_str(),
                    record.content,
                    record.emotion.map(Emotion::label),
                    record.emotion_emoji,
                    record.emotion_score.map(|score| i64::from(score.min(100))),
                    stress_keywords,
                    record.summary,
                    record.atmosphere,
                    chat_history,
                ],
            )
            .context("Failed to update record")?;

        if updated == 0 {
            bail!("Record not found: {id}");
        }

        Ok(())
    }
}

impl RecordStore for Database {
    fn find_by_user_and_date_range(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Record>> {
        let from = start
            .and_hms_opt(0, 0, 0)
            .context("Failed to build range start")?;
        let until = end
            .checked_add_days(Days::new(1))
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .context("Failed to build range end")?;

        let sql = format!(
            "SELECT {} FROM records
             WHERE user_id = ?1 AND date >= ?2 AND date < ?3 AND TRIM(content) <> ''
             ORDER BY date ASC, created_at ASC, id ASC",
            queries::RECORD_COLUMNS
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params![user_id, from, until], record_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query records by date range")?;

        Ok(rows)
    }

    fn save(&self, record: Record) -> Result<Record> {
        match record.id {
            Some(id) => {
                self.update_record(id, &record)?;
                Ok(record)
            }
            None => {
                let id = self.insert_record(&record)?;
                Ok(Record {
                    id: Some(id),
                    ..record
                })
            }
        }
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let record_type: String = row.get(3)?;
    let emotion: Option<String> = row.get(5)?;
    let emotion_score: Option<i64> = row.get(7)?;
    let stress_keywords: String = row.get(8)?;
    let chat_history: String = row.get(11)?;
    let created_at: i64 = row.get(12)?;

    Ok(Record {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        date: row.get(2)?,
        record_type: RecordType::parse(&record_type).unwrap_or(RecordType::Text),
        content: row.get(4)?,
        emotion: emotion.as_deref().and_then(Emotion::parse),
        emotion_emoji: row.get(6)?,
        emotion_score: emotion_score.map(|score| score.clamp(0, 100) as u8),
        stress_keywords: serde_json::from_str(&stress_keywords).unwrap_or_default(),
        summary: row.get(9)?,
        atmosphere: row.get(10)?,
        chat_history: serde_json::from_str(&chat_history).unwrap_or_default(),
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: i64 = row.get(2)?;

    Ok(User {
        id: row.get(0)?,
        nickname: row.get(1)?,
        created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
    })
}

fn chat_message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role: String = row.get(3)?;
    let timestamp: i64 = row.get(6)?;

    Ok(ChatMessage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        role: ChatRole::parse(&role).unwrap_or(ChatRole::User),
        content: row.get(4)?,
        atmosphere: row.get(5)?,
        timestamp: DateTime::from_timestamp_millis(timestamp).unwrap_or_default(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Database, RecordStore};
    use crate::models::{ChatRole, Emotion, Record, RecordType};
    use chrono::{DateTime, NaiveDate, Utc};
    use tempfile::TempDir;

    pub(crate) fn temp_database() -> (TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("journal.db")).expect("open db");
        (dir, database)
    }

    pub(crate) fn record_at(user_id: i64, stamp: &str, content: &str) -> Record {
        Record {
            id: None,
            user_id,
            date: chrono::NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
                .expect("timestamp"),
            record_type: RecordType::Text,
            content: content.to_string(),
            emotion: Some(Emotion::Neutral),
            emotion_emoji: Some("😐".to_string()),
            emotion_score: Some(50),
            stress_keywords: Vec::new(),
            summary: None,
            atmosphere: None,
            chat_history: Vec::new(),
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("created_at"),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn range_query_covers_whole_days_and_skips_blank_content() {
        let (_dir, database) = temp_database();

        for (stamp, content) in [
            ("2024-10-31 23:59:59", "before the window"),
            ("2024-11-01 00:00:00", "first minute"),
            ("2024-11-30 23:59:59", "last second"),
            ("2024-11-15 12:00:00", "   "),
            ("2024-12-01 00:00:00", "after the window"),
        ] {
            database.save(record_at(1, stamp, content)).expect("save");
        }
        database
            .save(record_at(2, "2024-11-10 09:00:00", "someone else"))
            .expect("save");

        let records = database
            .find_by_user_and_date_range(1, day(2024, 11, 1), day(2024, 11, 30))
            .expect("query");

        let contents = records
            .iter()
            .map(|record| record.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["first minute", "last second"]);
    }

    #[test]
    fn save_assigns_id_then_updates_in_place() {
        let (_dir, database) = temp_database();

        let mut saved = database
            .save(record_at(1, "2024-11-01 08:00:00", "draft"))
            .expect("insert");
        let id = saved.id.expect("id assigned");

        saved.content = "final".to_string();
        saved.emotion = Some(Emotion::Happy);
        saved.emotion_score = Some(88);
        saved.stress_keywords = vec!["exam".to_string()];
        database.save(saved).expect("update");

        let loaded = database.find_by_id(id).expect("query").expect("exists");
        assert_eq!(loaded.content, "final");
        assert_eq!(loaded.emotion, Some(Emotion::Happy));
        assert_eq!(loaded.emotion_score, Some(88));
        assert_eq!(loaded.stress_keywords, vec!["exam".to_string()]);
        assert_eq!(database.count_records().expect("count"), 1);
    }

    #[test]
    fn updating_a_missing_record_fails() {
        let (_dir, database) = temp_database();
        let mut record = record_at(1, "2024-11-01 08:00:00", "ghost");
        record.id = Some(999);

        assert!(database.save(record).is_err());
    }

    #[test]
    fn users_are_looked_up_or_created_by_nickname() {
        let (_dir, database) = temp_database();

        let first = database.find_or_create_user(" mina ").expect("create");
        let again = database.find_or_create_user("mina").expect("lookup");
        assert_eq!(first.id, again.id);
        assert_eq!(database.count_users().expect("count"), 1);

        database.save(record_at(first.id, "2024-11-01 08:00:00", "entry")).expect("save");
        let (top, total) = database
            .user_with_most_records()
            .expect("query")
            .expect("someone has records");
        assert_eq!(top.nickname, "mina");
        assert_eq!(total, 1);
    }

    #[test]
    fn chat_sessions_come_back_in_order() {
        let (_dir, database) = temp_database();
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("timestamp");

        database
            .insert_chat_message(1, "s1", ChatRole::User, "hello", Some("calm"), base)
            .expect("insert");
        database
            .insert_chat_message(
                1,
                "s1",
                ChatRole::Assistant,
                "hi there",
                None,
                base + chrono::Duration::seconds(1),
            )
            .expect("insert");
        database
            .insert_chat_message(2, "s1", ChatRole::User, "not mine", None, base)
            .expect("insert");

        let turns = database.chat_session_for_user(1, "s1").expect("query");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[1].content, "hi there");

        let recent = database.recent_chat_messages(1, 10).expect("query");
        assert_eq!(recent[0].content, "hi there");
    }
}
