//! # DocSage Store
//!
//! Single-file SQLite persistence for every cross-turn entity: users and
//! their ordered document lists, document sets and chunk descriptors, Q&A
//! logs, session markers, active document pointers, the language catalog,
//! localized replies, FAQ entries, and per-user dialog state.
//!
//! All timestamps are RFC 3339 UTC strings, which sort lexicographically in
//! chronological order.

pub mod records;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use docsage_core::error::{DocSageError, Result};
pub use records::*;

pub struct Store {
    conn: Mutex<Connection>,
}

fn store_err(e: impl std::fmt::Display) -> DocSageError {
    DocSageError::Store(e.to_string())
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

fn now_ts() -> String {
    Utc::now().to_rfc3339()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Store {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT DEFAULT '',
                mobile TEXT UNIQUE NOT NULL,
                email TEXT DEFAULT '',
                language_id TEXT,
                status TEXT DEFAULT 'Enabled',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS document_sets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner_user_id TEXT NOT NULL,
                status TEXT DEFAULT 'Saved',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_documents (
                user_id TEXT NOT NULL,
                document_set_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (user_id, document_set_id)
            );

            CREATE TABLE IF NOT EXISTS document_chunks (
                id TEXT PRIMARY KEY,
                document_set_id TEXT NOT NULL,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS qna_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                document_set_id TEXT NOT NULL,
                question TEXT NOT NULL,
                answer TEXT,
                oracle_response TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS greetings (
                user_id TEXT PRIMARY KEY,
                message TEXT DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS helpful_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                reply TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS document_pointers (
                user_id TEXT NOT NULL,
                document_set_id TEXT NOT NULL,
                status TEXT DEFAULT 'Failure',
                last_reply TEXT DEFAULT '',
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, document_set_id)
            );

            CREATE TABLE IF NOT EXISTS languages (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                status TEXT DEFAULT 'enabled'
            );

            CREATE TABLE IF NOT EXISTS localized_replies (
                id TEXT PRIMARY KEY,
                language_id TEXT NOT NULL,
                canonical TEXT NOT NULL,
                text TEXT DEFAULT '',
                bot_name TEXT DEFAULT '',
                button_label TEXT DEFAULT '',
                status TEXT DEFAULT 'enabled',
                UNIQUE (language_id, canonical)
            );

            CREATE TABLE IF NOT EXISTS faq_entries (
                id TEXT PRIMARY KEY,
                document_set_id TEXT NOT NULL,
                language_id TEXT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                status TEXT DEFAULT 'Active'
            );

            CREATE TABLE IF NOT EXISTS dialog_states (
                user_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(store_err)?;
        Ok(())
    }

    // ---- users ----

    /// Create a user, or return the existing one with the same email.
    pub fn create_user(&self, name: &str, mobile: &str, email: &str) -> Result<User> {
        if !email.is_empty() {
            if let Some(existing) = self.user_by_email(email)? {
                return Ok(existing);
            }
        }
        let conn = self.conn.lock().map_err(store_err)?;
        let id = new_id();
        let now = now_ts();
        conn.execute(
            "INSERT INTO users (id, name, mobile, email, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'Enabled', ?5, ?5)",
            params![id, name, mobile, email, now],
        )
        .map_err(store_err)?;
        drop(conn);
        self.user_by_id(&id)?
            .ok_or_else(|| DocSageError::UnknownUser(id))
    }

    fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            mobile: row.get(2)?,
            email: row.get(3)?,
            language_id: row.get(4)?,
            status: UserStatus::parse(&row.get::<_, String>(5)?),
            created_at: parse_ts(&row.get::<_, String>(6)?),
            updated_at: parse_ts(&row.get::<_, String>(7)?),
        })
    }

    const USER_COLS: &'static str =
        "id, name, mobile, email, language_id, status, created_at, updated_at";

    pub fn user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", Self::USER_COLS),
            params![id],
            Self::map_user,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn user_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE mobile = ?1", Self::USER_COLS),
            params![mobile],
            Self::map_user,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", Self::USER_COLS),
            params![email],
            Self::map_user,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn set_user_language(&self, user_id: &str, language_id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "UPDATE users SET language_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![user_id, language_id, now_ts()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    // ---- document sets & chunks ----

    pub fn create_document_set(&self, name: &str, owner_user_id: &str) -> Result<DocumentSet> {
        let conn = self.conn.lock().map_err(store_err)?;
        let id = new_id();
        let now = now_ts();
        conn.execute(
            "INSERT INTO document_sets (id, name, owner_user_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'Saved', ?4, ?4)",
            params![id, name, owner_user_id, now],
        )
        .map_err(store_err)?;
        drop(conn);
        self.document_set(&id)?
            .ok_or_else(|| DocSageError::NotFound(format!("document set {id}")))
    }

    fn map_document_set(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentSet> {
        Ok(DocumentSet {
            id: row.get(0)?,
            name: row.get(1)?,
            owner_user_id: row.get(2)?,
            status: DocumentSetStatus::parse(&row.get::<_, String>(3)?),
            created_at: parse_ts(&row.get::<_, String>(4)?),
            updated_at: parse_ts(&row.get::<_, String>(5)?),
        })
    }

    const DOCSET_COLS: &'static str = "id, name, owner_user_id, status, created_at, updated_at";

    pub fn document_set(&self, id: &str) -> Result<Option<DocumentSet>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            &format!("SELECT {} FROM document_sets WHERE id = ?1", Self::DOCSET_COLS),
            params![id],
            Self::map_document_set,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn document_set_by_name(&self, name: &str) -> Result<Option<DocumentSet>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            &format!("SELECT {} FROM document_sets WHERE name = ?1", Self::DOCSET_COLS),
            params![name],
            Self::map_document_set,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn set_document_set_status(&self, id: &str, status: DocumentSetStatus) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "UPDATE document_sets SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now_ts()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Persist chunk descriptors for a document set, replacing any previous
    /// descriptors (re-ingestion path).
    pub fn replace_chunks(&self, document_set_id: &str, chunk_ids: &[String]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(store_err)?;
        let tx = conn.transaction().map_err(store_err)?;
        tx.execute(
            "DELETE FROM document_chunks WHERE document_set_id = ?1",
            params![document_set_id],
        )
        .map_err(store_err)?;
        for (position, id) in chunk_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO document_chunks (id, document_set_id, position) VALUES (?1, ?2, ?3)",
                params![id, document_set_id, position as i64],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn chunks_for(&self, document_set_id: &str) -> Result<Vec<ChunkDescriptor>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, document_set_id, position FROM document_chunks
                 WHERE document_set_id = ?1 ORDER BY position",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![document_set_id], |row| {
                Ok(ChunkDescriptor {
                    id: row.get(0)?,
                    document_set_id: row.get(1)?,
                    position: row.get(2)?,
                })
            })
            .map_err(store_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---- ownership ----

    /// Append a document set to the end of the user's ordered list.
    pub fn append_user_document(&self, user_id: &str, document_set_id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        let next: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM user_documents WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO user_documents (user_id, document_set_id, position)
             VALUES (?1, ?2, ?3)",
            params![user_id, document_set_id, next],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn user_owns(&self, user_id: &str, document_set_id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(store_err)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM user_documents WHERE user_id = ?1 AND document_set_id = ?2",
                params![user_id, document_set_id],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        Ok(count > 0)
    }

    /// The user's document sets, in list order.
    pub fn user_documents(&self, user_id: &str) -> Result<Vec<DocumentSet>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT d.id, d.name, d.owner_user_id, d.status, d.created_at, d.updated_at
                 FROM document_sets d
                 JOIN user_documents u ON u.document_set_id = d.id
                 WHERE u.user_id = ?1 ORDER BY u.position",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![user_id], Self::map_document_set)
            .map_err(store_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---- Q&A logs ----

    /// Persist the question before any oracle call.
    pub fn insert_qna(&self, user_id: &str, document_set_id: &str, question: &str) -> Result<String> {
        let conn = self.conn.lock().map_err(store_err)?;
        let id = new_id();
        conn.execute(
            "INSERT INTO qna_logs (id, user_id, document_set_id, question, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, document_set_id, question, now_ts()],
        )
        .map_err(store_err)?;
        Ok(id)
    }

    /// Attach the raw oracle response and extracted answer to an existing row.
    pub fn attach_answer(
        &self,
        qna_id: &str,
        oracle_response: &serde_json::Value,
        answer: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "UPDATE qna_logs SET oracle_response = ?2, answer = ?3 WHERE id = ?1",
            params![qna_id, oracle_response.to_string(), answer],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn qna_log(&self, id: &str) -> Result<Option<QnaLog>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT id, user_id, document_set_id, question, answer, oracle_response, created_at
             FROM qna_logs WHERE id = ?1",
            params![id],
            |row| {
                Ok(QnaLog {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    document_set_id: row.get(2)?,
                    question: row.get(3)?,
                    answer: row.get(4)?,
                    oracle_response: row
                        .get::<_, Option<String>>(5)?
                        .and_then(|s| serde_json::from_str(&s).ok()),
                    created_at: parse_ts(&row.get::<_, String>(6)?),
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    /// All Q&A rows for one user, oldest first.
    pub fn qna_logs_for_user(&self, user_id: &str) -> Result<Vec<QnaLog>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, document_set_id, question, answer, oracle_response, created_at
                 FROM qna_logs WHERE user_id = ?1 ORDER BY created_at",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(QnaLog {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    document_set_id: row.get(2)?,
                    question: row.get(3)?,
                    answer: row.get(4)?,
                    oracle_response: row
                        .get::<_, Option<String>>(5)?
                        .and_then(|s| serde_json::from_str(&s).ok()),
                    created_at: parse_ts(&row.get::<_, String>(6)?),
                })
            })
            .map_err(store_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // ---- session markers ----

    /// Upsert the greeting marker (one per user, timestamp advancing).
    pub fn record_greeting(&self, user_id: &str, message: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO greetings (user_id, message, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET message = ?2, created_at = ?3",
            params![user_id, message, now_ts()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Append a feedback marker (the conversation-ended event).
    pub fn record_feedback(&self, user_id: &str, reply: FeedbackReply) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO helpful_logs (id, user_id, reply, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), user_id, reply.as_str(), now_ts()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn session_markers(&self, user_id: &str) -> Result<SessionMarkers> {
        let conn = self.conn.lock().map_err(store_err)?;
        let greeted_at: Option<String> = conn
            .query_row(
                "SELECT created_at FROM greetings WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)?;
        let ended_at: Option<String> = conn
            .query_row(
                "SELECT created_at FROM helpful_logs WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT 1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(SessionMarkers {
            greeted_at: greeted_at.as_deref().map(parse_ts),
            ended_at: ended_at.as_deref().map(parse_ts),
        })
    }

    // ---- active document pointers ----

    /// Upsert the pointer for (user, document set); only the status, reply
    /// text, and timestamp change on repeat calls.
    pub fn upsert_pointer(
        &self,
        user_id: &str,
        document_set_id: &str,
        status: PointerStatus,
        last_reply: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO document_pointers (user_id, document_set_id, status, last_reply, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, document_set_id)
             DO UPDATE SET status = ?3, last_reply = ?4, updated_at = ?5",
            params![user_id, document_set_id, status.as_str(), last_reply, now_ts()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn map_pointer(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentPointer> {
        Ok(DocumentPointer {
            user_id: row.get(0)?,
            document_set_id: row.get(1)?,
            status: PointerStatus::parse(&row.get::<_, String>(2)?),
            last_reply: row.get(3)?,
            updated_at: parse_ts(&row.get::<_, String>(4)?),
        })
    }

    /// The most recently active successful pointer for a user.
    pub fn latest_active_pointer(&self, user_id: &str) -> Result<Option<DocumentPointer>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT user_id, document_set_id, status, last_reply, updated_at
             FROM document_pointers
             WHERE user_id = ?1 AND status = 'Success'
             ORDER BY updated_at DESC LIMIT 1",
            params![user_id],
            Self::map_pointer,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn pointer(&self, user_id: &str, document_set_id: &str) -> Result<Option<DocumentPointer>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT user_id, document_set_id, status, last_reply, updated_at
             FROM document_pointers WHERE user_id = ?1 AND document_set_id = ?2",
            params![user_id, document_set_id],
            Self::map_pointer,
        )
        .optional()
        .map_err(store_err)
    }

    pub fn pointer_count(&self, user_id: &str, document_set_id: &str) -> Result<i64> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT COUNT(*) FROM document_pointers WHERE user_id = ?1 AND document_set_id = ?2",
            params![user_id, document_set_id],
            |r| r.get(0),
        )
        .map_err(store_err)
    }

    // ---- languages ----

    pub fn add_language(&self, name: &str) -> Result<Language> {
        let conn = self.conn.lock().map_err(store_err)?;
        let id = new_id();
        conn.execute(
            "INSERT INTO languages (id, name, status) VALUES (?1, ?2, 'enabled')",
            params![id, name],
        )
        .map_err(store_err)?;
        Ok(Language { id, name: name.to_string(), status: LanguageStatus::Enabled })
    }

    pub fn enabled_languages(&self) -> Result<Vec<Language>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare("SELECT id, name, status FROM languages WHERE status = 'enabled' ORDER BY name")
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Language {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: LanguageStatus::parse(&row.get::<_, String>(2)?),
                })
            })
            .map_err(store_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn language(&self, id: &str) -> Result<Option<Language>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT id, name, status FROM languages WHERE id = ?1",
            params![id],
            |row| {
                Ok(Language {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: LanguageStatus::parse(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    pub fn language_by_name(&self, name: &str) -> Result<Option<Language>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT id, name, status FROM languages WHERE name = ?1",
            params![name],
            |row| {
                Ok(Language {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: LanguageStatus::parse(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    // ---- localized replies ----

    pub fn add_localized_reply(
        &self,
        language_id: &str,
        canonical: &str,
        text: &str,
        bot_name: &str,
        button_label: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO localized_replies (id, language_id, canonical, text, bot_name, button_label, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'enabled')
             ON CONFLICT(language_id, canonical)
             DO UPDATE SET text = ?4, bot_name = ?5, button_label = ?6",
            params![new_id(), language_id, canonical, text, bot_name, button_label],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn map_localized(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocalizedReply> {
        Ok(LocalizedReply {
            id: row.get(0)?,
            language_id: row.get(1)?,
            canonical: row.get(2)?,
            text: row.get(3)?,
            bot_name: row.get(4)?,
            button_label: row.get(5)?,
            status: LanguageStatus::parse(&row.get::<_, String>(6)?),
        })
    }

    /// Exact canonical-text lookup for one language.
    pub fn localized_reply(
        &self,
        language_id: &str,
        canonical: &str,
    ) -> Result<Option<LocalizedReply>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT id, language_id, canonical, text, bot_name, button_label, status
             FROM localized_replies
             WHERE language_id = ?1 AND canonical = ?2 AND status = 'enabled'",
            params![language_id, canonical],
            Self::map_localized,
        )
        .optional()
        .map_err(store_err)
    }

    /// Reverse lookup: the canonical phrase whose localized text matches.
    pub fn canonical_for_text(&self, localized_text: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT canonical FROM localized_replies
             WHERE text = ?1 AND status = 'enabled' LIMIT 1",
            params![localized_text],
            |r| r.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    // ---- FAQ entries ----

    pub fn add_faq(
        &self,
        document_set_id: &str,
        language_id: Option<&str>,
        question: &str,
        answer: &str,
    ) -> Result<String> {
        let conn = self.conn.lock().map_err(store_err)?;
        let id = new_id();
        conn.execute(
            "INSERT INTO faq_entries (id, document_set_id, language_id, question, answer, status)
             VALUES (?1, ?2, ?3, ?4, ?5, 'Active')",
            params![id, document_set_id, language_id, question, answer],
        )
        .map_err(store_err)?;
        Ok(id)
    }

    /// Active FAQ entries for a document set in the given language, falling
    /// back to the base-language entries when the language has none.
    pub fn active_faqs(
        &self,
        document_set_id: &str,
        language_id: Option<&str>,
    ) -> Result<Vec<FaqEntry>> {
        let localized = self.faqs_where(document_set_id, language_id)?;
        if !localized.is_empty() || language_id.is_none() {
            return Ok(localized);
        }
        self.faqs_where(document_set_id, None)
    }

    fn faqs_where(
        &self,
        document_set_id: &str,
        language_id: Option<&str>,
    ) -> Result<Vec<FaqEntry>> {
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, document_set_id, language_id, question, answer, status
                 FROM faq_entries
                 WHERE document_set_id = ?1 AND status = 'Active'
                   AND ((?2 IS NULL AND language_id IS NULL) OR language_id = ?2)
                 ORDER BY rowid",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![document_set_id, language_id], |row| {
                Ok(FaqEntry {
                    id: row.get(0)?,
                    document_set_id: row.get(1)?,
                    language_id: row.get(2)?,
                    question: row.get(3)?,
                    answer: row.get(4)?,
                    status: FaqStatus::parse(&row.get::<_, String>(5)?),
                })
            })
            .map_err(store_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn faq(&self, id: &str) -> Result<Option<FaqEntry>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            "SELECT id, document_set_id, language_id, question, answer, status
             FROM faq_entries WHERE id = ?1",
            params![id],
            |row| {
                Ok(FaqEntry {
                    id: row.get(0)?,
                    document_set_id: row.get(1)?,
                    language_id: row.get(2)?,
                    question: row.get(3)?,
                    answer: row.get(4)?,
                    status: FaqStatus::parse(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()
        .map_err(store_err)
    }

    // ---- dialog state ----

    pub fn dialog_state(&self, user_id: &str) -> Result<DialogState> {
        let conn = self.conn.lock().map_err(store_err)?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM dialog_states WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)?;
        Ok(state.as_deref().map(DialogState::parse).unwrap_or_default())
    }

    pub fn set_dialog_state(&self, user_id: &str, state: DialogState) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO dialog_states (user_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET state = ?2, updated_at = ?3",
            params![user_id, state.as_str(), now_ts()],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user() -> (Store, User) {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("Asha", "15550001111", "asha@example.com").unwrap();
        (store, user)
    }

    #[test]
    fn test_create_user_is_idempotent_by_email() {
        let (store, user) = store_with_user();
        let again = store.create_user("Asha", "15550001111", "asha@example.com").unwrap();
        assert_eq!(user.id, again.id);
    }

    #[test]
    fn test_user_lookup_by_mobile() {
        let (store, user) = store_with_user();
        let found = store.user_by_mobile("15550001111").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.status, UserStatus::Enabled);
        assert!(store.user_by_mobile("19990000000").unwrap().is_none());
    }

    #[test]
    fn test_document_set_lifecycle() {
        let (store, user) = store_with_user();
        let set = store.create_document_set("AutoPolicy", &user.id).unwrap();
        assert_eq!(set.status, DocumentSetStatus::Saved);

        let ids = vec!["c1".to_string(), "c2".to_string()];
        store.replace_chunks(&set.id, &ids).unwrap();
        assert_eq!(store.chunks_for(&set.id).unwrap().len(), 2);

        store.set_document_set_status(&set.id, DocumentSetStatus::Indexed).unwrap();
        store.append_user_document(&user.id, &set.id).unwrap();
        assert!(store.user_owns(&user.id, &set.id).unwrap());
        assert_eq!(store.user_documents(&user.id).unwrap()[0].name, "AutoPolicy");
        assert_eq!(
            store.document_set(&set.id).unwrap().unwrap().status,
            DocumentSetStatus::Indexed
        );
    }

    #[test]
    fn test_user_document_order_is_append_only() {
        let (store, user) = store_with_user();
        let a = store.create_document_set("A", &user.id).unwrap();
        let b = store.create_document_set("B", &user.id).unwrap();
        store.append_user_document(&user.id, &a.id).unwrap();
        store.append_user_document(&user.id, &b.id).unwrap();
        let docs = store.user_documents(&user.id).unwrap();
        assert_eq!(docs.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_qna_log_attach_answer() {
        let (store, user) = store_with_user();
        let set = store.create_document_set("AutoPolicy", &user.id).unwrap();
        let qna_id = store.insert_qna(&user.id, &set.id, "What is my deductible?").unwrap();

        let row = store.qna_log(&qna_id).unwrap().unwrap();
        assert_eq!(row.question, "What is my deductible?");
        assert!(row.answer.is_none());

        let raw = serde_json::json!({"choices": [{"message": {"content": "$500"}}]});
        store.attach_answer(&qna_id, &raw, "$500").unwrap();
        let row = store.qna_log(&qna_id).unwrap().unwrap();
        assert_eq!(row.answer.as_deref(), Some("$500"));
        assert_eq!(row.oracle_response.unwrap(), raw);
    }

    #[test]
    fn test_pointer_upsert_is_idempotent() {
        let (store, user) = store_with_user();
        let set = store.create_document_set("AutoPolicy", &user.id).unwrap();

        store.upsert_pointer(&user.id, &set.id, PointerStatus::Success, "chose").unwrap();
        let first = store.pointer(&user.id, &set.id).unwrap().unwrap();

        store.upsert_pointer(&user.id, &set.id, PointerStatus::Success, "again").unwrap();
        store.upsert_pointer(&user.id, &set.id, PointerStatus::Success, "again").unwrap();

        assert_eq!(store.pointer_count(&user.id, &set.id).unwrap(), 1);
        let last = store.pointer(&user.id, &set.id).unwrap().unwrap();
        assert!(last.updated_at >= first.updated_at);
        assert_eq!(last.last_reply, "again");
    }

    #[test]
    fn test_latest_active_pointer_prefers_most_recent_success() {
        let (store, user) = store_with_user();
        let a = store.create_document_set("A", &user.id).unwrap();
        let b = store.create_document_set("B", &user.id).unwrap();
        let c = store.create_document_set("C", &user.id).unwrap();

        store.upsert_pointer(&user.id, &a.id, PointerStatus::Success, "").unwrap();
        store.upsert_pointer(&user.id, &b.id, PointerStatus::Success, "").unwrap();
        store.upsert_pointer(&user.id, &c.id, PointerStatus::Failure, "invalid").unwrap();

        let active = store.latest_active_pointer(&user.id).unwrap().unwrap();
        assert_eq!(active.document_set_id, b.id);
    }

    #[test]
    fn test_session_markers() {
        let (store, user) = store_with_user();
        assert_eq!(store.session_markers(&user.id).unwrap(), SessionMarkers::default());

        store.record_greeting(&user.id, "Hi").unwrap();
        let m = store.session_markers(&user.id).unwrap();
        assert!(m.greeted_at.is_some());
        assert!(m.ended_at.is_none());

        store.record_feedback(&user.id, FeedbackReply::No).unwrap();
        let m = store.session_markers(&user.id).unwrap();
        assert!(m.ended_at.is_some());
    }

    #[test]
    fn test_localized_reply_lookup_and_fallback() {
        let (store, _user) = store_with_user();
        let hindi = store.add_language("Hindi").unwrap();
        store
            .add_localized_reply(&hindi.id, "Choose Document", "दस्तावेज़ चुनें", "डॉकसेज", "चुनें")
            .unwrap();

        let hit = store.localized_reply(&hindi.id, "Choose Document").unwrap().unwrap();
        assert_eq!(hit.text, "दस्तावेज़ चुनें");
        assert!(store.localized_reply(&hindi.id, "Unknown Phrase").unwrap().is_none());

        // Idempotence: same (phrase, language) pair, same text.
        let again = store.localized_reply(&hindi.id, "Choose Document").unwrap().unwrap();
        assert_eq!(hit.text, again.text);

        assert_eq!(
            store.canonical_for_text("दस्तावेज़ चुनें").unwrap().as_deref(),
            Some("Choose Document")
        );
        assert!(store.canonical_for_text("no such text").unwrap().is_none());
    }

    #[test]
    fn test_faq_language_fallback() {
        let (store, user) = store_with_user();
        let set = store.create_document_set("AutoPolicy", &user.id).unwrap();
        let hindi = store.add_language("Hindi").unwrap();

        store.add_faq(&set.id, None, "What is covered?", "Collision and theft.").unwrap();
        let base = store.active_faqs(&set.id, Some(&hindi.id)).unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].question, "What is covered?");

        store.add_faq(&set.id, Some(&hindi.id), "क्या कवर है?", "टक्कर और चोरी।").unwrap();
        let localized = store.active_faqs(&set.id, Some(&hindi.id)).unwrap();
        assert_eq!(localized.len(), 1);
        assert_eq!(localized[0].question, "क्या कवर है?");
    }

    #[test]
    fn test_dialog_state_roundtrip() {
        let (store, user) = store_with_user();
        assert_eq!(store.dialog_state(&user.id).unwrap(), DialogState::Idle);
        store.set_dialog_state(&user.id, DialogState::AwaitingFollowUp).unwrap();
        assert_eq!(store.dialog_state(&user.id).unwrap(), DialogState::AwaitingFollowUp);
        store.set_dialog_state(&user.id, DialogState::Idle).unwrap();
        assert_eq!(store.dialog_state(&user.id).unwrap(), DialogState::Idle);
    }
}
