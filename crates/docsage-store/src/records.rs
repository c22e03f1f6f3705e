//! Record structs mirroring the store tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User lifecycle status. Users are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Enabled,
    Disabled,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Enabled => "Enabled",
            UserStatus::Disabled => "Disabled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Disabled" => UserStatus::Disabled,
            _ => UserStatus::Enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub language_id: Option<String>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document set lifecycle: Saved on creation, Indexed once every chunk
/// vector has been upserted. A set stuck in Saved is a detectable
/// partial-ingestion artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentSetStatus {
    Saved,
    Indexed,
}

impl DocumentSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSetStatus::Saved => "Saved",
            DocumentSetStatus::Indexed => "Indexed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Indexed" => DocumentSetStatus::Indexed,
            _ => DocumentSetStatus::Saved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSet {
    pub id: String,
    pub name: String,
    pub owner_user_id: String,
    pub status: DocumentSetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Chunk descriptor persisted before any vector write. The passage text
/// itself lives only in the index payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub id: String,
    pub document_set_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QnaLog {
    pub id: String,
    pub user_id: String,
    pub document_set_id: String,
    pub question: String,
    pub answer: Option<String>,
    pub oracle_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Active Document Pointer status: Success when the selection passed the
/// ownership check, Failure otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerStatus {
    Success,
    Failure,
}

impl PointerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerStatus::Success => "Success",
            PointerStatus::Failure => "Failure",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Success" => PointerStatus::Success,
            _ => PointerStatus::Failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPointer {
    pub user_id: String,
    pub document_set_id: String,
    pub status: PointerStatus,
    pub last_reply: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageStatus {
    Enabled,
    Disabled,
}

impl LanguageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageStatus::Enabled => "enabled",
            LanguageStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "disabled" => LanguageStatus::Disabled,
            _ => LanguageStatus::Enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub status: LanguageStatus,
}

/// Structured localized content per (language, canonical English phrase).
/// Explicit fields replace the original's language-suffixed attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedReply {
    pub id: String,
    pub language_id: String,
    /// Canonical English phrase this entry localizes.
    pub canonical: String,
    /// Localized body text.
    pub text: String,
    /// Localized header/bot name.
    pub bot_name: String,
    /// Localized button label.
    pub button_label: String,
    pub status: LanguageStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaqStatus {
    Active,
    Inactive,
}

impl FaqStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaqStatus::Active => "Active",
            FaqStatus::Inactive => "Inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Inactive" => FaqStatus::Inactive,
            _ => FaqStatus::Active,
        }
    }
}

/// Precomputed question/answer bound to one document set; `language_id`
/// None marks the base-language entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub document_set_id: String,
    pub language_id: Option<String>,
    pub question: String,
    pub answer: String,
    pub status: FaqStatus,
}

/// Feedback to the helpfulness prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackReply {
    Yes,
    No,
}

impl FeedbackReply {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackReply::Yes => "Yes",
            FeedbackReply::No => "No",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Yes" => FeedbackReply::Yes,
            _ => FeedbackReply::No,
        }
    }
}

/// The two Session Markers used by the freshness predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionMarkers {
    pub greeted_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Explicit per-user dialog state, stored instead of being re-derived
/// from timestamps every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DialogState {
    #[default]
    Idle,
    AwaitingLanguage,
    AwaitingDocumentChoice,
    AnsweringQuestions,
    AwaitingFollowUp,
    AwaitingFeedback,
}

impl DialogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogState::Idle => "Idle",
            DialogState::AwaitingLanguage => "AwaitingLanguage",
            DialogState::AwaitingDocumentChoice => "AwaitingDocumentChoice",
            DialogState::AnsweringQuestions => "AnsweringQuestions",
            DialogState::AwaitingFollowUp => "AwaitingFollowUp",
            DialogState::AwaitingFeedback => "AwaitingFeedback",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "AwaitingLanguage" => DialogState::AwaitingLanguage,
            "AwaitingDocumentChoice" => DialogState::AwaitingDocumentChoice,
            "AnsweringQuestions" => DialogState::AnsweringQuestions,
            "AwaitingFollowUp" => DialogState::AwaitingFollowUp,
            "AwaitingFeedback" => DialogState::AwaitingFeedback,
            _ => DialogState::Idle,
        }
    }
}
