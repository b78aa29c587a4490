use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Someone resolved from a bearer token. Owned by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub display_name: String,
    pub eligible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Ended,
}

impl RoomStatus {
    pub fn is_active(self) -> bool {
        self == RoomStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum ExamType {
    #[serde(rename = "midsem", alias = "midterm")]
    #[sqlx(rename = "midsem")]
    Midterm,
    #[serde(rename = "endsem", alias = "endterm")]
    #[sqlx(rename = "endsem")]
    Endterm,
}

impl ExamType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "midsem" | "midterm" => Some(ExamType::Midterm),
            "endsem" | "endterm" => Some(ExamType::Endterm),
            _ => None,
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExamType::Midterm => write!(f, "Mid-Sem"),
            ExamType::Endterm => write!(f, "End-Sem"),
        }
    }
}

/// Subject, semester, year and exam type shared by rooms and papers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub subject: String,
    pub semester: u8,
    pub year: i32,
    pub exam_type: ExamType,
}

/// Unvalidated title and classification, as submitted in a form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<String>,
    pub year: Option<String>,
    pub exam_type: Option<String>,
}

impl Draft {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned();
        Draft {
            title: get("title"),
            subject: get("subject"),
            semester: get("semester"),
            year: get("year"),
            exam_type: get("examType"),
        }
    }

    /// Every field is required. Semesters run 1 through 8.
    pub fn validate(&self) -> CoreResult<(String, Classification)> {
        fn required<'a>(value: &'a Option<String>, name: &str) -> CoreResult<&'a str> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CoreError::validation(format!("{name} is required")))
        }

        let title = required(&self.title, "title")?;
        let subject = required(&self.subject, "subject")?;

        let semester = required(&self.semester, "semester")?
            .parse::<u8>()
            .ok()
            .filter(|s| (1..=8).contains(s))
            .ok_or_else(|| CoreError::validation("semester must be between 1 and 8"))?;

        let year = required(&self.year, "year")?
            .parse::<i32>()
            .ok()
            .filter(|y| (1900..=9999).contains(y))
            .ok_or_else(|| CoreError::validation("year is not a valid year"))?;

        let exam_type = ExamType::parse(required(&self.exam_type, "examType")?)
            .ok_or_else(|| CoreError::validation("examType must be midsem or endsem"))?;

        Ok((
            title.to_owned(),
            Classification {
                subject: subject.to_owned(),
                semester,
                year,
                exam_type,
            },
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub title: String,
    #[serde(flatten)]
    pub classification: Classification,
    pub created_by: Uuid,
    pub created_by_name: String,
    pub status: RoomStatus,
    pub document_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
}

/// A room as shown in the directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    #[serde(flatten)]
    pub room: Room,
    pub message_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub id: Uuid,
    pub name: String,
}

/// Text and image are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    Image(String),
}

impl MessageBody {
    pub fn is_image(&self) -> bool {
        matches!(self, MessageBody::Image(_))
    }

    pub fn content(&self) -> &str {
        match self {
            MessageBody::Text(text) => text,
            MessageBody::Image(url) => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    /// `None` for system-authored content.
    pub sender: Option<MessageSender>,
    #[serde(flatten)]
    pub body: MessageBody,
    pub seq: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: Uuid,
    pub room_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: Uuid,
    pub title: String,
    #[serde(flatten)]
    pub classification: Classification,
    pub file_url: String,
    pub uploaded_by: Uuid,
    pub uploaded_by_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Current time truncated to microseconds so values survive a store round trip.
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
