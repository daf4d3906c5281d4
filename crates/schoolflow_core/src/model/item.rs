//! Planner item records: homework, exams and study sessions.
//!
//! # Responsibility
//! - Define the item shapes stored inside the per-identity remote document.
//! - Keep serde field names aligned with the remote document wire format.
//!
//! # Invariants
//! - `id` is unique within its own collection; uniqueness is not enforced here.
//! - Items created through constructors get a fresh UUID v4 id.
//! - `StudySession::duration_minutes` is positive for locally created sessions.
//! - Decoding is lenient where older clients wrote loose values: priority
//!   labels ignore case and fall back to `Medium`, dates may carry a time part.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Client-generated item identifier, unique within one collection.
///
/// Kept as a plain string because remote documents may already hold ids
/// produced by older clients.
pub type ItemId = String;

/// Generates a collision-resistant item id.
pub fn new_item_id() -> ItemId {
    Uuid::new_v4().to_string()
}

/// Homework urgency/importance marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Ordering weight used by priority sorting (higher sorts first).
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Reads a label such as `"high"` or `" LOW "`; anything else is `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(label) => Self::from_label(&label),
            _ => Self::Medium,
        })
    }
}

/// Parses a calendar date from `YYYY-MM-DD`, an ISO datetime starting with
/// one, or `DD.MM.YYYY`.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            let (head, tail) = (raw.get(..10)?, raw.get(10..)?);
            if !tail.starts_with(|ch: char| ch == 'T' || ch == ' ') {
                return None;
            }
            NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
        })
        .or_else(|| NaiveDate::parse_from_str(raw, "%d.%m.%Y").ok())
}

fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date `{raw}`")))
}

/// Validation failures for locally constructed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    /// Subject is blank after trim.
    EmptySubject,
    /// Study session duration must be at least one minute.
    NonPositiveDuration(u32),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySubject => write!(f, "subject cannot be empty"),
            Self::NonPositiveDuration(value) => {
                write!(f, "duration_minutes must be positive, got {value}")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// One homework assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkItem {
    pub id: ItemId,
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "lenient_date")]
    pub due_date: NaiveDate,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
}

impl HomeworkItem {
    /// Creates an open homework item with a generated id.
    pub fn new(
        subject: impl Into<String>,
        description: impl Into<String>,
        due_date: NaiveDate,
        priority: Priority,
    ) -> Result<Self, ItemValidationError> {
        let subject = subject.into();
        validate_subject(&subject)?;
        Ok(Self {
            id: new_item_id(),
            subject,
            description: description.into(),
            due_date,
            priority,
            completed: false,
        })
    }

    /// Returns a copy with `completed` flipped.
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

/// One scheduled exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamItem {
    pub id: ItemId,
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
}

impl ExamItem {
    /// Creates an exam with a generated id. `topic` may be empty.
    pub fn new(
        subject: impl Into<String>,
        topic: impl Into<String>,
        date: NaiveDate,
    ) -> Result<Self, ItemValidationError> {
        let subject = subject.into();
        validate_subject(&subject)?;
        Ok(Self {
            id: new_item_id(),
            subject,
            topic: topic.into(),
            date,
        })
    }
}

/// One planned study block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: ItemId,
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub completed: bool,
}

impl StudySession {
    /// Creates an open study session with a generated id.
    ///
    /// # Errors
    /// - `EmptySubject` when `subject` is blank.
    /// - `NonPositiveDuration` when `duration_minutes == 0`.
    pub fn new(
        subject: impl Into<String>,
        topic: impl Into<String>,
        duration_minutes: u32,
    ) -> Result<Self, ItemValidationError> {
        let subject = subject.into();
        validate_subject(&subject)?;
        if duration_minutes == 0 {
            return Err(ItemValidationError::NonPositiveDuration(duration_minutes));
        }
        Ok(Self {
            id: new_item_id(),
            subject,
            topic: topic.into(),
            duration_minutes,
            completed: false,
        })
    }

    /// Returns a copy with `completed` flipped.
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

fn validate_subject(subject: &str) -> Result<(), ItemValidationError> {
    if subject.trim().is_empty() {
        return Err(ItemValidationError::EmptySubject);
    }
    Ok(())
}
