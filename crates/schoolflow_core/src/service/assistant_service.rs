//! Natural-language assistant: structured reply to planner records.
//!
//! # Responsibility
//! - Treat text extraction as an opaque collaborator (`TextExtractor`).
//! - Parse the extractor's JSON reply into a homework/exam/chat action.
//! - Apply actions through the sync store's append mutators.
//!
//! # Invariants
//! - Missing or blank reply fields fall back to fixed defaults; a reply never
//!   fails because of one missing field.
//! - Failed extraction or malformed JSON leaves local collections untouched.

use crate::model::item::{new_item_id, parse_calendar_date, ExamItem, HomeworkItem, Priority};
use crate::sync::sync_store::SyncStore;
use chrono::NaiveDate;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Subject/topic used when the reply omits one.
pub const DEFAULT_SUBJECT: &str = "Allgemein";

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$").expect("valid code fence regex")
});

/// Opaque text-to-structured-data function (e.g. a generative API client).
pub trait TextExtractor {
    /// Returns the raw JSON reply text for `input`, relative to `today`.
    fn extract(&self, input: &str, today: NaiveDate) -> Result<String, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// Input is blank after trim.
    EmptyInput,
    /// Extractor call failed.
    Extractor(String),
    /// Reply is not the expected JSON shape.
    MalformedReply(String),
}

impl Display for AssistantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "assistant input cannot be empty"),
            Self::Extractor(message) => write!(f, "text extraction failed: {message}"),
            Self::MalformedReply(message) => write!(f, "malformed assistant reply: {message}"),
        }
    }
}

impl Error for AssistantError {}

/// What a reply asks the planner to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantAction {
    AddHomework(HomeworkItem),
    AddExam(ExamItem),
    /// Conversation only; nothing to record.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub message: String,
    pub action: AssistantAction,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawData {
    subject: Option<String>,
    description: Option<String>,
    due_date: Option<String>,
    priority: Option<String>,
    topic: Option<String>,
    date: Option<String>,
}

impl AssistantReply {
    /// Parses extractor output; `today` fills missing or invalid dates.
    pub fn parse(text: &str, today: NaiveDate) -> Result<Self, AssistantError> {
        let body = CODE_FENCE_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map_or(text, |inner| inner.as_str());
        let raw: RawReply = serde_json::from_str(body.trim())
            .map_err(|err| AssistantError::MalformedReply(err.to_string()))?;

        let action = match (raw.kind.as_deref(), raw.data) {
            (Some("homework"), Some(data)) => AssistantAction::AddHomework(HomeworkItem {
                id: new_item_id(),
                subject: non_blank(data.subject).unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
                description: data.description.unwrap_or_default(),
                due_date: parse_date(data.due_date.as_deref()).unwrap_or(today),
                priority: parse_priority(data.priority.as_deref()),
                completed: false,
            }),
            (Some("exam"), Some(data)) => AssistantAction::AddExam(ExamItem {
                id: new_item_id(),
                subject: non_blank(data.subject).unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
                topic: non_blank(data.topic).unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
                date: parse_date(data.date.as_deref()).unwrap_or(today),
            }),
            _ => AssistantAction::None,
        };

        Ok(Self {
            message: raw.message.unwrap_or_default(),
            action,
        })
    }
}

/// Runs extraction and records the resulting item in the sync store.
pub struct AssistantService<E: TextExtractor> {
    extractor: E,
}

impl<E: TextExtractor> AssistantService<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }

    /// Handles one user message and returns the reply text to show.
    ///
    /// # Errors
    /// - `EmptyInput` for blank input (the extractor is not called).
    /// - `Extractor` / `MalformedReply` when no usable reply was produced.
    pub fn handle(
        &self,
        store: &mut SyncStore,
        input: &str,
        today: NaiveDate,
    ) -> Result<AssistantReply, AssistantError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AssistantError::EmptyInput);
        }

        let reply = self
            .extractor
            .extract(input, today)
            .map_err(AssistantError::Extractor)
            .and_then(|text| AssistantReply::parse(&text, today))
            .inspect_err(|err| {
                warn!(
                    "event=assistant_reply module=assistant status=error error={}",
                    err
                );
            })?;

        let kind = match &reply.action {
            AssistantAction::AddHomework(item) => {
                store.append_homework(item.clone());
                "homework"
            }
            AssistantAction::AddExam(item) => {
                store.append_exam(item.clone());
                "exam"
            }
            AssistantAction::None => "chat",
        };
        info!(
            "event=assistant_reply module=assistant status=ok kind={}",
            kind
        );
        Ok(reply)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(parse_calendar_date)
}

fn parse_priority(value: Option<&str>) -> Priority {
    value.map_or(Priority::Medium, Priority::from_label)
}

#[cfg(test)]
mod tests {
    use super::{AssistantAction, AssistantError, AssistantReply, DEFAULT_SUBJECT};
    use crate::model::item::Priority;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 15).expect("valid date")
    }

    #[test]
    fn homework_reply_fills_missing_fields() {
        let reply = AssistantReply::parse(
            r#"{"type": "homework", "message": "Alles klar!", "data": {"subject": "", "dueDate": "morgen"}}"#,
            today(),
        )
        .expect("reply should parse");

        assert_eq!(reply.message, "Alles klar!");
        match reply.action {
            AssistantAction::AddHomework(item) => {
                assert_eq!(item.subject, DEFAULT_SUBJECT);
                assert_eq!(item.due_date, today());
                assert_eq!(item.priority, Priority::Medium);
                assert!(!item.completed);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn fenced_exam_reply_is_accepted() {
        let text = "```json\n{\"type\": \"exam\", \"message\": \"Viel Erfolg!\", \"data\": {\"subject\": \"Englisch\", \"date\": \"2024-04-19\"}}\n```";
        let reply = AssistantReply::parse(text, today()).expect("fenced reply should parse");

        match reply.action {
            AssistantAction::AddExam(exam) => {
                assert_eq!(exam.subject, "Englisch");
                assert_eq!(exam.topic, DEFAULT_SUBJECT);
                assert_eq!(exam.date, NaiveDate::from_ymd_opt(2024, 4, 19).expect("date"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn chat_and_dataless_replies_record_nothing() {
        let chat = AssistantReply::parse(r#"{"type": "chat", "message": "Du schaffst das!"}"#, today())
            .expect("chat should parse");
        assert_eq!(chat.action, AssistantAction::None);

        let dataless = AssistantReply::parse(r#"{"type": "homework", "message": "?"}"#, today())
            .expect("dataless reply should parse");
        assert_eq!(dataless.action, AssistantAction::None);
    }

    #[test]
    fn non_json_reply_is_malformed() {
        let err = AssistantReply::parse("sorry, no json", today()).expect_err("must fail");
        assert!(matches!(err, AssistantError::MalformedReply(_)));
    }
}
