//! Remote document shapes and the local collection mirror.
//!
//! # Responsibility
//! - Name the three top-level document fields and the per-identity key.
//! - Build field-scoped merge patches from collection changes.
//! - Decode snapshots into `LocalCollections` with per-field defaulting.
//!
//! # Invariants
//! - A patch only ever carries top-level fields; merge overwrites a named
//!   field wholesale and leaves unnamed fields untouched.
//! - A missing or non-list field decodes to an empty sequence without
//!   affecting the other two fields.
//! - Items are decoded one by one. An entry that cannot be decoded is kept
//!   verbatim and appended to every later write of its field, so a local
//!   edit never erases remote data this client cannot read.

use crate::model::item::{ExamItem, HomeworkItem, StudySession};
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Remote document field name for homework.
pub const FIELD_HOMEWORK: &str = "homework";
/// Remote document field name for exams.
pub const FIELD_EXAMS: &str = "exams";
/// Remote document field name for study sessions.
pub const FIELD_SESSIONS: &str = "sessions";

/// JSON object body of a remote document.
pub type DocumentData = Map<String, Value>;

/// One of the three collections mirrored from the remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionField {
    Homework,
    Exams,
    Sessions,
}

impl CollectionField {
    pub const ALL: [CollectionField; 3] = [Self::Homework, Self::Exams, Self::Sessions];

    /// Top-level field name inside the remote document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Homework => FIELD_HOMEWORK,
            Self::Exams => FIELD_EXAMS,
            Self::Sessions => FIELD_SESSIONS,
        }
    }
}

impl Display for CollectionField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one remote document: `<collection>/<uid>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocKey {
    pub collection: String,
    pub doc_id: String,
}

impl DocKey {
    pub fn new(collection: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            doc_id: doc_id.into(),
        }
    }
}

impl Display for DocKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.doc_id)
    }
}

/// Point-in-time view of one remote document pushed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub exists: bool,
    pub data: Option<DocumentData>,
}

impl DocumentSnapshot {
    pub fn missing() -> Self {
        Self {
            exists: false,
            data: None,
        }
    }

    pub fn present(data: DocumentData) -> Self {
        Self {
            exists: true,
            data: Some(data),
        }
    }
}

/// Full replacement of exactly one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange {
    Homework(Vec<HomeworkItem>),
    Exams(Vec<ExamItem>),
    Sessions(Vec<StudySession>),
}

impl CollectionChange {
    pub fn field(&self) -> CollectionField {
        match self {
            Self::Homework(_) => CollectionField::Homework,
            Self::Exams(_) => CollectionField::Exams,
            Self::Sessions(_) => CollectionField::Sessions,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Homework(items) => items.len(),
            Self::Exams(items) => items.len(),
            Self::Sessions(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Top-level fields of a merge write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    fields: DocumentData,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-with-merge payload used when a document does not exist yet.
    pub fn empty_defaults() -> Self {
        let mut patch = Self::new();
        for field in CollectionField::ALL {
            patch.set(field.as_str(), Value::Array(Vec::new()));
        }
        patch
    }

    /// Builds a patch that sets only the changed collection.
    pub fn for_change(change: &CollectionChange) -> serde_json::Result<Self> {
        let value = match change {
            CollectionChange::Homework(items) => serde_json::to_value(items)?,
            CollectionChange::Exams(items) => serde_json::to_value(items)?,
            CollectionChange::Sessions(items) => serde_json::to_value(items)?,
        };
        let mut patch = Self::new();
        patch.set(change.field().as_str(), value);
        Ok(patch)
    }

    /// Sets one top-level field, replacing any previous value in this patch.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sorted top-level field names carried by this patch.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merges this patch into `target`, overwriting each named field wholesale.
    pub fn merge_into(&self, target: &mut DocumentData) {
        for (field, value) in &self.fields {
            target.insert(field.clone(), value.clone());
        }
    }

    pub fn into_data(self) -> DocumentData {
        self.fields
    }
}

/// In-memory mirror of the remote document's three fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCollections {
    pub homework: Vec<HomeworkItem>,
    pub exams: Vec<ExamItem>,
    pub sessions: Vec<StudySession>,
    unreadable: BTreeMap<CollectionField, Vec<Value>>,
}

impl LocalCollections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes document data item by item, defaulting each missing or
    /// non-list field to empty.
    pub fn from_document(data: &DocumentData) -> Self {
        let mut unreadable = BTreeMap::new();
        let homework = decode_field(data, CollectionField::Homework, &mut unreadable);
        let exams = decode_field(data, CollectionField::Exams, &mut unreadable);
        let sessions = decode_field(data, CollectionField::Sessions, &mut unreadable);
        Self {
            homework,
            exams,
            sessions,
            unreadable,
        }
    }

    /// Raw remote entries of `field` that did not decode into items.
    pub fn unreadable(&self, field: CollectionField) -> &[Value] {
        self.unreadable.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Patch for `change` that also carries this field's unreadable entries.
    pub fn patch_for(&self, change: &CollectionChange) -> serde_json::Result<DocumentPatch> {
        let mut patch = DocumentPatch::for_change(change)?;
        let kept = self.unreadable(change.field());
        if let Some(Value::Array(items)) = patch.fields.get_mut(change.field().as_str()) {
            items.extend(kept.iter().cloned());
        }
        Ok(patch)
    }

    /// Replaces exactly the collection named by `change`.
    pub fn replace(&mut self, change: CollectionChange) {
        match change {
            CollectionChange::Homework(items) => self.homework = items,
            CollectionChange::Exams(items) => self.exams = items,
            CollectionChange::Sessions(items) => self.sessions = items,
        }
    }

    pub fn clear(&mut self) {
        self.homework.clear();
        self.exams.clear();
        self.sessions.clear();
        self.unreadable.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.homework.is_empty() && self.exams.is_empty() && self.sessions.is_empty()
    }
}

fn decode_field<T: DeserializeOwned>(
    data: &DocumentData,
    field: CollectionField,
    unreadable: &mut BTreeMap<CollectionField, Vec<Value>>,
) -> Vec<T> {
    let entries = match data.get(field.as_str()) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            warn!(
                "event=snapshot_decode module=sync status=defaulted field={} reason=not_a_list",
                field
            );
            return Vec::new();
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match serde_json::from_value::<T>(entry.clone()) {
            Ok(item) => items.push(item),
            Err(err) => {
                // Category only; the message can quote item text.
                warn!(
                    "event=snapshot_decode module=sync status=kept_raw field={} index={} error_kind={:?}",
                    field,
                    index,
                    err.classify()
                );
                unreadable.entry(field).or_default().push(entry.clone());
            }
        }
    }
    items
}
