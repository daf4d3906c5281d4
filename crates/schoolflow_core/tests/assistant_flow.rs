use chrono::NaiveDate;
use schoolflow_core::{
    AssistantAction, AssistantError, AssistantService, DocKey, Identity, MemoryDocumentStore,
    MemorySessionProvider, Priority, StoreConfig, SyncStore, TextExtractor,
};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

struct CannedExtractor {
    reply: Result<String, String>,
    calls: Rc<Cell<usize>>,
}

impl CannedExtractor {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Rc::new(Cell::new(0)),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl TextExtractor for CannedExtractor {
    fn extract(&self, _input: &str, _today: NaiveDate) -> Result<String, String> {
        self.calls.set(self.calls.get() + 1);
        self.reply.clone()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
}

fn signed_in_store(documents: &MemoryDocumentStore) -> (MemorySessionProvider, SyncStore) {
    let sessions = MemorySessionProvider::new();
    sessions.sign_in(Identity::new("u1"));
    let mut store = SyncStore::start(
        &StoreConfig::default(),
        &sessions,
        Arc::new(documents.clone()),
    )
    .unwrap();
    documents.set_auto_flush(true);
    store.pump();
    (sessions, store)
}

#[test]
fn homework_reply_is_appended_and_persisted() {
    let documents = MemoryDocumentStore::new();
    let (_sessions, mut store) = signed_in_store(&documents);
    let service = AssistantService::new(CannedExtractor::replying(
        r#"{"type": "homework", "message": "Eingetragen!", "data": {"subject": "Mathe", "description": "Aufgabe 3", "dueDate": "2024-04-17", "priority": "High"}}"#,
    ));

    let reply = service
        .handle(&mut store, "Mathe Aufgabe 3 bis Mittwoch, wichtig", today())
        .unwrap();
    store.pump();

    assert_eq!(reply.message, "Eingetragen!");
    assert!(matches!(reply.action, AssistantAction::AddHomework(_)));
    assert_eq!(store.homework().len(), 1);
    let item = &store.homework()[0];
    assert_eq!(item.subject, "Mathe");
    assert_eq!(item.priority, Priority::High);
    assert_eq!(
        item.due_date,
        NaiveDate::from_ymd_opt(2024, 4, 17).unwrap()
    );

    let remote = documents.document(&DocKey::new("users", "u1")).unwrap();
    assert_eq!(remote["homework"].as_array().unwrap().len(), 1);
}

#[test]
fn exam_reply_is_appended_with_defaults() {
    let documents = MemoryDocumentStore::new();
    let (_sessions, mut store) = signed_in_store(&documents);
    let service = AssistantService::new(CannedExtractor::replying(
        r#"{"type": "exam", "message": "Viel Erfolg!", "data": {}}"#,
    ));

    service.handle(&mut store, "Test bald", today()).unwrap();

    assert_eq!(store.exams().len(), 1);
    assert_eq!(store.exams()[0].subject, "Allgemein");
    assert_eq!(store.exams()[0].topic, "Allgemein");
    assert_eq!(store.exams()[0].date, today());
}

#[test]
fn chat_reply_changes_nothing() {
    let documents = MemoryDocumentStore::new();
    let (_sessions, mut store) = signed_in_store(&documents);
    let service = AssistantService::new(CannedExtractor::replying(
        r#"{"type": "chat", "message": "Mach eine Pause."}"#,
    ));
    let writes_before = store.stats().writes_issued;

    let reply = service.handle(&mut store, "Ich bin müde", today()).unwrap();

    assert_eq!(reply.action, AssistantAction::None);
    assert!(store.collections().is_empty());
    assert_eq!(store.stats().writes_issued, writes_before);
}

#[test]
fn failures_leave_collections_untouched() {
    let documents = MemoryDocumentStore::new();
    let (_sessions, mut store) = signed_in_store(&documents);

    let failing = AssistantService::new(CannedExtractor::failing("quota exceeded"));
    let err = failing.handle(&mut store, "Hausaufgabe", today()).unwrap_err();
    assert!(matches!(err, AssistantError::Extractor(_)));

    let garbled = AssistantService::new(CannedExtractor::replying("kein JSON"));
    let err = garbled.handle(&mut store, "Hausaufgabe", today()).unwrap_err();
    assert!(matches!(err, AssistantError::MalformedReply(_)));

    assert!(store.collections().is_empty());
}

#[test]
fn blank_input_never_reaches_extractor() {
    let documents = MemoryDocumentStore::new();
    let (_sessions, mut store) = signed_in_store(&documents);
    let extractor = CannedExtractor::replying(r#"{"type": "chat", "message": ""}"#);
    let calls = Rc::clone(&extractor.calls);
    let service = AssistantService::new(extractor);

    let err = service.handle(&mut store, "   ", today()).unwrap_err();

    assert_eq!(err, AssistantError::EmptyInput);
    assert_eq!(calls.get(), 0);
}
