//! Integration tests for the live result set engine.

use liveset::{
    try_key_fn, ChangeRecord, ChangeSource, Error, KeyError, KeyFn, LiveEvent, LiveQuery,
    ObserverConfig, Result, Snapshot, SnapshotSender, SourceError, SourceHandle, SourceMessage,
    SubscriptionIdentity,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Doc = Arc<Value>;

fn doc(id: &str, rest: Value) -> Doc {
    let mut body = json!({ "id": id });
    body.as_object_mut()
        .unwrap()
        .extend(rest.as_object().cloned().unwrap_or_default());
    Arc::new(body)
}

fn doc_key() -> KeyFn<Doc, String> {
    try_key_fn(|doc: &Doc| {
        doc["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| KeyError::new("document has no string id"))
    })
}

struct Attachment {
    sender: SnapshotSender<Doc>,
    detached: Arc<AtomicBool>,
}

/// Change source driven by the test body.
#[derive(Default)]
struct FakeStore {
    attachments: Arc<Mutex<Vec<Attachment>>>,
}

struct FakeHandle {
    detached: Arc<AtomicBool>,
}

impl SourceHandle for FakeHandle {
    fn detach(&mut self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

impl ChangeSource<String, Doc> for &FakeStore {
    fn attach(&self, query: &Arc<String>, inbox: SnapshotSender<Doc>) -> Result<Box<dyn SourceHandle>> {
        if query.is_empty() {
            return Err(Error::Source(SourceError::InvalidQuery {
                message: "empty collection name".to_string(),
            }));
        }
        let detached = Arc::new(AtomicBool::new(false));
        self.attachments.lock().push(Attachment {
            sender: inbox,
            detached: Arc::clone(&detached),
        });
        Ok(Box::new(FakeHandle { detached }))
    }
}

impl FakeStore {
    fn deliver(&self, attachment: usize, changes: Vec<ChangeRecord<Doc>>) -> bool {
        self.attachments.lock()[attachment]
            .sender
            .send(SourceMessage::Snapshot(Snapshot::of_changes(changes)))
            .is_ok()
    }

    fn fail(&self, attachment: usize, error: SourceError) {
        let _ = self.attachments.lock()[attachment]
            .sender
            .send(SourceMessage::Error(error));
    }

    fn detached(&self, attachment: usize) -> bool {
        self.attachments.lock()[attachment]
            .detached
            .load(Ordering::SeqCst)
    }
}

/// Test store with tracing wired to the test writer.
fn store() -> FakeStore {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    FakeStore::default()
}

fn users_identity() -> SubscriptionIdentity<String, Doc, String> {
    SubscriptionIdentity::new(Arc::new("users".to_string()), doc_key())
}

// --- End-to-End Scenarios ---

#[test]
fn test_live_collection_lifecycle() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();
    let observer = query.observe(ObserverConfig::default());

    // Snapshot 1: two documents arrive.
    let t1 = doc("a", json!({ "name": "Ada" }));
    let t2 = doc("b", json!({ "name": "Brendan" }));
    store.deliver(
        0,
        vec![
            ChangeRecord::added(Arc::clone(&t1), 0),
            ChangeRecord::added(Arc::clone(&t2), 1),
        ],
    );
    query.pump().unwrap();

    let first = query.current().unwrap();
    assert_eq!(first.len(), 2);
    assert!(Arc::ptr_eq(&first[0], &t1));
    assert!(Arc::ptr_eq(&first[1], &t2));

    // Snapshot 2: "b" modified. "a" keeps its identity and position.
    let t2_prime = doc("b", json!({ "name": "Brendan", "admin": true }));
    store.deliver(0, vec![ChangeRecord::modified(Arc::clone(&t2_prime), 1)]);
    query.pump().unwrap();

    let second = query.current().unwrap();
    assert_eq!(second.len(), 2);
    assert!(Arc::ptr_eq(&second[0], &t1));
    assert!(Arc::ptr_eq(&second[1], &t2_prime));

    // Snapshot 3: "a" removed.
    store.deliver(0, vec![ChangeRecord::removed(t1, 0)]);
    query.pump().unwrap();

    let third = query.current().unwrap();
    assert_eq!(third.len(), 1);
    assert!(Arc::ptr_eq(&third[0], &t2_prime));

    // Observer saw each published sequence, in order.
    for expected_len in [2, 2, 1] {
        match observer.try_recv().unwrap() {
            LiveEvent::Results(sequence) => assert_eq!(sequence.len(), expected_len),
            other => panic!("expected Results, got {:?}", other),
        }
    }
}

#[test]
fn test_noop_snapshots_republish_nothing() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();
    let observer = query.observe(ObserverConfig::default());

    store.deliver(0, vec![ChangeRecord::added(doc("a", json!({})), 0)]);
    query.pump().unwrap();
    let published = query.current().unwrap();
    let _ = observer.try_recv().unwrap();

    store.deliver(0, vec![]);
    store.deliver(0, vec![]);
    assert_eq!(query.pump().unwrap(), 2);

    // Same allocation, no new events: safe to feed straight into a
    // memoizing renderer.
    assert!(Arc::ptr_eq(&published, &query.current().unwrap()));
    assert!(observer.try_recv().is_err());
}

#[test]
fn test_out_of_order_and_duplicate_events() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();

    // Duplicate adds and a modify-before-add, indices deliberately wild.
    store.deliver(
        0,
        vec![
            ChangeRecord::modified(doc("x", json!({ "v": 1 })), 9),
            ChangeRecord::added(doc("y", json!({ "v": 1 })), 0),
            ChangeRecord::added(doc("x", json!({ "v": 2 })), 5),
        ],
    );
    query.pump().unwrap();

    let current = query.current().unwrap();
    // "x" first appeared first, so it stays first; later record won.
    assert_eq!(current.len(), 2);
    assert_eq!(current[0]["id"], "x");
    assert_eq!(current[0]["v"], 2);
    assert_eq!(current[1]["id"], "y");
}

#[test]
fn test_resubscribe_discards_old_results() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();

    store.deliver(0, vec![ChangeRecord::added(doc("a", json!({})), 0)]);
    query.pump().unwrap();
    assert_eq!(query.current().unwrap().len(), 1);

    // Different descriptor: old attachment detached, cache discarded.
    query
        .subscribe(SubscriptionIdentity::new(
            Arc::new("orders".to_string()),
            doc_key(),
        ))
        .unwrap();
    assert!(store.detached(0));
    assert!(query.current().is_none());

    // A late event from the old attachment cannot be delivered.
    assert!(!store.deliver(0, vec![ChangeRecord::added(doc("stale", json!({})), 0)]));

    // The new subscription starts from empty.
    store.deliver(1, vec![ChangeRecord::added(doc("o1", json!({})), 0)]);
    query.pump().unwrap();
    let current = query.current().unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["id"], "o1");
}

#[test]
fn test_source_error_reaches_every_observer_verbatim() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();
    let first = query.observe(ObserverConfig::default());
    let second = query.observe(ObserverConfig::default());

    let failure = SourceError::Unavailable {
        message: "backend restarting".to_string(),
    };
    store.fail(0, failure.clone());

    let err = query.pump().unwrap_err();
    assert!(matches!(err, Error::Source(ref e) if *e == failure));
    assert!(!query.is_subscribed());
    assert!(store.detached(0));

    for observer in [&first, &second] {
        match observer.try_recv().unwrap() {
            LiveEvent::SourceError(e) => assert_eq!(e, failure),
            other => panic!("expected SourceError, got {:?}", other),
        }
    }
}

#[test]
fn test_invalid_query_fails_attach() {
    let store = store();
    let mut query = LiveQuery::new(&store);

    let err = query
        .subscribe(SubscriptionIdentity::new(
            Arc::new(String::new()),
            doc_key(),
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Source(SourceError::InvalidQuery { .. })
    ));
    assert!(!query.is_subscribed());
}

#[test]
fn test_unkeyable_document_rejects_cycle_and_tears_down() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();

    store.deliver(0, vec![ChangeRecord::added(doc("a", json!({})), 0)]);
    query.pump().unwrap();
    let before = query.current().unwrap();
    assert_eq!(before.len(), 1);

    // Batch with a valid record followed by one without an id.
    store.deliver(
        0,
        vec![
            ChangeRecord::added(doc("b", json!({})), 1),
            ChangeRecord::added(Arc::new(json!({ "no_id": true })), 2),
        ],
    );
    let err = query.pump().unwrap_err();
    assert!(matches!(err, Error::KeyExtraction { index: 1, .. }));
    assert!(!query.is_subscribed());
    assert!(store.detached(0));
}

#[test]
fn test_observer_joining_late_gets_current_results() {
    let store = store();
    let mut query = LiveQuery::new(&store);
    query.subscribe(users_identity()).unwrap();

    store.deliver(0, vec![ChangeRecord::added(doc("a", json!({})), 0)]);
    query.pump().unwrap();

    let observer = query.observe(ObserverConfig::default());
    match observer.try_recv().unwrap() {
        LiveEvent::Results(sequence) => {
            assert!(Arc::ptr_eq(&sequence, &query.current().unwrap()))
        }
        other => panic!("expected Results, got {:?}", other),
    }
}
