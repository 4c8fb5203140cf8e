use std::cell::RefCell;

use anyhow::Result;
use email_helper::classify::Classify;
use email_helper::digest::{DigestOutcome, DigestSelection, DigestSender, send_digest};
use email_helper::domain::{Category, Classification, MessageFilter, Urgency};
use email_helper::mail::FetchedMessage;
use email_helper::pipeline::run_batch;
use email_helper::store::{MessageStore, SqliteStore};
use email_helper::sync::ingest;

struct KeywordClassifier;

impl Classify for KeywordClassifier {
    fn classify(&self, subject: &str, _body: &str) -> Result<Classification> {
        let category = if subject.contains("review") {
            Category::Task
        } else {
            Category::Notification
        };
        let urgency = if subject.contains("ASAP") {
            Urgency::Urgent
        } else {
            Urgency::Normal
        };
        Ok(Classification::new(category, urgency))
    }

    fn test_connection(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct Outbox(RefCell<Vec<String>>);

impl DigestSender for Outbox {
    fn send(&self, body: &str) -> Result<()> {
        self.0.borrow_mut().push(body.to_string());
        Ok(())
    }
}

fn mail(uid: u32, message_id: &str, subject: &str, minute: u32) -> FetchedMessage {
    let raw = format!(
        "Message-ID: {message_id}\r\n\
         From: sender@example.com\r\n\
         Subject: {subject}\r\n\
         Date: Fri, 16 Oct 2026 09:{minute:02}:00 +0000\r\n\
         \r\n\
         {subject} body\r\n"
    );
    FetchedMessage {
        uid,
        raw: raw.into_bytes(),
    }
}

#[test]
fn sync_classify_and_digest_against_a_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("nested").join("emails.db");
    let store = SqliteStore::open(&db).unwrap();

    let fetched = vec![
        mail(1, "<1@x>", "please review ASAP", 1),
        mail(2, "<2@x>", "weekly newsletter", 2),
        mail(3, "<3@x>", "outage ASAP", 3),
    ];
    let synced = ingest(&store, fetched, "INBOX");
    assert_eq!(synced.new, 3);

    let batch = run_batch(&store, &KeywordClassifier, 50).unwrap();
    assert_eq!(batch.succeeded, 3);
    assert!(store.list_unprocessed(10).unwrap().is_empty());

    let tasks = store
        .list(
            MessageFilter {
                category: Some(Category::Task),
                urgency: None,
            },
            None,
        )
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].message_id, "<1@x>");

    let outbox = Outbox::default();
    let outcome = send_digest(&store, &outbox, DigestSelection::Urgent, 20).unwrap();
    assert_eq!(outcome, DigestOutcome::Sent { count: 2 });
    let sent = outbox.0.borrow();
    assert!(sent[0].contains("outage ASAP"));
    assert!(!sent[0].contains("weekly newsletter"));

    // A re-sync of the same mail is a no-op and keeps the labels.
    drop(store);
    let store = SqliteStore::open(&db).unwrap();
    let again = ingest(&store, vec![mail(1, "<1@x>", "please review ASAP", 1)], "INBOX");
    assert_eq!(again.duplicate, 1);
    let stats = store.stats().unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.by_urgency.get("urgent"), Some(&2));
}
