use log::{info, warn};

use crate::classify::Classify;
use crate::domain::MessageRecord;
use crate::error::BatchError;
use crate::store::repo::MessageStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Classify up to `limit` unprocessed messages, newest first.
///
/// Only an unreachable backend or a failing initial read aborts the batch;
/// a failure on one message is counted and the batch moves on.
pub fn run_batch(
    store: &dyn MessageStore,
    classifier: &dyn Classify,
    limit: usize,
) -> Result<BatchSummary, BatchError> {
    let pending = store.list_unprocessed(limit)?;
    if pending.is_empty() {
        info!("no unprocessed messages");
        return Ok(BatchSummary::default());
    }

    if !classifier.test_connection() {
        return Err(BatchError::BackendUnreachable);
    }

    let mut summary = BatchSummary {
        total: pending.len(),
        ..Default::default()
    };

    for (i, record) in pending.iter().enumerate() {
        info!(
            "[{}/{}] classifying {}",
            i + 1,
            summary.total,
            record.message_id
        );
        match classify_one(store, classifier, record) {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                summary.failed += 1;
                warn!("{}: {e:#}", record.message_id);
            }
        }
    }

    info!(
        "batch done: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(summary)
}

fn classify_one(
    store: &dyn MessageStore,
    classifier: &dyn Classify,
    record: &MessageRecord,
) -> anyhow::Result<()> {
    let body = classification_text(record);
    let labels = classifier.classify(&record.subject, &body)?;
    if !store.update_classification(&record.message_id, labels)? {
        anyhow::bail!("message vanished before it could be updated");
    }
    info!("  -> {}/{}", labels.category, labels.urgency);
    Ok(())
}

/// Plain body if there is one, otherwise the HTML body rendered to text.
fn classification_text(record: &MessageRecord) -> String {
    if let Some(plain) = record.body_plain.as_deref()
        && !plain.trim().is_empty()
    {
        return plain.to_string();
    }
    match record.body_html.as_deref() {
        Some(html) => html2text::from_read(html.as_bytes(), 120).unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Classification, MessageFilter, NewMessage, Urgency};
    use crate::store::SqliteStore;
    use std::cell::RefCell;

    struct FakeClassifier {
        reachable: bool,
        fail_on_subject: Option<&'static str>,
        seen: RefCell<Vec<(String, String)>>,
    }

    impl FakeClassifier {
        fn new() -> Self {
            Self {
                reachable: true,
                fail_on_subject: None,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Classify for FakeClassifier {
        fn classify(&self, subject: &str, body: &str) -> anyhow::Result<Classification> {
            self.seen
                .borrow_mut()
                .push((subject.to_string(), body.to_string()));
            if self.fail_on_subject == Some(subject) {
                anyhow::bail!("model crashed");
            }
            Ok(Classification::new(Category::Task, Urgency::Urgent))
        }

        fn test_connection(&self) -> bool {
            self.reachable
        }
    }

    fn seed(store: &SqliteStore, n: u32) {
        for i in 1..=n {
            store
                .add(&NewMessage {
                    message_id: format!("<m{i}@x>"),
                    subject: format!("m{i}"),
                    date_sent: format!("Tue, 13 Oct 2026 10:{i:02}:00 +0000"),
                    body_plain: Some(format!("body {i}")),
                    ..Default::default()
                })
                .unwrap();
        }
    }

    #[test]
    fn one_failing_item_does_not_stop_the_batch() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed(&store, 5);
        let classifier = FakeClassifier {
            fail_on_subject: Some("m3"),
            ..FakeClassifier::new()
        };

        let summary = run_batch(&store, &classifier, 50).unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                total: 5,
                succeeded: 4,
                failed: 1
            }
        );

        let processed: Vec<_> = store
            .list(MessageFilter::default(), None)
            .unwrap()
            .into_iter()
            .filter(|r| r.processed)
            .map(|r| r.subject)
            .collect();
        assert_eq!(processed, vec!["m5", "m4", "m2", "m1"]);
        assert_eq!(store.list_unprocessed(10).unwrap()[0].subject, "m3");
    }

    #[test]
    fn items_are_classified_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed(&store, 3);
        let classifier = FakeClassifier::new();

        run_batch(&store, &classifier, 2).unwrap();
        let order: Vec<_> = classifier
            .seen
            .borrow()
            .iter()
            .map(|(s, _)| s.clone())
            .collect();
        assert_eq!(order, vec!["m3", "m2"]);
    }

    #[test]
    fn unreachable_backend_aborts_before_any_item() {
        let store = SqliteStore::open_in_memory().unwrap();
        seed(&store, 2);
        let classifier = FakeClassifier {
            reachable: false,
            ..FakeClassifier::new()
        };

        let err = run_batch(&store, &classifier, 10).unwrap_err();
        assert!(matches!(err, BatchError::BackendUnreachable));
        assert!(classifier.seen.borrow().is_empty());
        assert_eq!(store.list_unprocessed(10).unwrap().len(), 2);
    }

    #[test]
    fn empty_store_succeeds_without_probing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let classifier = FakeClassifier {
            reachable: false,
            ..FakeClassifier::new()
        };
        assert_eq!(
            run_batch(&store, &classifier, 10).unwrap(),
            BatchSummary::default()
        );
    }

    #[test]
    fn html_only_message_is_classified_from_rendered_text() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .add(&NewMessage {
                message_id: "<html@x>".into(),
                subject: "html".into(),
                body_html: Some("<p>Please <b>sign</b> the form</p>".into()),
                ..Default::default()
            })
            .unwrap();
        let classifier = FakeClassifier::new();

        run_batch(&store, &classifier, 10).unwrap();
        let seen = classifier.seen.borrow();
        assert!(seen[0].1.contains("sign"));
        assert!(!seen[0].1.contains("<p>"));
    }
}
