pub mod render;
pub mod sender;
pub mod smtp;

use anyhow::Result;
use chrono::Local;
use log::{info, warn};

use crate::auth::credentials::imap_credentials;
use crate::config::Config;
use crate::domain::{MessageRecord, MessageRowId};
use crate::store::repo::MessageStore;

pub use render::render_html;
pub use sender::{CommandSender, DigestSender};
pub use smtp::{SmtpSender, smtp_server_for};

/// The configured send command if there is one, otherwise SMTP with the
/// mailbox credentials.
pub fn sender_from_config(cfg: &Config) -> Result<Box<dyn DigestSender>> {
    if !cfg.digest.send_command.is_empty() {
        return Ok(Box::new(CommandSender::from_config(&cfg.digest)?));
    }
    let creds = imap_credentials(cfg)?;
    Ok(Box::new(SmtpSender::from_config(&cfg.digest, creds)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestSelection {
    /// Processed messages labelled urgent.
    #[default]
    Urgent,
    /// The most recently sent processed messages, any urgency.
    RecentProcessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    /// Nothing matched the selection; nothing was sent.
    Empty,
    Sent { count: usize },
}

pub fn select(
    store: &dyn MessageStore,
    selection: DigestSelection,
    limit: usize,
) -> Result<Vec<MessageRecord>> {
    let mut records = match selection {
        DigestSelection::Urgent => store.list_urgent_processed()?,
        DigestSelection::RecentProcessed => store.list_recent_processed(limit)?,
    };
    records.truncate(limit);
    Ok(records)
}

/// Select, render and hand off a digest, then note which messages went out.
pub fn send_digest(
    store: &dyn MessageStore,
    sender: &dyn DigestSender,
    selection: DigestSelection,
    limit: usize,
) -> Result<DigestOutcome> {
    let records = select(store, selection, limit)?;
    if records.is_empty() {
        info!("no messages to include in a digest");
        return Ok(DigestOutcome::Empty);
    }

    let body = render_html(&records, Local::now());
    sender.send(&body)?;

    let ids: Vec<MessageRowId> = records.iter().map(|r| r.id).collect();
    if let Err(e) = store.mark_summary_sent(&ids) {
        warn!("digest sent but bookkeeping failed: {e}");
    }
    info!("digest sent with {} messages", records.len());
    Ok(DigestOutcome::Sent {
        count: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Classification, MessageFilter, NewMessage, Urgency};
    use crate::store::SqliteStore;
    use std::cell::RefCell;

    const STALE: &str = "2000-01-01T00:00:00.000Z";

    #[derive(Default)]
    struct Outbox {
        sent: RefCell<Vec<String>>,
        fail: bool,
    }

    impl DigestSender for Outbox {
        fn send(&self, body: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("mail server said no");
            }
            self.sent.borrow_mut().push(body.to_string());
            Ok(())
        }
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = [
            ("<a@x>", 1, Category::Task, Urgency::Urgent),
            ("<b@x>", 2, Category::Notification, Urgency::Normal),
            ("<c@x>", 3, Category::Notification, Urgency::Urgent),
        ];
        for (id, minute, category, urgency) in rows {
            store
                .add(&NewMessage {
                    message_id: id.into(),
                    subject: format!("subject {id}"),
                    date_sent: format!("Thu, 15 Oct 2026 07:{minute:02}:00 +0000"),
                    ..Default::default()
                })
                .unwrap();
            store
                .update_classification(id, Classification::new(category, urgency))
                .unwrap();
        }
        store
            .conn()
            .execute("UPDATE emails SET updated_at = ?1", [STALE])
            .unwrap();
        store
    }

    /// Message ids whose `updated_at` moved away from the seeded value.
    fn touched(store: &SqliteStore) -> Vec<String> {
        let mut ids: Vec<String> = store
            .list(MessageFilter::default(), None)
            .unwrap()
            .into_iter()
            .filter(|r| r.updated_at != STALE)
            .map(|r| r.message_id)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn urgent_digest_includes_only_urgent_messages() {
        let store = seeded();
        let outbox = Outbox::default();
        assert!(touched(&store).is_empty());

        let outcome = send_digest(&store, &outbox, DigestSelection::Urgent, 20).unwrap();
        assert_eq!(outcome, DigestOutcome::Sent { count: 2 });

        let sent = outbox.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("subject &lt;a@x&gt;"));
        assert!(sent[0].contains("subject &lt;c@x&gt;"));
        assert!(!sent[0].contains("subject &lt;b@x&gt;"));
        assert!(sent[0].contains("<h3>Tasks (1)</h3>"));
        assert!(sent[0].contains("<h3>Notifications (1)</h3>"));
        assert_eq!(touched(&store), vec!["<a@x>", "<c@x>"]);
    }

    #[test]
    fn limit_caps_selection() {
        let store = seeded();
        let urgent = select(&store, DigestSelection::Urgent, 1).unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].message_id, "<c@x>");

        let recent = select(&store, DigestSelection::RecentProcessed, 2).unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(ids, vec!["<c@x>", "<b@x>"]);
    }

    #[test]
    fn nothing_selected_sends_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outbox = Outbox::default();
        let outcome = send_digest(&store, &outbox, DigestSelection::Urgent, 20).unwrap();
        assert_eq!(outcome, DigestOutcome::Empty);
        assert!(outbox.sent.borrow().is_empty());
    }

    #[test]
    fn send_failure_propagates() {
        let store = seeded();
        let outbox = Outbox {
            fail: true,
            ..Default::default()
        };
        assert!(send_digest(&store, &outbox, DigestSelection::Urgent, 20).is_err());
        assert!(touched(&store).is_empty());
    }

    #[test]
    fn send_command_takes_precedence_over_smtp() {
        let mut cfg = Config::default();
        cfg.digest.send_command = vec!["true".into()];
        assert!(sender_from_config(&cfg).is_ok());
    }
}
