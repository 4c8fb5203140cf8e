use log::{info, warn};

use crate::domain::AddOutcome;
use crate::mail::{FetchedMessage, normalize};
use crate::store::repo::MessageStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub total: usize,
    pub new: usize,
    pub duplicate: usize,
    pub failed: usize,
}

/// Normalize and store each fetched message. A message that fails to parse
/// or store is counted and skipped.
pub fn ingest(
    store: &dyn MessageStore,
    messages: Vec<FetchedMessage>,
    folder: &str,
) -> SyncSummary {
    let mut summary = SyncSummary {
        total: messages.len(),
        ..Default::default()
    };

    for fetched in messages {
        let uid = fetched.uid.to_string();
        let outcome = normalize(&fetched.raw, &uid, folder)
            .and_then(|m| store.add(&m).map_err(anyhow::Error::from));
        match outcome {
            Ok(AddOutcome::Inserted(id)) => {
                summary.new += 1;
                info!("stored UID {uid} as #{id}");
            }
            Ok(AddOutcome::Duplicate) => summary.duplicate += 1,
            Err(e) => {
                summary.failed += 1;
                warn!("UID {uid}: {e:#}");
            }
        }
    }

    info!(
        "sync done: {} new, {} duplicate, {} failed",
        summary.new, summary.duplicate, summary.failed
    );
    summary
}
