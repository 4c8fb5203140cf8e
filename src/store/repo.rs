use crate::domain::{
    AddOutcome, AttachmentRecord, Classification, MessageFilter, MessageRecord, MessageRowId,
    NewMessage, StoreStats,
};
use crate::error::StorageError;

pub type StoreResult<T> = Result<T, StorageError>;

/// Every ordered read returns newest `date_sent` first.
pub trait MessageStore {
    fn exists(&self, message_id: &str) -> StoreResult<bool>;

    /// Insert a message and its attachments atomically. A known `message_id`
    /// is left untouched and reported as `AddOutcome::Duplicate`.
    fn add(&self, message: &NewMessage) -> StoreResult<AddOutcome>;

    /// Set the labels and mark processed. `Ok(false)` means no such message.
    fn update_classification(
        &self,
        message_id: &str,
        classification: Classification,
    ) -> StoreResult<bool>;

    fn list_unprocessed(&self, limit: usize) -> StoreResult<Vec<MessageRecord>>;
    fn list_urgent_processed(&self) -> StoreResult<Vec<MessageRecord>>;
    fn list_recent_processed(&self, limit: usize) -> StoreResult<Vec<MessageRecord>>;
    fn list(&self, filter: MessageFilter, limit: Option<usize>) -> StoreResult<Vec<MessageRecord>>;

    fn attachments(&self, id: MessageRowId) -> StoreResult<Vec<AttachmentRecord>>;
    fn stats(&self) -> StoreResult<StoreStats>;

    /// Touch `updated_at` on messages included in a sent digest.
    fn mark_summary_sent(&self, ids: &[MessageRowId]) -> StoreResult<()>;
}
