pub mod message;

pub use message::{
    AddOutcome, AttachmentRecord, Category, Classification, MessageFilter, MessageRecord,
    MessageRowId, NewAttachment, NewMessage, StoreStats, Urgency, sent_epoch,
};
