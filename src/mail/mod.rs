pub mod imap_client;
pub mod normalize;

pub use imap_client::{FetchedMessage, ImapClient, imap_server_for};
pub use normalize::normalize;
