pub mod credentials;

pub use credentials::{ImapCredentials, imap_credentials, load_secret, save_secret};
