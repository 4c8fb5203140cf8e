pub mod auth;
pub mod classify;
pub mod config;
pub mod digest;
pub mod domain;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod store;
pub mod sync;
