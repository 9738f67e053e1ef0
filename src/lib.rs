pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod mail;
pub mod store;
