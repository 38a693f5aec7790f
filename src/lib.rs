pub mod cache;
pub mod chat;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod query;
pub mod search;
pub mod server;
pub mod service;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{ChatragError, Result};
pub use service::RagService;
