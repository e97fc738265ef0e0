pub mod archive;
pub mod attachments;
pub mod config;
pub mod dedupe;
pub mod delete;
pub mod discord;
pub mod error;
pub mod model;
pub mod rate_limit;
pub mod runner;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ArchiveError, Result};
