//! Client for the Scrapyd JSON API (the crawl daemon this backend administers).

pub mod client;
pub mod types;

pub use client::ScrapydClient;
pub use types::{DaemonStatus, JobEntry, JobList, LogKind, ScheduledJob};
