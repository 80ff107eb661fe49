//! wmscout - topic-scoped web content aggregator.
//!
//! Polls a curated list of feed endpoints for webMethods-ecosystem
//! content, filters by keyword relevance, deduplicates into a content
//! store, and serves an admin API over the results.

pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod scrapers;
pub mod server;
