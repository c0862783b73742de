//! Threadlens core library — embedded analytics over a scraped-post dataset.
//!
//! The main entry point is [`engine::AnalyticsEngine`], which answers typed
//! filter/sort/pagination queries and statistical aggregations over a
//! [`store::PostStore`].

pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod query;
pub mod recovery;
pub mod store;
pub mod types;
