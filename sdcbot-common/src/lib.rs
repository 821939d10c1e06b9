//! # SDC Bot Common Library
//!
//! Shared code for the structured-data bots including:
//! - Wikimedia Commons and Wikidata API clients
//! - Wikibase statement model and construction rules
//! - Wikitext template extraction
//! - Skip-mark cache
//! - The record-processing pipeline
//! - Configuration loading

pub mod builder;
pub mod cache;
pub mod commons;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod statement;
pub mod testing;
pub mod wikidata;
pub mod wikitext;

pub use error::{Error, FetchError, RecordError, Result};
