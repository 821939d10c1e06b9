//! Structured-data bot for Portable Antiquities Scheme images
//!
//! Adds the database image identifier to files whose description links
//! them to exactly one PAS image, after verifying that the linked
//! download is byte-identical to the hosted file.

pub mod bot;
pub mod client;

pub use bot::PasBot;
