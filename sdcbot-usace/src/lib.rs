//! Structured-data bot for US Army Corps of Engineers files
//!
//! These files were batch-transferred from the USACE Digital Library
//! with their metadata written into the file description. The bot reads
//! the description's date and source fields back out and turns them
//! into inception and source-of-file statements. No platform API is
//! involved.

pub mod bot;
pub mod dates;

pub use bot::UsaceBot;
