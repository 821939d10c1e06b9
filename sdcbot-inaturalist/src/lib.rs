//! Structured-data bot for files transferred from iNaturalist
//!
//! Adds photo and observation identifiers, creator attribution, the
//! transfer source and a taxon-derived depicts statement to reviewed
//! iNaturalist uploads.

pub mod bot;
pub mod client;

pub use bot::INaturalistBot;
