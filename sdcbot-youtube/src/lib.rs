//! Structured-data bot for files transferred from YouTube
//!
//! Adds the video identifier, creator attribution, publication data and
//! the transfer source to license-reviewed video files, and completes
//! the qualifiers of an already-present license statement.

pub mod bot;
pub mod client;

pub use bot::YouTubeBot;
