//! # Flickr Source Bot
//!
//! Adds structured data to files transferred from Flickr, based on the
//! photo metadata the Flickr API still serves for them.

pub mod bot;
pub mod client;
pub mod url;

pub use bot::FlickrBot;
