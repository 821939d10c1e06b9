//! Flickr URL classification
//!
//! The review template records the URL a file was transferred from. Only
//! single-photo URLs identify a photo the API can be asked about; album,
//! gallery and profile URLs do not.

use regex::Regex;
use std::sync::OnceLock;

/// Alphabet of Flickr's short links, base 58 without `0`, `O`, `I`, `l`.
const SHORT_LINK_ALPHABET: &str = "123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// What a Flickr URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlickrUrl {
    /// A photo page; the id is usable against the photo API.
    SinglePhoto { photo_id: String },
    /// Anything else: albums, galleries, profiles, malformed links.
    Other,
}

fn photo_page_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(?:www\.)?flickr\.com/photos/[^/]+/(\d+)").expect("valid regex")
    })
}

fn short_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://flic\.kr/p/([1-9a-km-zA-HJ-NP-Z]+)").expect("valid regex")
    })
}

/// Classify a URL from the review template.
pub fn parse_photo_url(url: &str) -> FlickrUrl {
    let url = url.trim();

    if let Some(captures) = photo_page_regex().captures(url) {
        return FlickrUrl::SinglePhoto {
            photo_id: captures[1].to_string(),
        };
    }

    if let Some(captures) = short_link_regex().captures(url) {
        if let Some(photo_id) = decode_short_link(&captures[1]) {
            return FlickrUrl::SinglePhoto { photo_id };
        }
    }

    FlickrUrl::Other
}

/// Decode the base-58 payload of a `flic.kr/p/` link into a photo id.
fn decode_short_link(encoded: &str) -> Option<String> {
    let mut id: u64 = 0;

    for c in encoded.chars() {
        let digit = SHORT_LINK_ALPHABET.find(c)? as u64;
        id = id.checked_mul(58)?.checked_add(digit)?;
    }

    Some(id.to_string())
}

// ============================================================================
// Tests
// ============================================================================
