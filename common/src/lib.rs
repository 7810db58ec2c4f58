#![warn(clippy::nursery, clippy::pedantic)]

//! Contains common functions and structures used by the server and the client

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use http::HeaderName;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use url::Url;

pub use crate::ttl::{ParseTtlError, Ttl};

mod ttl;

pub const API_ENDPOINT: &str = "/api";

/// Path segment under which pastes are rendered as HTML documents.
pub const VIEW_SEGMENT: &str = "p";

lazy_static! {
    /// Overrides the server's notion of "now" for a single request. Only
    /// honored by servers running in test mode.
    pub static ref TEST_NOW_HEADER_NAME: HeaderName = HeaderName::from_static("x-test-now-ms");
}

/// Parses the value of [`TEST_NOW_HEADER_NAME`]: milliseconds since the Unix
/// epoch.
#[must_use]
pub fn parse_test_now(value: &str) -> Option<DateTime<Utc>> {
    let millis = value.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

/// Body of `POST /api/pastes`.
///
/// Every field is optional on the wire so that the server can answer a
/// missing `content` with a validation error instead of a decoding error.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CreatePaste {
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_views: Option<i64>,
}

impl CreatePaste {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    // False positive
    #[allow(clippy::missing_const_for_fn)]
    #[must_use]
    pub fn ttl_seconds(mut self, ttl_seconds: f64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    // False positive
    #[allow(clippy::missing_const_for_fn)]
    #[must_use]
    pub fn max_views(mut self, max_views: i64) -> Self {
        self.max_views = Some(max_views);
        self
    }
}

/// Response of a successful create.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreatedPaste {
    pub id: String,
    pub url: String,
}

/// What a successful fetch hands back.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PasteView {
    pub content: String,
    /// Views left after this one; `None` for pastes without a view limit.
    pub remaining_views: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PasteView {
    /// Human readable summary of how much longer this paste will live.
    #[must_use]
    pub fn expiry_note(&self) -> String {
        let views = match self.remaining_views {
            Some(0) => Some("This was the last view. You now have the only copy.".to_string()),
            Some(1) => Some("This paste can be viewed 1 more time.".to_string()),
            Some(n) => Some(format!("This paste can be viewed {n} more times.")),
            None => None,
        };
        let time = self.expires_at.map(|time| {
            time.format("This paste will expire on %A, %B %-d, %Y at %T %Z.")
                .to_string()
        });

        match (views, time) {
            (None, None) => "This paste will not expire.".to_string(),
            (Some(note), None) | (None, Some(note)) => note,
            (Some(views), Some(time)) => format!("{views} {time}"),
        }
    }
}

/// Error body returned by every failing API endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `GET /api/healthz`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Health {
    pub ok: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseUrlError {
    #[error("The provided url was bad")]
    BadUrl,
    #[error("The url does not point at a paste")]
    MissingId,
}

/// Returns the create endpoint of the server rooted at `base`.
///
/// # Errors
///
/// Returns an error if `base` cannot have path segments, such as a `mailto:`
/// url.
pub fn pastes_endpoint(base: &Url) -> Result<Url, ParseUrlError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| ParseUrlError::BadUrl)?
        .pop_if_empty()
        .extend([&API_ENDPOINT[1..], "pastes"]);
    Ok(url)
}

/// A share url, either the HTML one (`.../p/<id>`) or the API one
/// (`.../api/pastes/<id>`), resolved to the API endpoint of the paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub api_url: Url,
    pub id: String,
}

impl FromStr for ParsedUrl {
    type Err = ParseUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut url = Url::from_str(s).map_err(|_| ParseUrlError::BadUrl)?;
        if url.cannot_be_a_base() {
            return Err(ParseUrlError::BadUrl);
        }
        url.set_query(None);
        url.set_fragment(None);

        let segments: Vec<String> = url
            .path_segments()
            .ok_or(ParseUrlError::BadUrl)?
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();

        let (prefix, id) = match parts.as_slice() {
            [prefix @ .., "api", "pastes", id] => (prefix, *id),
            [prefix @ .., view, id] if *view == VIEW_SEGMENT => (prefix, *id),
            _ => return Err(ParseUrlError::MissingId),
        };

        url.set_path(&prefix.join("/"));
        let mut api_url = pastes_endpoint(&url)?;
        api_url
            .path_segments_mut()
            .map_err(|_| ParseUrlError::BadUrl)?
            .push(id);

        Ok(Self {
            api_url,
            id: id.to_string(),
        })
    }
}
