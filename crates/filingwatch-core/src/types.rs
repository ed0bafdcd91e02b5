//! Data model: filings, their screenshot payloads, and outgoing mail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A corporate disclosure record written by the external scraper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Filing {
    /// Upstream news id: immutable and globally unique.
    pub id: String,
    pub company_name: String,
    /// Exchange security code, when the listing exposes one.
    pub company_code: Option<String>,
    pub category: String,
    pub subject: String,
    /// AI-derived summary.
    pub summary: Option<String>,
    pub title: Option<String>,
    pub filed_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub source_page: Option<String>,
    pub pdf_url: Option<String>,
    /// Raw screenshot JSON as written by the scraper. `None` or an empty image
    /// list means capture failed upstream, which is not a data error.
    pub screenshot: Option<String>,
    /// Set once by the dispatcher's claim, never reset.
    #[serde(default)]
    pub dispatched: bool,
}

impl Filing {
    /// First 8 chars of the id, for logs and mail footers.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

/// `{"images": [...]}`: the screenshot blob stored alongside a filing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreenshotPayload {
    #[serde(default)]
    pub images: Vec<ImageDescriptor>,
}

impl ScreenshotPayload {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// One captured image. Carries either a remote reference (`url`) or inline
/// base64 bytes (`data`); `url` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageDescriptor {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Where the bytes of an image live.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource<'a> {
    Remote(&'a str),
    Inline(&'a str),
}

impl ImageDescriptor {
    pub fn source(&self) -> Option<ImageSource<'_>> {
        match (self.url.as_deref(), self.data.as_deref()) {
            (Some(url), _) if !url.is_empty() => Some(ImageSource::Remote(url)),
            (_, Some(data)) if !data.is_empty() => Some(ImageSource::Inline(data)),
            _ => None,
        }
    }

    pub fn filename_or(&self, index: usize) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| format!("image_{index}.png"))
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("unknown")
    }
}

/// A rendered message handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    /// Ordered recipient addresses.
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

/// Provider-assigned (or locally generated) id of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryId(pub String);

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Paged, filtered listing used by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingQuery {
    /// Case-insensitive substring of company name or code.
    pub company: Option<String>,
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for FilingQuery {
    fn default() -> Self {
        Self {
            company: None,
            category: None,
            limit: 50,
            offset: 0,
        }
    }
}
