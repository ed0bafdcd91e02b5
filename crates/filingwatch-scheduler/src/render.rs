//! Notification rendering: filing → subject line + HTML body.
//!
//! Rendering never touches the network: remote screenshots are referenced by
//! URL and inline screenshots are embedded as `data:` URIs.

use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};
use filingwatch_core::types::{Filing, ImageSource, ScreenshotPayload};

/// Subject and HTML body for one filing.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMail {
    pub subject: String,
    pub html_body: String,
}

/// One image ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    pub label: String,
    pub src: String,
    pub filename: String,
    /// Announcement screenshots get an accent border.
    pub highlighted: bool,
}

/// Renders filings using a subject prefix and display offset.
#[derive(Debug, Clone)]
pub struct Renderer {
    subject_prefix: String,
    offset: FixedOffset,
}

impl Renderer {
    pub fn new(subject_prefix: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            subject_prefix: subject_prefix.into(),
            offset,
        }
    }

    pub fn subject(&self, filing: &Filing, now: DateTime<Utc>) -> String {
        format!(
            "{}: {} - {} | {}",
            self.subject_prefix,
            filing.company_name,
            category_or(&filing.category, "Update"),
            now.with_timezone(&self.offset).format("%d %b %Y, %I:%M %p")
        )
    }

    pub fn render(&self, filing: &Filing, now: DateTime<Utc>) -> RenderedMail {
        RenderedMail {
            subject: self.subject(filing, now),
            html_body: self.html_body(filing),
        }
    }

    fn html_body(&self, f: &Filing) -> String {
        let mut html = String::with_capacity(4096);
        html.push_str(r#"<div style="font-family: Arial, sans-serif; max-width: 700px; margin: 0 auto;">"#);
        html.push_str(&format!(
            r#"<h2 style="color: #1a2332; border-bottom: 3px solid #0a7b83; padding-bottom: 10px;">New Filing from {}</h2>"#,
            escape_html(&f.company_name)
        ));

        html.push_str(&format!(
            r#"<div style="background: #f8f9fa; padding: 15px; border-radius: 8px; margin: 20px 0;">
<h3 style="color: #0a7b83; margin-top: 0;">{}</h3>
<p style="color: #6c757d; font-size: 12px; margin: 5px 0;"><strong>Code:</strong> {} | <strong>Category:</strong> {}</p>
</div>"#,
            escape_html(&f.company_name),
            escape_html(f.company_code.as_deref().unwrap_or("N/A")),
            escape_html(category_or(&f.category, "Other")),
        ));

        html.push_str(&format!(
            r#"<div style="margin: 20px 0;"><h4 style="color: #2c3e50; margin-bottom: 10px;">Subject:</h4><p style="color: #343a40; line-height: 1.6;">{}</p></div>"#,
            escape_html(&f.subject)
        ));

        if let Some(summary) = distinct_from(f.summary.as_deref(), &f.subject) {
            html.push_str(&format!(
                r#"<div style="background: #e0f2fe; border-left: 4px solid #0a7b83; padding: 15px; margin: 20px 0;"><h4 style="color: #0a7b83; margin-top: 0;">AI Summary:</h4><p style="color: #343a40; line-height: 1.6; margin: 0;">{}</p></div>"#,
                escape_html(summary)
            ));
        }

        if let Some(title) = distinct_from(f.title.as_deref(), &f.subject) {
            html.push_str(&format!(
                r#"<div style="margin: 20px 0; padding: 10px; background: #fff3cd; border-radius: 6px;"><p style="color: #856404; margin: 0; font-size: 13px;"><strong>Title:</strong> {}</p></div>"#,
                escape_html(title)
            ));
        }

        html.push_str(r#"<div style="margin: 20px 0; background: #f8f9fa; padding: 15px; border-radius: 8px;">"#);
        html.push_str(&format!(
            r#"<p style="color: #6c757d; font-size: 12px; margin: 5px 0;"><strong>Filing Date:</strong> {}</p>"#,
            f.filed_at.with_timezone(&self.offset).format("%d %B %Y, %I:%M %p")
        ));
        html.push_str(&format!(
            r#"<p style="color: #6c757d; font-size: 12px; margin: 5px 0;"><strong>Scraped:</strong> {}</p>"#,
            f.scraped_at.with_timezone(&self.offset).format("%d %B %Y, %I:%M %p")
        ));
        if let Some(source) = non_empty(f.source_page.as_deref()) {
            html.push_str(&format!(
                r#"<p style="color: #6c757d; font-size: 12px; margin: 5px 0;"><strong>Source:</strong> <a href="{}" style="color: #0a7b83;">View on exchange</a></p>"#,
                escape_html(source)
            ));
        }
        html.push_str("</div>");

        let images = preview_images(f);
        if images.is_empty() {
            html.push_str(PREVIEW_UNAVAILABLE);
        } else {
            html.push_str(r#"<div style="margin: 30px 0;"><h4 style="color: #2c3e50; margin-bottom: 15px;">Document Preview:</h4>"#);
            for img in &images {
                html.push_str(&format!(
                    r#"<div style="margin-bottom: 20px;"><p style="color: #6c757d; font-size: 13px; font-weight: 600; margin-bottom: 8px;">{label}</p><div style="border: 2px solid {border}; border-radius: 8px; overflow: hidden; background: white;"><img src="{src}" alt="{label}" style="width: 100%; height: auto; display: block; max-height: 1000px; object-fit: contain;"></div></div>"#,
                    label = escape_html(&img.label),
                    border = if img.highlighted { "#0a7b83" } else { "#dee2e6" },
                    src = escape_html(&img.src),
                ));
            }
            html.push_str("</div>");
        }

        if let Some(pdf) = non_empty(f.pdf_url.as_deref()) {
            html.push_str(&format!(
                r#"<div style="margin: 30px 0; text-align: center;"><a href="{}" style="background: #0a7b83; color: white; padding: 14px 28px; text-decoration: none; border-radius: 6px; display: inline-block; font-weight: bold; font-size: 15px;">Download Full PDF Document</a></div>"#,
                escape_html(pdf)
            ));
        }

        html.push_str(&format!(
            r#"<hr style="border: none; border-top: 1px solid #dee2e6; margin: 30px 0;"><div style="text-align: center; color: #6c757d; font-size: 11px;"><p style="margin: 5px 0;">Automated filing notification</p><p style="margin: 5px 0; opacity: 0.7;">Filing ID: {}</p></div></div>"#,
            escape_html(f.short_id())
        ));
        html
    }
}

pub const PREVIEW_UNAVAILABLE_TITLE: &str = "Document Preview Not Available";

const PREVIEW_UNAVAILABLE: &str = r#"<div style="margin: 30px 0; background: #fff3cd; border-left: 4px solid #ffc107; padding: 15px; border-radius: 6px;"><p style="color: #856404; margin: 0; font-weight: 600;">Document Preview Not Available</p><p style="color: #856404; margin: 8px 0 0 0; font-size: 13px;">Screenshots could not be captured during scraping. Please open the full document using the link below.</p></div>"#;

/// Decode the filing's screenshot payload into embeddable images.
///
/// A payload that fails to parse is logged and treated as "no images".
pub fn preview_images(filing: &Filing) -> Vec<PreviewImage> {
    let Some(raw) = non_empty(filing.screenshot.as_deref()) else {
        tracing::debug!("   [{}] no screenshot payload", filing.short_id());
        return Vec::new();
    };

    let payload = match ScreenshotPayload::parse(raw) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("⚠️ [{}] unreadable screenshot payload: {e}", filing.short_id());
            return Vec::new();
        }
    };

    if payload.images.is_empty() {
        tracing::warn!(
            "⚠️ [{}] screenshot list is empty, capture likely failed upstream",
            filing.short_id()
        );
    }

    let mut images = Vec::with_capacity(payload.images.len());
    for (idx, desc) in payload.images.iter().enumerate() {
        let src = match desc.source() {
            Some(ImageSource::Remote(url)) => url.to_string(),
            Some(ImageSource::Inline(data)) => match inline_data_uri(data) {
                Some(uri) => uri,
                None => {
                    tracing::warn!(
                        "⚠️ [{}] dropping image {} with invalid inline data",
                        filing.short_id(),
                        desc.filename_or(idx)
                    );
                    continue;
                }
            },
            None => continue,
        };

        let label = match (desc.kind(), desc.page_number) {
            ("announcement", _) => "Announcement Details".to_string(),
            ("pdf_page", Some(page)) => format!("PDF Page {page}"),
            _ => format!("Image {}", idx + 1),
        };

        images.push(PreviewImage {
            label,
            src,
            filename: desc.filename_or(idx),
            highlighted: desc.kind() == "announcement",
        });
    }
    images
}

/// Validate inline base64 and wrap it as a PNG data URI.
fn inline_data_uri(data: &str) -> Option<String> {
    let (prefix, encoded) = match data.split_once(',') {
        Some((head, tail)) if head.starts_with("data:") => (head.to_string(), tail),
        _ => ("data:image/png;base64".to_string(), data),
    };
    let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(&encoded)
        .ok()
        .filter(|bytes| !bytes.is_empty())?;
    Some(format!("{prefix},{encoded}"))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn distinct_from<'a>(value: Option<&'a str>, subject: &str) -> Option<&'a str> {
    non_empty(value).filter(|v| *v != subject.trim())
}

fn category_or<'a>(category: &'a str, fallback: &'a str) -> &'a str {
    if category.trim().is_empty() { fallback } else { category }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    fn filing(screenshot: Option<&str>) -> Filing {
        let filed_at = Utc.with_ymd_and_hms(2026, 3, 2, 4, 30, 0).unwrap();
        Filing {
            id: "a1b2c3d4e5f6".into(),
            company_name: "Axis Bank Ltd".into(),
            company_code: Some("532215".into()),
            category: "Result".into(),
            subject: "Financial results for Q3".into(),
            summary: Some("Net profit up 12%".into()),
            title: Some("Financial results for Q3".into()),
            filed_at,
            scraped_at: filed_at,
            source_page: Some("https://www.bseindia.com/ann?id=1".into()),
            pdf_url: Some("https://www.bseindia.com/x.pdf".into()),
            screenshot: screenshot.map(String::from),
            dispatched: false,
        }
    }

    fn renderer() -> Renderer {
        Renderer::new("BSE Announcement", ist())
    }

    #[test]
    fn test_subject_uses_offset() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 4, 30, 0).unwrap();
        let subject = renderer().subject(&filing(None), now);
        assert_eq!(subject, "BSE Announcement: Axis Bank Ltd - Result | 02 Mar 2026, 10:00 AM");
    }

    #[test]
    fn test_empty_images_render_fallback() {
        let mail = renderer().render(&filing(Some(r#"{"images":[]}"#)), Utc::now());
        assert!(mail.html_body.contains(PREVIEW_UNAVAILABLE_TITLE));
        assert!(!mail.html_body.contains("<img"));
    }

    #[test]
    fn test_absent_and_garbage_payload_render_fallback() {
        for payload in [None, Some("{not json"), Some("")] {
            let mail = renderer().render(&filing(payload), Utc::now());
            assert!(mail.html_body.contains(PREVIEW_UNAVAILABLE_TITLE));
        }
    }

    #[test]
    fn test_inline_image_embedded_as_data_uri() {
        let payload = r#"{"images":[{"filename":"pdf_page_1.png","data":"iVBORw0KGgo=","type":"pdf_page","page_number":1}]}"#;
        let mail = renderer().render(&filing(Some(payload)), Utc::now());
        assert!(mail.html_body.contains(r#"src="data:image/png;base64,iVBORw0KGgo=""#));
        assert!(mail.html_body.contains("PDF Page 1"));
        assert!(!mail.html_body.contains(PREVIEW_UNAVAILABLE_TITLE));
    }

    #[test]
    fn test_remote_and_invalid_inline_images() {
        let payload = r#"{"images":[
            {"filename":"announcement_details.png","url":"https://cdn.example/a.png","type":"announcement"},
            {"filename":"bad.png","data":"!!not-base64!!"},
            {"filename":"other.png","data":"data:image/jpeg;base64,/9j/4AAQ"}
        ]}"#;
        let images = preview_images(&filing(Some(payload)));
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].label, "Announcement Details");
        assert!(images[0].highlighted);
        assert_eq!(images[0].src, "https://cdn.example/a.png");
        assert_eq!(images[1].label, "Image 3");
        assert_eq!(images[1].src, "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[test]
    fn test_summary_and_title_dedup() {
        let mail = renderer().render(&filing(None), Utc::now());
        assert!(mail.html_body.contains("AI Summary:"));
        // Title equals subject, so it is not repeated.
        assert!(!mail.html_body.contains("<strong>Title:</strong>"));
        assert!(mail.html_body.contains("Filing ID: a1b2c3d4"));
        assert!(mail.html_body.contains("Download Full PDF Document"));
    }

    #[test]
    fn test_fields_are_escaped() {
        let mut f = filing(None);
        f.subject = "<script>alert(1)</script> & more".into();
        let mail = renderer().render(&f, Utc::now());
        assert!(mail.html_body.contains("&lt;script&gt;alert(1)&lt;/script&gt; &amp; more"));
        assert!(!mail.html_body.contains("<script>"));
    }
}
