//! `request=anime`

use super::HttpRequest;
use crate::error::ValidationError;
use crate::protocol::Outcome;

/// Anime document
///
/// The XML is kept verbatim for the cache; only the fields needed for
/// follow-up work are extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeResult {
    pub aid: u64,
    pub xml: String,
    /// Main title, if present
    pub title: Option<String>,
    /// Poster file name on the image server
    pub picture: Option<String>,
}

/// Anime by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimeRequest {
    aid: u64,
}

impl AnimeRequest {
    pub fn new(aid: u64) -> Result<Self, ValidationError> {
        if aid == 0 {
            return Err(ValidationError::invalid_parameter("aid", "must be positive"));
        }
        Ok(Self { aid })
    }

    pub fn aid(&self) -> u64 {
        self.aid
    }
}

/// Text of the first `<tag ...>text</tag>` whose opening tag contains `attr`
fn element_text(xml: &str, tag: &str, attr: Option<&str>) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // `<titles>` must not match `<title`
        if !after.starts_with(['>', ' ', '\t', '\n', '\r']) {
            rest = after;
            continue;
        }
        let end_of_open = after.find('>')?;
        let attributes = &after[..end_of_open];
        let content = &after[end_of_open + 1..];
        if attr.is_none_or(|attr| attributes.contains(attr)) {
            let end = content.find(&close)?;
            let text = unescape(content[..end].trim());
            return (!text.is_empty()).then_some(text);
        }
        rest = content;
    }
    None
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

impl HttpRequest for AnimeRequest {
    type Output = AnimeResult;

    fn request_type(&self) -> &'static str {
        "anime"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![("aid".to_string(), self.aid.to_string())]
    }

    fn classify(&self, body: &str) -> Outcome<AnimeResult> {
        if !body.contains("<anime") {
            return Outcome::Fatal(format!(
                "Unexpected HTTP anime response for {}: {}",
                self.aid,
                body.chars().take(200).collect::<String>()
            ));
        }
        Outcome::Success(AnimeResult {
            aid: self.aid,
            title: element_text(body, "title", Some("type=\"main\"")),
            picture: element_text(body, "picture", None),
            xml: body.to_string(),
        })
    }
}
