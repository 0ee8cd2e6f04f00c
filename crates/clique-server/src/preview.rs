//! Link preview generation.
//!
//! YouTube links are resolved locally to the thumbnail YouTube already
//! hosts. Everything else goes to the screenshot service, which renders
//! the page and returns a PNG for us to store.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::error::ApiError;

/// What a link preview resolved to.
pub enum LinkPreview {
    /// A URL served by a third party; stored as-is, nothing uploaded.
    ExternalUrl(String),
    /// Rendered screenshot bytes that still need a home in the object store.
    Image(Vec<u8>),
}

pub struct PreviewClient {
    endpoint: Url,
    http: reqwest::Client,
}

impl PreviewClient {
    pub fn new(endpoint: &str) -> Result<Self, ApiError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ApiError::Internal(format!("invalid preview service URL: {e}")))?;
        Ok(Self {
            endpoint,
            http: reqwest::Client::new(),
        })
    }

    /// Produce a preview for `link`.
    ///
    /// Known video platforms short-circuit to their own thumbnail URL and
    /// never touch the network. The screenshot fallback does, and its
    /// failures surface as [`ApiError::Upstream`]; callers decide whether
    /// a preview is worth failing the request over.
    pub async fn generate(&self, link: &str) -> Result<LinkPreview, ApiError> {
        if let Some(video_id) = youtube_video_id(link) {
            let thumbnail = format!("https://img.youtube.com/vi/{video_id}/0.jpg");
            return Ok(LinkPreview::ExternalUrl(thumbnail));
        }

        let url = self
            .endpoint
            .join("screenshot")
            .map_err(|e| ApiError::Internal(format!("invalid screenshot URL: {e}")))?;

        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "url": link }))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("screenshot service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "screenshot service returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Upstream(format!("screenshot body read failed: {e}")))?;

        Ok(LinkPreview::Image(bytes.to_vec()))
    }
}

/// Extract the 11-character video id from a YouTube watch or share link.
fn youtube_video_id(link: &str) -> Option<String> {
    if !link.contains("youtube.com") && !link.contains("youtu.be") {
        return None;
    }
    static VIDEO_ID: OnceLock<Regex> = OnceLock::new();
    let re = VIDEO_ID
        .get_or_init(|| Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})(?:[&?/]|$)").expect("valid regex"));
    re.captures(link).map(|caps| caps[1].to_string())
}
