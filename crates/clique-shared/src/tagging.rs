//! Tag suggestion for new media.
//!
//! Suggestions come from two sources: the words of the media name, and for
//! link media the domain of the link.  A handful of known platforms get
//! their clean name even when buried in the host (`www.tiktok.com` suggests
//! `tiktok`, not `www`).

use url::Url;

/// Platforms recognized by name anywhere among the host labels.  Checked
/// before the raw first-label fallback.
pub const KNOWN_PLATFORMS: [&str; 3] = ["tiktok", "instagram", "reddit"];

/// Lowercased whitespace-separated words of the media name.
pub fn propose_tags_from_name(name: &str) -> Vec<String> {
    name.split_whitespace().map(str::to_lowercase).collect()
}

/// A single tag derived from the link's domain, if one can be derived.
///
/// Scheme-less links ("tiktok.com/clip") have no parseable host; they are
/// dot-split as-is, which still lets a known platform match, but there is
/// no first-label fallback for them.
pub fn propose_tag_from_link(link: &str) -> Option<String> {
    let host = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    let labels: Vec<String> = match &host {
        Some(h) => h.split('.').map(str::to_lowercase).collect(),
        None => link.split('.').map(str::to_lowercase).collect(),
    };

    for platform in KNOWN_PLATFORMS {
        if labels.iter().any(|l| l == platform) {
            return Some(platform.to_string());
        }
    }

    match host {
        Some(_) => labels.first().cloned(),
        None => None,
    }
}

/// Combined suggestion: name words, plus the domain tag for link media.
pub fn propose_tags(name: &str, is_image: bool, link: &str) -> Vec<String> {
    let mut tags = propose_tags_from_name(name);
    if !is_image {
        if let Some(tag) = propose_tag_from_link(link) {
            tags.push(tag);
        }
    }
    tags
}
