//! Best-effort preview of clip links: an embeddable player url and a
//! thumbnail. Nothing in here returns an error to the caller; anything that
//! goes wrong just means there is no preview.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{sync::OnceLock, time::Duration};
use url::Url;

pub const OEMBED_ENDPOINT: &str = "https://clips.twitch.tv/oembed";
const EMBED_ENDPOINT: &str = "https://clips.twitch.tv/embed";
const CLIP_PAGE: &str = "https://clips.twitch.tv";
const ASSET_HOST: &str = "https://clips-media-assets2.twitch.tv";

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11,}$").expect("slug pattern is valid"))
}

/// Pull the clip slug out of a stored video reference. Accepts a bare slug,
/// a clip page url (with or without scheme) or an embed url with `?clip=`.
pub fn clip_slug(reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let candidate = if reference.contains('/') || reference.contains('.') {
        let with_scheme = if reference.starts_with("http://") || reference.starts_with("https://")
        {
            reference.to_string()
        } else {
            format!("https://{reference}")
        };
        let url = Url::parse(&with_scheme).ok()?;
        match url.query_pairs().find(|(key, _)| key == "clip") {
            Some((_, clip)) => clip.into_owned(),
            None => url
                .path_segments()?
                .filter(|segment| !segment.is_empty())
                .last()?
                .to_string(),
        }
    } else {
        reference.to_string()
    };

    slug_pattern().is_match(&candidate).then_some(candidate)
}

/// Player url for a slug; `parent` is the host the player gets embedded in.
pub fn embed_url(slug: &str, parent: &str) -> Option<String> {
    Url::parse_with_params(
        EMBED_ENDPOINT,
        &[("clip", slug), ("parent", parent), ("autoplay", "false")],
    )
    .ok()
    .map(String::from)
}

/// Thumbnail url derived from the slug alone, used when oEmbed has nothing.
pub fn fallback_thumbnail(slug: &str) -> String {
    format!("{ASSET_HOST}/{slug}-preview-480x272.jpg")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Preview {
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    thumbnail_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PreviewResolver {
    client: reqwest::Client,
    oembed_endpoint: String,
    parent_host: String,
}

impl PreviewResolver {
    /// Every oEmbed request is bounded by `timeout`.
    pub fn new(timeout: Duration, parent_host: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            oembed_endpoint: OEMBED_ENDPOINT.to_string(),
            parent_host: parent_host.into(),
        })
    }

    pub fn with_oembed_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.oembed_endpoint = endpoint.into();
        self
    }

    /// Resolve a stored video reference. Tries oEmbed first, then the
    /// asset url pattern.
    pub async fn resolve(&self, reference: &str) -> Preview {
        let slug = clip_slug(reference);
        let page_url = match (&slug, reference.contains('/')) {
            (_, true) => Some(reference.trim().to_string()),
            (Some(slug), false) => Some(format!("{CLIP_PAGE}/{slug}")),
            (None, false) => None,
        };

        let mut thumbnail_url = match page_url {
            Some(page_url) => self.fetch_oembed_thumbnail(&page_url).await,
            None => None,
        };
        if thumbnail_url.is_none() {
            thumbnail_url = slug.as_deref().map(fallback_thumbnail);
        }
        let embed_url = slug
            .as_deref()
            .and_then(|slug| embed_url(slug, &self.parent_host));

        Preview {
            available: thumbnail_url.is_some() || embed_url.is_some(),
            embed_url,
            thumbnail_url,
        }
    }

    async fn fetch_oembed_thumbnail(&self, page_url: &str) -> Option<String> {
        let response = self
            .client
            .get(&self.oembed_endpoint)
            .query(&[("url", page_url)])
            .send()
            .await;
        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("oembed lookup returned {}", response.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("oembed lookup failed: {e}");
                return None;
            }
        };
        match response.json::<OEmbedResponse>().await {
            Ok(body) => body.thumbnail_url.filter(|url| !url.is_empty()),
            Err(e) => {
                tracing::debug!("unreadable oembed response: {e}");
                None
            }
        }
    }
}
