use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::fetch::Fetcher;

const CHANNEL_ID_MARKER: &str = "\"channelId\":\"";

pub fn feed_url(channel_id: &str) -> String {
    format!(
        "https://www.youtube.com/feeds/videos.xml?channel_id={}",
        channel_id
    )
}

/// `https://www.youtube.com/channel/<id>` carries the id in the path
pub fn channel_id_from_url(channel_url: &str) -> Option<String> {
    let parsed = url::Url::parse(channel_url).ok()?;
    let mut parts = parsed.path().split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next()) {
        (Some("channel"), Some(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Find the channel id in a channel page: the embedded JSON first, then
/// anything shaped like a `UC...` id.
pub fn extract_channel_id(html: &str) -> Option<String> {
    if let Some(idx) = html.find(CHANNEL_ID_MARKER) {
        let start = idx + CHANNEL_ID_MARKER.len();
        if let Some(len) = html[start..].find('"') {
            return Some(html[start..start + len].to_string());
        }
    }

    static CHANNEL_ID: OnceLock<Option<Regex>> = OnceLock::new();
    CHANNEL_ID
        .get_or_init(|| Regex::new(r"UC[a-zA-Z0-9_-]{20,}").ok())
        .as_ref()?
        .find(html)
        .map(|m| m.as_str().to_string())
}

/// Resolve a channel URL to its id, fetching the page when needed.
/// Returns `None` (after logging) when the id cannot be found.
pub async fn resolve_channel_id(fetcher: &dyn Fetcher, channel_url: &str) -> Option<String> {
    if let Some(id) = channel_id_from_url(channel_url) {
        return Some(id);
    }

    let html = match fetcher.fetch(channel_url).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("could not fetch {}: {:#}", channel_url, e);
            return None;
        }
    };

    let id = extract_channel_id(&html).filter(|id| !id.is_empty());
    if id.is_none() {
        warn!("no channel id found in {}", channel_url);
    }
    id
}
