use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::fetch::Fetcher;
use crate::models::SourceDescriptor;

const XRPC_BASE: &str = "https://public.api.bsky.app/xrpc";

/// `https://bsky.app/profile/<handle>/lists/<list_id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRef {
    pub handle: String,
    pub list_id: String,
}

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    #[serde(default)]
    subject: Subject,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subject {
    did: Option<String>,
    handle: Option<String>,
    display_name: Option<String>,
}

pub fn parse_list_url(list_url: &str) -> Result<ListRef> {
    let usage = "List URL must look like https://bsky.app/profile/<handle>/lists/<list_id>";
    let parsed = url::Url::parse(list_url).with_context(|| format!("{}: {}", usage, list_url))?;
    let parts: Vec<&str> = parsed
        .path()
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();

    if parts.len() < 4 || parts[0] != "profile" || parts[2] != "lists" {
        bail!("{}: {}", usage, list_url);
    }

    Ok(ListRef {
        handle: parts[1].to_string(),
        list_id: parts[3].to_string(),
    })
}

/// Per-account RSS feed served by Bluesky
pub fn member_feed_url(did: &str) -> String {
    format!("https://bsky.app/profile/{}/rss", did)
}

pub async fn resolve_handle(fetcher: &dyn Fetcher, handle: &str) -> Result<String> {
    let url = format!(
        "{}/com.atproto.identity.resolveHandle?handle={}",
        XRPC_BASE,
        urlencoding::encode(handle)
    );
    let body = fetcher
        .fetch(&url)
        .await
        .with_context(|| format!("Failed to resolve handle: {}", handle))?;
    let response: ResolveHandleResponse = serde_json::from_slice(&body)
        .with_context(|| format!("Failed to parse resolveHandle response for {}", handle))?;

    match response.did {
        Some(did) if !did.is_empty() => Ok(did),
        _ => bail!("Could not resolve handle: {}", handle),
    }
}

/// Resolve the list owner, fetch the list and turn each member into a feed source
pub async fn fetch_list_members(
    fetcher: &dyn Fetcher,
    list_url: &str,
) -> Result<Vec<SourceDescriptor>> {
    let list = parse_list_url(list_url)?;
    let did = resolve_handle(fetcher, &list.handle).await?;

    let list_uri = format!("at://{}/app.bsky.graph.list/{}", did, list.list_id);
    let api_url = format!(
        "{}/app.bsky.graph.getList?list={}",
        XRPC_BASE,
        urlencoding::encode(&list_uri)
    );
    let body = fetcher
        .fetch(&api_url)
        .await
        .with_context(|| format!("Failed to fetch Bluesky list {}", list_uri))?;
    let response: GetListResponse =
        serde_json::from_slice(&body).context("Failed to parse getList response")?;

    let members: Vec<SourceDescriptor> = response
        .items
        .into_iter()
        .filter_map(|item| {
            let subject = item.subject;
            let did = subject.did.filter(|d| !d.is_empty())?;
            let name = subject
                .display_name
                .filter(|n| !n.trim().is_empty())
                .or(subject.handle)
                .filter(|n| !n.trim().is_empty())?;
            Some(SourceDescriptor::new(member_feed_url(&did), Some(name)))
        })
        .collect();

    debug!("Bluesky list {} has {} members", list_uri, members.len());
    Ok(members)
}
