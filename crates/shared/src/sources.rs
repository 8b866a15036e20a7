use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::models::SourceDescriptor;

/// A feed entry as written in the config: a bare URL or `{url, name}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedItem {
    Url(String),
    Detailed {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

/// A repository as written in the config: `"owner/name"` or `{repo}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepoItem {
    Slug(String),
    Detailed {
        #[serde(default)]
        repo: Option<String>,
    },
}

fn read_json(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))
}

/// A single object counts as a one-element list
fn as_list(json: &str, kind: &str) -> Result<Vec<Value>> {
    let value: Value =
        serde_json::from_str(json).with_context(|| format!("{} JSON is not valid JSON", kind))?;
    match value {
        Value::Array(items) => Ok(items),
        object @ Value::Object(_) => Ok(vec![object]),
        _ => bail!("{} JSON must be a list.", kind),
    }
}

fn parse_feed_list(json: &str, kind: &str) -> Result<Vec<SourceDescriptor>> {
    as_list(json, kind)?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let (url, name) = match serde_json::from_value::<FeedItem>(value) {
                Ok(FeedItem::Url(url)) => (Some(url), None),
                Ok(FeedItem::Detailed { url, name }) => (url, name),
                Err(_) => (None, None),
            };
            let url = url.as_deref().map(str::trim).unwrap_or_default();
            if url.is_empty() {
                bail!("{} item {} is missing a url.", kind, idx);
            }
            let name = name.map(|n| n.trim().to_string());
            Ok(SourceDescriptor::new(url, name))
        })
        .collect()
}

pub fn parse_blog_feeds(json: &str) -> Result<Vec<SourceDescriptor>> {
    parse_feed_list(json, "Blog")
}

pub fn parse_youtube_channels(json: &str) -> Result<Vec<SourceDescriptor>> {
    parse_feed_list(json, "YouTube")
}

/// Repositories as `owner/name`; any malformed item fails the whole list
pub fn parse_github_repos(json: &str) -> Result<Vec<String>> {
    as_list(json, "GitHub")?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let repo = match serde_json::from_value::<RepoItem>(value) {
                Ok(RepoItem::Slug(repo)) => Some(repo),
                Ok(RepoItem::Detailed { repo }) => repo,
                Err(_) => None,
            };
            let repo = repo.as_deref().map(str::trim).unwrap_or_default();
            if repo.is_empty() || !repo.contains('/') {
                bail!("Item {} must be a repo like owner/name.", idx);
            }
            Ok(repo.to_string())
        })
        .collect()
}

pub fn load_blog_feeds(path: &Path) -> Result<Vec<SourceDescriptor>> {
    parse_blog_feeds(&read_json(path)?)
        .with_context(|| format!("Invalid blog feeds in {}", path.display()))
}

pub fn load_youtube_channels(path: &Path) -> Result<Vec<SourceDescriptor>> {
    parse_youtube_channels(&read_json(path)?)
        .with_context(|| format!("Invalid YouTube channels in {}", path.display()))
}

pub fn load_github_repos(path: &Path) -> Result<Vec<String>> {
    parse_github_repos(&read_json(path)?)
        .with_context(|| format!("Invalid GitHub repositories in {}", path.display()))
}
