use chrono::{DateTime, Utc};

/// One normalized item from an RSS or Atom feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub message: String,
    pub link: String,
    /// Zone-less timestamps are stored as UTC.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A configured feed source: blog, YouTube channel or Bluesky member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub url: String,
    pub name: Option<String>,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>, name: Option<String>) -> Self {
        let name = name.filter(|n| !n.trim().is_empty());
        Self {
            url: url.into(),
            name,
        }
    }

    /// Configured name, then the feed's own title, then the raw URL
    pub fn display_name(&self, feed_title: Option<&str>) -> String {
        self.name
            .as_deref()
            .or(feed_title.filter(|t| !t.is_empty()))
            .unwrap_or(&self.url)
            .to_string()
    }
}

/// The digest categories, in the order they appear in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Blogs,
    YouTube,
    Bluesky,
    GitHubReleases,
}

impl Category {
    pub fn heading(&self) -> &'static str {
        match self {
            Category::Blogs => "Blogs",
            Category::YouTube => "YouTube",
            Category::Bluesky => "BlueSky",
            Category::GitHubReleases => "GitHub Releases",
        }
    }

    pub fn link_label(&self) -> &'static str {
        match self {
            Category::Blogs => "Article",
            Category::YouTube => "Video",
            Category::Bluesky => "Post",
            Category::GitHubReleases => "Release",
        }
    }

    /// Bluesky posts are already on Bluesky, so they get no share link
    pub fn includes_share_link(&self) -> bool {
        !matches!(self, Category::Bluesky)
    }
}
