use tracing::{debug, info, warn};

use crate::feed::{parse_feed, ParsedFeed};
use crate::fetch::Fetcher;
use crate::models::{Category, FeedEntry, SourceDescriptor};
use crate::window::DayWindow;
use crate::youtube;

const SHARE_INTENT: &str = "https://bsky.app/intent/compose?text=";

/// Bullets for one source, under an optional `###` heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    pub heading: Option<String>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestSection {
    pub category: Category,
    pub groups: Vec<SourceGroup>,
}

/// Sections in category order. Empty sections are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestDocument {
    sections: Vec<DigestSection>,
}

impl DigestDocument {
    pub fn push(&mut self, category: Category, groups: Vec<SourceGroup>) {
        let groups: Vec<SourceGroup> = groups
            .into_iter()
            .filter(|g| !g.bullets.is_empty())
            .collect();
        if !groups.is_empty() {
            self.sections.push(DigestSection { category, groups });
        }
    }

    pub fn sections(&self) -> &[DigestSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        for section in &self.sections {
            lines.push(format!("## {}", section.category.heading()));
            lines.push(String::new());

            for group in &section.groups {
                match &group.heading {
                    Some(heading) => {
                        lines.push(format!("### {}", heading));
                        lines.push(String::new());
                        lines.extend(group.bullets.iter().cloned());
                        lines.push(String::new());
                    }
                    None => lines.extend(group.bullets.iter().cloned()),
                }
            }
        }

        format!("{}\n", lines.join("\n").trim_end())
    }
}

/// Compose-intent link pre-filled with `"{message} {link}"`
pub fn share_intent_url(message: &str, link: &str) -> String {
    let text = format!("{} {}", message, link);
    let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
    format!("{}{}", SHARE_INTENT, encoded)
}

/// `- {message} [{label}]({link})`, plus a share link outside Bluesky.
/// Without a link the bullet is just the message.
pub fn format_bullet(message: &str, link: &str, category: Category) -> String {
    if link.is_empty() {
        return format!("- {}", message);
    }

    let mut bullet = format!("- {} [{}]({})", message, category.link_label(), link);
    if category.includes_share_link() {
        bullet.push_str(&format!(" [Bsky]({})", share_intent_url(message, link)));
    }
    bullet
}

fn release_message(repo: &str, release: &FeedEntry) -> String {
    if !release.message.is_empty() && release.message != release.title {
        format!("{}: {} — {}", repo, release.title, release.message)
    } else {
        format!("{}: {}", repo, release.title)
    }
}

/// Builds the daily digest: Blogs, YouTube, BlueSky, GitHub Releases
pub struct DigestGenerator<'a> {
    fetcher: &'a dyn Fetcher,
    window: DayWindow,
}

impl<'a> DigestGenerator<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, window: DayWindow) -> Self {
        Self { fetcher, window }
    }

    /// Fetch and parse one feed; failures are logged and skip the source
    async fn fetch_feed(&self, url: &str) -> Option<ParsedFeed> {
        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("could not fetch {}: {:#}", url, e);
                return None;
            }
        };

        match parse_feed(&bytes) {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!("could not parse feed {}: {:#}", url, e);
                None
            }
        }
    }

    async fn feed_group(
        &self,
        source: &SourceDescriptor,
        feed_url: &str,
        category: Category,
    ) -> Option<SourceGroup> {
        let feed = self.fetch_feed(feed_url).await?;
        let entries = self.window.filter(feed.entries);
        if entries.is_empty() {
            debug!("no entries for {} on {}", feed_url, self.window.date());
            return None;
        }

        let bullets = entries
            .iter()
            .map(|e| format_bullet(&e.title, &e.link, category))
            .collect();

        Some(SourceGroup {
            heading: Some(source.display_name(feed.title.as_deref())),
            bullets,
        })
    }

    pub async fn blog_groups(&self, blogs: &[SourceDescriptor]) -> Vec<SourceGroup> {
        let mut groups = Vec::new();
        for blog in blogs {
            if let Some(group) = self.feed_group(blog, &blog.url, Category::Blogs).await {
                groups.push(group);
            }
        }
        groups
    }

    pub async fn youtube_groups(&self, channels: &[SourceDescriptor]) -> Vec<SourceGroup> {
        let mut groups = Vec::new();
        for channel in channels {
            let Some(channel_id) = youtube::resolve_channel_id(self.fetcher, &channel.url).await
            else {
                warn!(
                    "skipping YouTube channel {} (could not resolve id)",
                    channel.url
                );
                continue;
            };

            let feed_url = youtube::feed_url(&channel_id);
            if let Some(group) = self.feed_group(channel, &feed_url, Category::YouTube).await {
                groups.push(group);
            }
        }
        groups
    }

    pub async fn bluesky_groups(&self, members: &[SourceDescriptor]) -> Vec<SourceGroup> {
        let mut groups = Vec::new();
        for member in members {
            let Some(feed) = self.fetch_feed(&member.url).await else {
                continue;
            };

            // Newest first; undated posts sink to the bottom
            let mut entries = feed.entries;
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let entries = self.window.filter(entries);
            if entries.is_empty() {
                continue;
            }

            groups.push(SourceGroup {
                heading: Some(member.display_name(None)),
                bullets: entries
                    .iter()
                    .map(|e| format_bullet(&e.message, &e.link, Category::Bluesky))
                    .collect(),
            });
        }
        groups
    }

    /// One bullet per repository: its latest release inside the window
    pub async fn github_groups(&self, repos: &[String]) -> Vec<SourceGroup> {
        let mut bullets = Vec::new();
        for repo in repos {
            let feed_url = format!("https://github.com/{}/releases.atom", repo);
            let Some(feed) = self.fetch_feed(&feed_url).await else {
                continue;
            };
            let Some(release) = self.window.latest(feed.entries) else {
                continue;
            };

            let link = if release.link.is_empty() {
                format!("https://github.com/{}/releases", repo)
            } else {
                release.link.clone()
            };
            bullets.push(format_bullet(
                &release_message(repo, &release),
                &link,
                Category::GitHubReleases,
            ));
        }

        vec![SourceGroup {
            heading: None,
            bullets,
        }]
    }

    pub async fn build(
        &self,
        bluesky: &[SourceDescriptor],
        repos: &[String],
        blogs: &[SourceDescriptor],
        youtube: &[SourceDescriptor],
    ) -> DigestDocument {
        let mut document = DigestDocument::default();
        document.push(Category::Blogs, self.blog_groups(blogs).await);
        document.push(Category::YouTube, self.youtube_groups(youtube).await);
        document.push(Category::Bluesky, self.bluesky_groups(bluesky).await);
        document.push(Category::GitHubReleases, self.github_groups(repos).await);

        for section in document.sections() {
            info!(
                "{}: {} entries",
                section.category.heading(),
                section.groups.iter().map(|g| g.bullets.len()).sum::<usize>()
            );
        }
        document
    }

    pub async fn render(
        &self,
        bluesky: &[SourceDescriptor],
        repos: &[String],
        blogs: &[SourceDescriptor],
        youtube: &[SourceDescriptor],
    ) -> String {
        self.build(bluesky, repos, blogs, youtube)
            .await
            .to_markdown()
    }
}
