use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shared::{
    bluesky, config, digest_filename, logging, sources, write_markdown, DayWindow,
    DigestGenerator, HttpFetcher,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "generate-digest")]
#[command(about = "Generate a Markdown digest of yesterday's posts, articles, videos and releases")]
struct Args {
    /// Bluesky list URL like https://bsky.app/profile/<handle>/lists/<list_id>
    #[arg(long)]
    list: String,

    /// Path to JSON list of GitHub repositories like owner/name
    #[arg(long)]
    github_input: Option<PathBuf>,

    /// Path to JSON list of blog feed URLs
    #[arg(long)]
    blogs_input: Option<PathBuf>,

    /// Path to JSON list of YouTube channel URLs
    #[arg(long)]
    youtube_input: Option<PathBuf>,

    /// Output Markdown file (defaults to <yesterday>.md)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    config::load_dotenv();
    logging::init();

    // One window for the whole run, even if the clock rolls over midway
    let window = DayWindow::previous_day(Utc::now());
    let output = args
        .output
        .unwrap_or_else(|| digest_filename(window.date()));

    // Configuration problems stop the run before anything is fetched
    let repos = match &args.github_input {
        Some(path) => sources::load_github_repos(path)?,
        None => Vec::new(),
    };
    let blogs = match &args.blogs_input {
        Some(path) => sources::load_blog_feeds(path)?,
        None => Vec::new(),
    };
    let youtube = match &args.youtube_input {
        Some(path) => sources::load_youtube_channels(path)?,
        None => Vec::new(),
    };
    bluesky::parse_list_url(&args.list)?;

    println!(
        "✓ Loaded {} repositories, {} blog feeds, {} YouTube channels",
        repos.len(),
        blogs.len(),
        youtube.len()
    );

    let fetcher = HttpFetcher::new(config::github_feed_token())?;

    println!("\n🦋 Resolving Bluesky list members...");
    let members = bluesky::fetch_list_members(&fetcher, &args.list)
        .await
        .context("Failed to load Bluesky list members")?;
    println!("✓ Found {} members", members.len());

    println!("\n📰 Collecting entries for {}...", window.date());
    let generator = DigestGenerator::new(&fetcher, window);
    let markdown = generator.render(&members, &repos, &blogs, &youtube).await;

    write_markdown(&output, &markdown).context("Failed to save digest")?;
    info!("wrote {} bytes", markdown.len());

    println!("\n✅ Digest saved to: {}", output.display());

    Ok(())
}
