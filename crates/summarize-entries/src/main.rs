use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shared::{
    digest_filename, logging, DayWindow, EntrySummarizer, GitHubModelsClient, SummarizerConfig,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "summarize-entries")]
#[command(about = "Summarize long Markdown entries via GitHub Models")]
struct Args {
    /// Markdown file to process (defaults to <yesterday>.md)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Max characters per entry
    #[arg(long, default_value = "300")]
    max_chars: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();
    let config = SummarizerConfig::from_env()?;

    let path = args
        .file
        .unwrap_or_else(|| digest_filename(DayWindow::previous_day(Utc::now()).date()));

    info!(
        "model {}, at most {} calls, {:?} timeout",
        config.model, config.policy.max_calls, config.policy.timeout
    );

    println!("🤖 Summarizing entries longer than {} characters...", args.max_chars);
    let client = GitHubModelsClient::new(&config)?;
    let mut summarizer = EntrySummarizer::new(client, config.policy.clone());
    let report = summarizer
        .summarize_file(&path, args.max_chars)
        .await
        .with_context(|| format!("Failed to summarize {}", path.display()))?;

    println!(
        "✓ {} summarized, {} left over budget, {} kept after failures",
        report.summarized, report.over_budget, report.failed
    );
    println!("\n✅ Updated: {}", path.display());

    Ok(())
}
