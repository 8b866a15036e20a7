use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

/// `{date}.md`, e.g. `2024-03-14.md`
pub fn digest_filename(date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("{}.md", date.format("%Y-%m-%d")))
}

/// Write Markdown with trailing whitespace trimmed and exactly one final newline
pub fn write_markdown(path: &Path, content: &str) -> Result<()> {
    let normalized = format!("{}\n", content.trim_end());
    fs::write(path, normalized)
        .with_context(|| format!("Failed to write {}", path.display()))
}
