use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::SummarizerConfig;
use crate::io::write_markdown;

const SYSTEM_PROMPT: &str = "Summarize the text to fit within the requested character limit. \
Preserve key details, names, and links mentioned in the text. \
Return plain text only.";

/// Result of one call to the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(String),
    Retryable {
        reason: String,
        retry_after: Option<Duration>,
    },
    Fatal(String),
}

impl CallOutcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        CallOutcome::Retryable {
            reason: reason.into(),
            retry_after: None,
        }
    }
}

/// A chat-completion backend that shortens `text` to about `max_chars`
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, text: &str, max_chars: usize) -> CallOutcome;
}

#[async_trait]
impl<'a, C: Completion + ?Sized> Completion for &'a C {
    async fn complete(&self, text: &str, max_chars: usize) -> CallOutcome {
        (**self).complete(text, max_chars).await
    }
}

/// Limits for one summarization run
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub min_interval: Duration,
    pub max_input_chars: usize,
    pub max_calls: usize,
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            min_interval: Duration::from_secs(1),
            max_input_chars: 10_000,
            max_calls: 50,
        }
    }
}

impl SummaryPolicy {
    /// `retry_delay * 2^attempt`, attempt counted from zero
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn looks_rate_limited(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["rate limit", "rate_limit", "ratelimit", "too many requests"]
        .iter()
        .any(|cue| lower.contains(cue))
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Rate limits, timeouts and server errors are worth retrying; other
/// client errors will not get better.
pub fn classify_failure(status: StatusCode, body: &str, retry_after: Option<Duration>) -> CallOutcome {
    let reason = format!("HTTP {}: {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
        || looks_rate_limited(body)
    {
        CallOutcome::Retryable {
            reason,
            retry_after,
        }
    } else {
        CallOutcome::Fatal(reason)
    }
}

/// Chat completions against GitHub Models (or any compatible endpoint)
pub struct GitHubModelsClient {
    client: Client,
    token: String,
    model: String,
    endpoint: String,
}

impl GitHubModelsClient {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        // The per-call deadline is enforced by EntrySummarizer
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            token: config.token.clone(),
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }
}

/// Request body for one summarization call
fn chat_request<'a>(model: &'a str, text: &str, max_chars: usize) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            Message {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: format!("Limit: {} characters.\nText: {}", max_chars, text),
            },
        ],
        temperature: 0.2,
        max_tokens: 200,
    }
}

/// Content of the first choice. A 2xx body that is not a chat response
/// will not decode on a retry either.
fn parse_completion(body: &[u8]) -> CallOutcome {
    match serde_json::from_slice::<ChatResponse>(body) {
        Ok(parsed) => CallOutcome::Success(
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message)
                .and_then(|m| m.content)
                .unwrap_or_default(),
        ),
        Err(e) => CallOutcome::Fatal(format!("unreadable response: {}", e)),
    }
}

impl GitHubModelsClient {
    fn build_request(&self, text: &str, max_chars: usize) -> reqwest::Result<reqwest::Request> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&chat_request(&self.model, text, max_chars))
            .build()
    }
}

#[async_trait]
impl Completion for GitHubModelsClient {
    async fn complete(&self, text: &str, max_chars: usize) -> CallOutcome {
        let request = match self.build_request(text, max_chars) {
            Ok(request) => request,
            Err(e) => return CallOutcome::Fatal(format!("could not build request: {}", e)),
        };

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => return CallOutcome::retryable(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return classify_failure(status, &body, retry_after);
        }

        match response.bytes().await {
            Ok(body) => parse_completion(&body),
            Err(e) => CallOutcome::retryable(format!("response interrupted: {}", e)),
        }
    }
}

/// Keeps calls at least `min_interval` apart
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            tokio::time::sleep_until(last + self.min_interval).await;
        }
        self.last_call = Some(Instant::now());
    }
}

/// What happened to one line of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    Unchanged,
    Summarized,
    OverBudget,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub summarized: usize,
    pub over_budget: usize,
    pub failed: usize,
}

impl SummaryReport {
    fn record(&mut self, action: LineAction) {
        match action {
            LineAction::Summarized => self.summarized += 1,
            LineAction::OverBudget => self.over_budget += 1,
            LineAction::Failed => self.failed += 1,
            LineAction::Unchanged => {}
        }
    }
}

/// Start of a ` [label](url)` link ending `body`. The url may contain
/// balanced parentheses but no whitespace.
fn trailing_link_start(body: &str) -> Option<usize> {
    if !body.ends_with(')') {
        return None;
    }

    let mut depth = 0usize;
    let mut open = None;
    for (idx, c) in body.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth == 0 {
                    open = Some(idx);
                    break;
                }
            }
            c if c.is_whitespace() => return None,
            _ => {}
        }
    }

    let before = body[..open?].strip_suffix(']')?;
    let label_start = before.rfind('[')?;
    if before[label_start + 1..].contains(']') {
        return None;
    }
    before[..label_start].strip_suffix(' ')?;
    Some(label_start - 1)
}

/// Split a bullet body into its message and the trailing `[label](url)`
/// links, which are returned with their leading space.
pub fn split_link_suffix(body: &str) -> (&str, &str) {
    let mut end = body.len();
    while let Some(start) = trailing_link_start(&body[..end]) {
        end = start;
    }
    (&body[..end], &body[end..])
}

fn truncate_chars(text: &str, max: usize) -> String {
    let mut truncated: String = text.chars().take(max).collect();
    truncated.push('…');
    truncated
}

fn truncate_input(text: &str, max_input_chars: usize) -> String {
    if text.chars().count() > max_input_chars {
        truncate_chars(text, max_input_chars)
    } else {
        text.to_string()
    }
}

/// Single line, no wrapping quotes, at most `max_chars` characters
fn fit_summary(raw: &str, max_chars: usize) -> String {
    let summary = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let summary = summary.trim_matches('"').trim();
    if summary.chars().count() > max_chars {
        truncate_chars(summary, max_chars.saturating_sub(1))
    } else {
        summary.to_string()
    }
}

/// Rewrites over-long bullets through a completion backend, one call at a time
pub struct EntrySummarizer<C: Completion> {
    backend: C,
    policy: SummaryPolicy,
    pacer: Pacer,
    calls_used: usize,
}

impl<C: Completion> EntrySummarizer<C> {
    pub fn new(backend: C, policy: SummaryPolicy) -> Self {
        Self {
            backend,
            pacer: Pacer::new(policy.min_interval),
            policy,
            calls_used: 0,
        }
    }

    /// Summarize with retries. `None` means keep the original text.
    pub async fn summarize_text(&mut self, text: &str, max_chars: usize) -> Option<String> {
        let input = truncate_input(text, self.policy.max_input_chars);
        let attempts = self.policy.max_retries.max(1);

        for attempt in 0..attempts {
            self.pacer.wait().await;

            let call = self.backend.complete(&input, max_chars);
            let outcome = match tokio::time::timeout(self.policy.timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => CallOutcome::retryable(format!("timed out after {:?}", self.policy.timeout)),
            };

            match outcome {
                CallOutcome::Success(content) => {
                    let summary = fit_summary(&content, max_chars);
                    if summary.is_empty() {
                        warn!("summarization returned no text, keeping original");
                        return None;
                    }
                    return Some(summary);
                }
                CallOutcome::Fatal(reason) => {
                    warn!("summarization failed: {}", reason);
                    return None;
                }
                CallOutcome::Retryable {
                    reason,
                    retry_after,
                } => {
                    if attempt + 1 >= attempts {
                        warn!(
                            "summarization failed after {} attempts: {}",
                            attempts, reason
                        );
                        return None;
                    }
                    let delay = retry_after.unwrap_or_else(|| self.policy.backoff(attempt));
                    warn!(
                        "summarization attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        None
    }

    pub async fn summarize_line(&mut self, line: &str, max_chars: usize) -> (String, LineAction) {
        let Some(body) = line.strip_prefix("- ") else {
            return (line.to_string(), LineAction::Unchanged);
        };

        let (message, links) = split_link_suffix(body);
        let text = message.trim();
        if text.chars().count() <= max_chars {
            return (line.to_string(), LineAction::Unchanged);
        }

        if self.calls_used >= self.policy.max_calls {
            info!(
                "call budget of {} reached, leaving entry unsummarized",
                self.policy.max_calls
            );
            return (line.to_string(), LineAction::OverBudget);
        }
        self.calls_used += 1;

        debug!("summarizing entry of {} characters", text.chars().count());
        match self.summarize_text(text, max_chars).await {
            Some(summary) => (format!("- \"{}\"{}", summary, links), LineAction::Summarized),
            None => (line.to_string(), LineAction::Failed),
        }
    }

    pub async fn summarize_document(
        &mut self,
        content: &str,
        max_chars: usize,
    ) -> (String, SummaryReport) {
        let mut report = SummaryReport::default();
        let mut lines = Vec::new();

        for line in content.lines() {
            let (updated, action) = self.summarize_line(line, max_chars).await;
            report.record(action);
            lines.push(updated);
        }

        (format!("{}\n", lines.join("\n").trim_end()), report)
    }

    /// Rewrite a Markdown file in place
    pub async fn summarize_file(&mut self, path: &Path, max_chars: usize) -> Result<SummaryReport> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let (updated, report) = self.summarize_document(&content, max_chars).await;
        write_markdown(path, &updated)?;

        info!(
            "{}: {} summarized, {} over budget, {} failed",
            path.display(),
            report.summarized,
            report.over_budget,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back canned outcomes, then echoes a fixed summary
    #[derive(Default)]
    struct ScriptedCompletion {
        script: Mutex<VecDeque<CallOutcome>>,
        hang_first: bool,
        calls: Mutex<Vec<(Instant, String)>>,
    }

    impl ScriptedCompletion {
        fn new(script: Vec<CallOutcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
        }

        fn inputs(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
        }
    }

    #[async_trait]
    impl Completion for ScriptedCompletion {
        async fn complete(&self, text: &str, _max_chars: usize) -> CallOutcome {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((Instant::now(), text.to_string()));
                calls.len() == 1
            };
            if self.hang_first && first {
                std::future::pending::<()>().await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| CallOutcome::Success("Short summary".to_string()))
        }
    }

    fn policy() -> SummaryPolicy {
        SummaryPolicy::default()
    }

    fn long_text(len: usize) -> String {
        "x".repeat(len)
    }

    fn rate_limited() -> CallOutcome {
        CallOutcome::Retryable {
            reason: "HTTP 429 Too Many Requests".into(),
            retry_after: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn short_bullets_make_no_call() {
        let backend = ScriptedCompletion::new(vec![]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        let line = format!("- {} [Article](http://x)", long_text(250));

        let (out, action) = summarizer.summarize_line(&line, 300).await;
        assert_eq!(out, line);
        assert_eq!(action, LineAction::Unchanged);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn long_bullet_keeps_link_suffix() {
        let backend = ScriptedCompletion::new(vec![]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        let line = format!("- {} [Article](http://x)", long_text(250));

        let (out, action) = summarizer.summarize_line(&line, 100).await;
        assert_eq!(out, "- \"Short summary\" [Article](http://x)");
        assert_eq!(action, LineAction::Summarized);
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.inputs(), vec![long_text(250)]);
    }

    #[tokio::test(start_paused = true)]
    async fn call_budget_limits_summaries() {
        let backend = ScriptedCompletion::new(vec![]);
        let mut summarizer = EntrySummarizer::new(
            &backend,
            SummaryPolicy {
                max_calls: 2,
                ..policy()
            },
        );
        let content: String = (0..5)
            .map(|i| format!("- {}{} [Post](http://p/{})\n", i, long_text(50), i))
            .collect();

        let (out, report) = summarizer.summarize_document(&content, 20).await;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "- \"Short summary\" [Post](http://p/0)");
        assert_eq!(lines[1], "- \"Short summary\" [Post](http://p/1)");
        for i in 2..5 {
            assert_eq!(lines[i], format!("- {}{} [Post](http://p/{})", i, long_text(50), i));
        }
        assert_eq!(
            report,
            SummaryReport {
                summarized: 2,
                over_budget: 3,
                failed: 0,
            }
        );
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_back_off_exponentially() {
        let backend = ScriptedCompletion::new(vec![rate_limited(), rate_limited()]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());

        let summary = summarizer.summarize_text(&long_text(500), 100).await;
        assert_eq!(summary.as_deref(), Some("Short summary"));

        let times = backend.call_times();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_secs(2));
        assert!(times[2] - times[1] >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_overrides_backoff() {
        let backend = ScriptedCompletion::new(vec![CallOutcome::Retryable {
            reason: "rate limit".into(),
            retry_after: Some(Duration::from_secs(30)),
        }]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());

        assert!(summarizer.summarize_text("text", 2).await.is_some());
        let times = backend.call_times();
        assert!(times[1] - times[0] >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_keep_the_original_line() {
        let backend =
            ScriptedCompletion::new(vec![rate_limited(), rate_limited(), rate_limited()]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        let line = format!("- {} [Article](http://x)", long_text(200));

        let (out, action) = summarizer.summarize_line(&line, 100).await;
        assert_eq!(out, line);
        assert_eq!(action, LineAction::Failed);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failures_are_not_retried() {
        let backend = ScriptedCompletion::new(vec![CallOutcome::Fatal("HTTP 401".into())]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        assert_eq!(summarizer.summarize_text(&long_text(200), 100).await, None);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_call_is_retried_with_a_fresh_call() {
        let backend = ScriptedCompletion {
            hang_first: true,
            ..Default::default()
        };
        let mut summarizer = EntrySummarizer::new(&backend, policy());

        let summary = summarizer.summarize_text(&long_text(200), 100).await;
        assert_eq!(summary.as_deref(), Some("Short summary"));

        let times = backend.call_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_summary_keeps_the_original() {
        let backend = ScriptedCompletion::new(vec![CallOutcome::Success("   \n ".into())]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        let line = format!("- {}", long_text(200));

        let (out, action) = summarizer.summarize_line(&line, 100).await;
        assert_eq!(out, line);
        assert_eq!(action, LineAction::Failed);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_are_spaced_by_min_interval() {
        let backend = ScriptedCompletion::new(vec![]);
        let mut summarizer = EntrySummarizer::new(
            &backend,
            SummaryPolicy {
                min_interval: Duration::from_secs(5),
                ..policy()
            },
        );

        summarizer.summarize_text("a", 10).await;
        summarizer.summarize_text("b", 10).await;
        let times = backend.call_times();
        assert!(times[1] - times[0] >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_input_and_output_are_truncated() {
        let backend = ScriptedCompletion::new(vec![CallOutcome::Success(long_text(40))]);
        let mut summarizer = EntrySummarizer::new(
            &backend,
            SummaryPolicy {
                max_input_chars: 10,
                ..policy()
            },
        );

        let summary = summarizer.summarize_text(&long_text(50), 20).await.unwrap();
        assert_eq!(summary, format!("{}…", long_text(19)));
        assert_eq!(summary.chars().count(), 20);
        assert_eq!(backend.inputs(), vec![format!("{}…", long_text(10))]);
    }

    #[test]
    fn link_suffix_split_keeps_every_trailing_link() {
        assert_eq!(
            split_link_suffix("Some text [Article](http://x) [Bsky](https://bsky.app/intent/compose?text=a+b)"),
            (
                "Some text",
                " [Article](http://x) [Bsky](https://bsky.app/intent/compose?text=a+b)"
            )
        );
        assert_eq!(split_link_suffix("no links here"), ("no links here", ""));
        assert_eq!(
            split_link_suffix("see [docs](http://d) for more"),
            ("see [docs](http://d) for more", "")
        );
    }

    #[test]
    fn link_suffix_split_handles_parentheses_in_urls() {
        let body = "Some text [Article](https://en.wikipedia.org/wiki/Rust_(programming_language)) [Bsky](https://bsky.app/intent/compose?text=a%28b%29)";
        assert_eq!(
            split_link_suffix(body),
            (
                "Some text",
                " [Article](https://en.wikipedia.org/wiki/Rust_(programming_language)) [Bsky](https://bsky.app/intent/compose?text=a%28b%29)"
            )
        );
        assert_eq!(
            split_link_suffix("ends in a remark (really)"),
            ("ends in a remark (really)", "")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn parenthesized_link_is_never_sent_for_summarization() {
        let backend = ScriptedCompletion::new(vec![]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        let links = " [Article](https://en.wikipedia.org/wiki/Rust_(programming_language)) [Bsky](https://bsky.app/intent/compose?text=a%28b%29)";
        let line = format!("- {}{}", long_text(200), links);

        let (out, action) = summarizer.summarize_line(&line, 100).await;
        assert_eq!(action, LineAction::Summarized);
        assert_eq!(out, format!("- \"Short summary\"{}", links));
        assert_eq!(backend.inputs(), vec![long_text(200)]);
    }

    fn client() -> GitHubModelsClient {
        GitHubModelsClient::new(&SummarizerConfig {
            token: "secret".into(),
            model: "openai/gpt-5-nano".into(),
            endpoint: "https://models.example/chat/completions".into(),
            policy: policy(),
        })
        .unwrap()
    }

    #[test]
    fn request_carries_auth_headers_and_prompt() {
        let request = client().build_request("Long text", 120).unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://models.example/chat/completions"
        );

        let headers = request.headers();
        assert_eq!(headers["authorization"], "Bearer secret");
        assert_eq!(headers["accept"], "application/vnd.github+json");
        assert_eq!(headers["x-github-api-version"], "2022-11-28");

        let body: serde_json::Value =
            serde_json::from_slice(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["model"], "openai/gpt-5-nano");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(
            body["messages"][1]["content"],
            "Limit: 120 characters.\nText: Long text"
        );
    }

    #[test]
    fn completion_body_is_parsed() {
        assert_eq!(
            parse_completion(br#"{"choices":[{"message":{"content":"Short"}},{"message":{"content":"Other"}}]}"#),
            CallOutcome::Success("Short".into())
        );
        assert_eq!(
            parse_completion(br#"{"choices":[]}"#),
            CallOutcome::Success(String::new())
        );
        assert_eq!(
            parse_completion(br#"{"choices":[{"message":{"content":null}}]}"#),
            CallOutcome::Success(String::new())
        );
        assert!(matches!(
            parse_completion(b"<html>gateway</html>"),
            CallOutcome::Fatal(_)
        ));
    }

    #[test]
    fn retry_after_header_is_read_in_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, reqwest::header::HeaderValue::from_static(" 7 "));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(
            RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn failures_are_classified() {
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "", Some(Duration::from_secs(3))),
            CallOutcome::Retryable {
                reason: "HTTP 429 Too Many Requests: ".into(),
                retry_after: Some(Duration::from_secs(3)),
            }
        );
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, "Rate limit exceeded", None),
            CallOutcome::Retryable { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, "", None),
            CallOutcome::Retryable { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "Bad credentials", None),
            CallOutcome::Fatal(_)
        ));
    }

    #[test]
    fn backoff_doubles() {
        let policy = policy();
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn summarize_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2024-03-14.md");
        let original = format!(
            "## Blogs\n\n### Example\n\n- {} [Article](http://x)\n- short [Article](http://y)\n\n\n",
            long_text(150)
        );
        fs::write(&path, &original).unwrap();

        let backend = ScriptedCompletion::new(vec![]);
        let mut summarizer = EntrySummarizer::new(&backend, policy());
        let report = summarizer.summarize_file(&path, 100).await.unwrap();

        assert_eq!(report.summarized, 1);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "## Blogs\n\n### Example\n\n- \"Short summary\" [Article](http://x)\n- short [Article](http://y)\n"
        );
    }
}
