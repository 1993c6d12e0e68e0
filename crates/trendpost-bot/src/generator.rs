use std::time::Duration;

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use scraper::Html;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt, Snafu};
use tracing::{debug, info, warn};
use trendpost_core::CandidateItem;
use trendpost_core::item::format_date;

use crate::LOG_TARGET;
use crate::http::{self, HttpError};

pub const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// A first line longer than this is prose, not a title.
pub const MAX_TITLE_CHARS: usize = 120;

#[derive(Debug, Snafu)]
pub enum GeneratorError {
    #[snafu(display("HTTP request failed: {source}"))]
    Http { source: HttpError },
    #[snafu(display("Generation API returned no text"))]
    EmptyReply,
}

pub type GeneratorResult<T> = std::result::Result<T, GeneratorError>;

#[async_trait::async_trait]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> GeneratorResult<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-style `chat/completions` endpoint.
///
/// The call is not retried: every attempt is billed and produces a
/// different article.
pub struct ChatCompletionsClient {
    client: Client,
    api_url: String,
    api_key: String,
    params: GenerationParams,
}

impl ChatCompletionsClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        params: GenerationParams,
    ) -> GeneratorResult<Self> {
        let client = http::build_client(crate::USER_AGENT, GENERATION_TIMEOUT).context(HttpSnafu)?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            params,
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> GeneratorResult<String> {
        let url = self.api_url.as_str();
        let request = ChatRequest {
            model: &self.params.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            stream: false,
        };

        info!(target: LOG_TARGET, model = %self.params.model, "Requesting article generation");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context(http::TransportSnafu { url })
            .context(HttpSnafu)?;
        let response = http::ensure_success(url, response).await.context(HttpSnafu)?;
        let reply: ChatResponse = http::read_json(url, response).await.context(HttpSnafu)?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .context(EmptyReplySnafu)?;

        debug!(target: LOG_TARGET, chars = text.chars().count(), "Generation API replied");
        Ok(text)
    }
}

pub fn build_prompt(item: &CandidateItem) -> String {
    let stars = item
        .stars
        .as_deref()
        .map(|s| format!("\n- Stars: {s}"))
        .unwrap_or_default();

    format!(
        "Write a technical blog post for today's GitHub Trending daily pick.

Project details:
- Name: {name}
- URL: {url}
- Description: {desc}{stars}
- Date: {date}

Requirements:
1. 800-1200 words.
2. The very first line is the article title, it must contain the project name.
3. Cover: introduction and background, key features, likely tech stack, use cases, summary and outlook.
4. Professional but approachable technical language.
5. Format the body with HTML tags such as <p>, <h2>, <h3>, <code>, <strong>. Do not use Markdown.

Reply with the article only, no extra commentary.
",
        name = item.name,
        url = item.url,
        desc = item.desc,
        date = format_date(item.date),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPost {
    pub title: String,
    pub body: String,
}

pub fn default_title(item: &CandidateItem) -> String {
    format!("{}: GitHub Trending daily pick", item.name)
}

/// Drop a Markdown code fence wrapped around the whole reply.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Skip the info string (```html) on the opening line.
    match rest.split_once('\n') {
        Some((_info, inner)) => inner.trim(),
        None => rest.trim(),
    }
}

fn clean_title(line: &str) -> String {
    let text: String = Html::parse_fragment(line)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let text = text.trim_start_matches('#').trim();
    let text = text
        .strip_prefix("Title:")
        .or_else(|| text.strip_prefix("标题："))
        .or_else(|| text.strip_prefix("标题:"))
        .unwrap_or(text)
        .trim();
    text.trim_matches(|c| matches!(c, '*' | '_' | '"' | '\'' | '“' | '”' | '《' | '》'))
        .trim()
        .to_owned()
}

/// Split a generation reply into title (first non-empty line) and body.
///
/// Never fails: when the reply has no usable title line the default title is
/// used and the whole reply becomes the body.
pub fn split_title_body(reply: &str, item: &CandidateItem) -> GeneratedPost {
    let text = strip_code_fence(reply);

    let mut lines = text.splitn(2, '\n');
    let first = lines.next().unwrap_or_default();
    let rest = lines.next().unwrap_or_default().trim();

    let title = clean_title(first);
    if !title.is_empty() && title.chars().count() <= MAX_TITLE_CHARS && !rest.is_empty() {
        return GeneratedPost {
            title,
            body: rest.to_owned(),
        };
    }

    warn!(target: LOG_TARGET, name = %item.name, "No usable title line in reply, using default title");
    GeneratedPost {
        title: default_title(item),
        body: text.to_owned(),
    }
}

#[cfg(test)]
mod tests;
