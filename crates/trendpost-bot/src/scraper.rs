use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use snafu::{ResultExt, Snafu};
use time::Date;
use tracing::{debug, info, warn};
use trendpost_core::CandidateItem;
use trendpost_core::item::today_utc;
use url::Url;

use crate::LOG_TARGET;
use crate::http::{self, HttpError};
use crate::retry::RetryPolicy;

pub const TRENDING_URL: &str = "https://github.com/trending";

/// The listing serves reduced markup to unknown agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

pub const NO_DESCRIPTION: &str = "No description";

#[derive(Debug, Snafu)]
pub enum ScraperError {
    #[snafu(display("HTTP request failed: {source}"))]
    Http { source: HttpError },
    #[snafu(display("Failed to parse HTML selector {selector}"))]
    HtmlParse { selector: &'static str },
}

pub type ScraperResult<T> = std::result::Result<T, ScraperError>;

#[async_trait::async_trait]
pub trait Scraper {
    /// Ranked candidates, freshest first.
    async fn scrape_listing(&self) -> ScraperResult<Vec<CandidateItem>>;
}

pub struct TrendingScraper {
    client: Client,
    listing_url: Url,
    retry: RetryPolicy,
}

impl TrendingScraper {
    pub fn new(listing_url: Url) -> ScraperResult<Self> {
        let client =
            http::build_client(BROWSER_USER_AGENT, LISTING_TIMEOUT).context(HttpSnafu)?;

        Ok(Self {
            client,
            listing_url,
            retry: RetryPolicy::READ,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_listing(&self) -> ScraperResult<String> {
        let url = self.listing_url.as_str();

        self.retry
            .run("fetch listing", || async {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .context(http::TransportSnafu { url })?;
                let response = http::ensure_success(url, response).await?;
                http::read_text(url, response).await
            })
            .await
            .context(HttpSnafu)
    }
}

#[async_trait::async_trait]
impl Scraper for TrendingScraper {
    async fn scrape_listing(&self) -> ScraperResult<Vec<CandidateItem>> {
        info!(target: LOG_TARGET, url = %self.listing_url, "Scraping trending listing");

        let html = self.fetch_listing().await?;
        let items = parse_trending(&html, &self.listing_url, today_utc())?;

        info!(target: LOG_TARGET, count = items.len(), "Scraped trending listing");
        Ok(items)
    }
}

fn selector(selector: &'static str) -> ScraperResult<Selector> {
    Selector::parse(selector).map_err(|_| ScraperError::HtmlParse { selector })
}

/// All text below `element`, whitespace runs collapsed to one space.
fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the trending listing markup.
///
/// Each `article.Box-row` is one repository; relative links are resolved
/// against `base`. Rows without a repository link are skipped.
pub fn parse_trending(html: &str, base: &Url, date: Date) -> ScraperResult<Vec<CandidateItem>> {
    let document = Html::parse_document(html);

    let row_selector = selector("article.Box-row")?;
    let link_selector = selector("h2 a")?;
    let desc_selector = selector("p")?;
    let stars_selector = selector(r#"a[href$="/stargazers"]"#)?;

    let mut items = Vec::new();
    for (rank, row) in document.select(&row_selector).enumerate() {
        let Some(link) = row.select(&link_selector).next() else {
            warn!(target: LOG_TARGET, rank, "No repository link in listing row, skipping");
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            warn!(target: LOG_TARGET, rank, "Repository link without href, skipping");
            continue;
        };
        let url = match base.join(href) {
            Ok(url) => url,
            Err(err) => {
                warn!(target: LOG_TARGET, rank, %href, %err, "Unusable repository link, skipping");
                continue;
            }
        };

        let name: String = link.text().flat_map(str::chars).filter(|c| !c.is_whitespace()).collect();

        let desc = row
            .select(&desc_selector)
            .next()
            .map(collapsed_text)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_owned());

        let stars = row
            .select(&stars_selector)
            .next()
            .map(collapsed_text)
            .filter(|s| !s.is_empty());

        let item = CandidateItem {
            name,
            url: url.to_string(),
            desc,
            stars,
            date,
        };
        debug!(target: LOG_TARGET, rank, name = %item.name, url = %item.url, "Parsed listing row");
        items.push(item);
    }

    Ok(items)
}
