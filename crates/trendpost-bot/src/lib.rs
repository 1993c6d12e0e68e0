//! The three stages of the trending-post pipeline and the upstream clients
//! they talk to.
//!
//! Stages hand data to each other through JSON files, so each one can run
//! (and be retried) on its own.

pub mod generator;
pub mod halo;
pub mod http;
pub mod publisher;
pub mod retry;
pub mod scraper;

use std::path::Path;

use snafu::{ResultExt, Snafu};
use time::{Date, OffsetDateTime};
use tracing::info;
use trendpost_core::dedup::select_first_unseen;
use trendpost_core::handoff::{self, HandoffError};
use trendpost_core::seen_log::{SeenLog, SeenLogError};
use trendpost_core::{CandidateItem, PostRecord};

use crate::generator::{GeneratorError, TextGenerator, build_prompt, split_title_body};
use crate::halo::{HaloClient, HaloError};
use crate::publisher::{PublishedPost, PublisherError};
use crate::scraper::{Scraper, ScraperError};

pub const PROJECT_NAME: &str = "trendpost-bot";
pub const LOG_TARGET: &str = "trendpost_bot::main";

/// Sent to the APIs that do not need to think we are a browser.
pub const USER_AGENT: &str = concat!("trendpost-bot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BotError {
    #[snafu(display("Handoff error: {source}"))]
    Handoff { source: HandoffError },
    #[snafu(display("{name} is required for this stage"))]
    MissingCredential { name: &'static str },
    #[snafu(display("Seen-log error: {source}"))]
    SeenLog { source: SeenLogError },
    #[snafu(display("Scraper error: {source}"))]
    Scrape { source: ScraperError },
    #[snafu(display("Generator error: {source}"))]
    Generate { source: GeneratorError },
    #[snafu(display("Publisher error: {source}"))]
    Publish { source: PublisherError },
    #[snafu(display("Content API client error: {source}"))]
    ContentApi { source: HaloError },
    #[snafu(display("Logging initialization failed"))]
    Logging,
}

pub type BotResult<T> = std::result::Result<T, BotError>;

/// Unwrap a credential option; blank values count as missing.
pub fn require_credential(name: &'static str, value: Option<String>) -> BotResult<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        _ => MissingCredentialSnafu { name }.fail(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectOutcome {
    Selected(CandidateItem),
    /// Every listed item was handed downstream before.
    NothingNew,
}

/// Scrape the listing and hand the first unseen item to the generator.
///
/// The item is recorded in the seen-log before the candidate file is
/// written. When nothing is new, a leftover candidate file from an earlier
/// run is removed so the generator does not pick it up again.
pub async fn run_collect<S>(
    scraper: &S,
    seen_log: &mut SeenLog,
    candidate_file: &Path,
    today: Date,
) -> BotResult<CollectOutcome>
where
    S: Scraper + ?Sized,
{
    let candidates = scraper.scrape_listing().await.context(ScrapeSnafu)?;
    info!(
        target: LOG_TARGET,
        candidates = candidates.len(),
        seen = seen_log.len(),
        "Selecting first unseen repository"
    );

    let Some(item) = select_first_unseen(&candidates, seen_log, today).context(SeenLogSnafu)? else {
        if handoff::remove_stale(candidate_file).context(HandoffSnafu)? {
            info!(target: LOG_TARGET, path = %candidate_file.display(), "Removed stale candidate file");
        }
        info!(target: LOG_TARGET, "No new repository today");
        return Ok(CollectOutcome::NothingNew);
    };

    handoff::write_json(candidate_file, &item).context(HandoffSnafu)?;
    info!(
        target: LOG_TARGET,
        name = %item.name,
        url = %item.url,
        path = %candidate_file.display(),
        "Selected repository"
    );

    Ok(CollectOutcome::Selected(item))
}

/// Turn the candidate file into a post record.
pub async fn run_generate<G>(
    generator: &G,
    candidate_file: &Path,
    post_file: &Path,
    categories: Vec<String>,
    tags: Vec<String>,
    now: OffsetDateTime,
) -> BotResult<PostRecord>
where
    G: TextGenerator + ?Sized,
{
    let item: CandidateItem = handoff::read_json(candidate_file).context(HandoffSnafu)?;
    info!(target: LOG_TARGET, name = %item.name, url = %item.url, "Generating article");

    let reply = generator
        .generate(&build_prompt(&item))
        .await
        .context(GenerateSnafu)?;
    let post = split_title_body(&reply, &item);

    let record = PostRecord {
        title: post.title,
        content: post.body,
        source: item,
        categories,
        tags,
        generated_at: now,
    };
    handoff::write_json(post_file, &record).context(HandoffSnafu)?;

    info!(
        target: LOG_TARGET,
        title = %record.title,
        chars = record.content.chars().count(),
        path = %post_file.display(),
        "Wrote post record"
    );
    Ok(record)
}

/// Publish the post record.
pub async fn run_publish(halo: &HaloClient, post_file: &Path) -> BotResult<PublishedPost> {
    let record: PostRecord = handoff::read_json(post_file).context(HandoffSnafu)?;
    info!(target: LOG_TARGET, name = %record.source.name, title = %record.title, "Publishing post");

    publisher::publish(halo, &record).await.context(PublishSnafu)
}
