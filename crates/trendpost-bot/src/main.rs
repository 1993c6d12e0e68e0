use std::io;
use std::path::PathBuf;

use clap::Parser;
use snafu::ResultExt as _;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trendpost_bot::generator::{
    ChatCompletionsClient, DEEPSEEK_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, GenerationParams,
};
use trendpost_bot::halo::HaloClient;
use trendpost_bot::scraper::{Scraper as _, TRENDING_URL, TrendingScraper};
use trendpost_bot::{
    BotError, BotResult, CollectOutcome, ContentApiSnafu, GenerateSnafu, LOG_TARGET, ScrapeSnafu,
    SeenLogSnafu, require_credential, run_collect, run_generate, run_publish,
};
use trendpost_core::item::{default_categories, default_tags, format_date, today_utc};
use trendpost_core::seen_log::SeenLog;
use trendpost_core::slug::post_slug;
use trendpost_util_fmt::AsFmtOption as _;
use url::Url;

/// Trending-repository post pipeline: collect, generate, publish
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Parser)]
pub enum Command {
    /// Pick today's first unseen trending repository
    Collect {
        /// Record of repositories already handed downstream
        #[arg(long, env = "TRENDPOST_SEEN_LOG", default_value = "github_seen.csv")]
        seen_log: PathBuf,

        #[arg(long, env = "TRENDPOST_CANDIDATE_FILE", default_value = "github_daily.json")]
        candidate_file: PathBuf,

        #[arg(long, env = "TRENDPOST_LISTING_URL", default_value = TRENDING_URL)]
        listing_url: Url,
    },

    /// Write an article about the picked repository
    Generate {
        #[arg(long, env = "TRENDPOST_CANDIDATE_FILE", default_value = "github_daily.json")]
        candidate_file: PathBuf,

        #[arg(long, env = "TRENDPOST_POST_FILE", default_value = "generated_post.json")]
        post_file: PathBuf,

        #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        #[arg(long, env = "DEEPSEEK_API_URL", default_value = DEEPSEEK_API_URL)]
        api_url: String,

        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,

        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        max_tokens: u32,

        /// Category display name (repeatable, defaults apply when none given)
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Tag display name (repeatable, defaults apply when none given)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Publish the generated article to the blog
    Publish {
        #[arg(long, env = "TRENDPOST_POST_FILE", default_value = "generated_post.json")]
        post_file: PathBuf,

        #[arg(long, env = "HALO_URL")]
        halo_url: Option<String>,

        #[arg(long, env = "HALO_TOKEN", hide_env_values = true)]
        halo_token: Option<String>,
    },

    /// Development commands
    Dev {
        #[command(subcommand)]
        dev_command: DevCommand,
    },
}

#[derive(Debug, Parser)]
pub enum DevCommand {
    /// Fetch and print the parsed listing, touching no files
    Scrape {
        #[arg(long, env = "TRENDPOST_LISTING_URL", default_value = TRENDING_URL)]
        listing_url: Url,
    },
    /// Print the post identifier for a repository name and date
    Slug {
        name: String,
        #[arg(value_parser = parse_date)]
        date: Date,
    },
}

fn parse_date(s: &str) -> Result<Date, time::error::Parse> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
}

#[snafu::report]
#[tokio::main]
async fn main() -> BotResult<()> {
    init_logging()?;

    let opts = Opts::parse();

    match opts.command {
        Command::Collect {
            seen_log,
            candidate_file,
            listing_url,
        } => {
            let mut seen_log = SeenLog::open(seen_log).context(SeenLogSnafu)?;
            let scraper = TrendingScraper::new(listing_url).context(ScrapeSnafu)?;

            match run_collect(&scraper, &mut seen_log, &candidate_file, today_utc()).await? {
                CollectOutcome::Selected(item) => {
                    info!(target: LOG_TARGET, name = %item.name, "Collect stage done");
                }
                CollectOutcome::NothingNew => {
                    warn!(target: LOG_TARGET, "Nothing new on the listing, downstream stages have no input");
                }
            }
            Ok(())
        }
        Command::Generate {
            candidate_file,
            post_file,
            api_key,
            api_url,
            model,
            temperature,
            max_tokens,
            categories,
            tags,
        } => {
            let api_key = require_credential("DEEPSEEK_API_KEY", api_key)?;
            info!(target: LOG_TARGET, %api_url, %model, "Generation API configured");

            let generator = ChatCompletionsClient::new(
                api_url,
                api_key,
                GenerationParams {
                    model,
                    temperature,
                    max_tokens,
                },
            )
            .context(GenerateSnafu)?;

            let categories = if categories.is_empty() {
                default_categories()
            } else {
                categories
            };
            let tags = if tags.is_empty() { default_tags() } else { tags };

            run_generate(
                &generator,
                &candidate_file,
                &post_file,
                categories,
                tags,
                OffsetDateTime::now_utc(),
            )
            .await?;
            Ok(())
        }
        Command::Publish {
            post_file,
            halo_url,
            halo_token,
        } => {
            let halo_url = require_credential("HALO_URL", halo_url)?;
            let halo_token = require_credential("HALO_TOKEN", halo_token)?;
            info!(target: LOG_TARGET, %halo_url, "Content API configured");

            let halo = HaloClient::new(&halo_url, halo_token).context(ContentApiSnafu)?;

            let post = run_publish(&halo, &post_file).await?;
            info!(
                target: LOG_TARGET,
                slug = %post.slug,
                publish_time = %post.publish_time,
                "Publish stage done"
            );
            Ok(())
        }
        Command::Dev { dev_command } => handle_dev_command(dev_command).await,
    }
}

async fn handle_dev_command(dev_command: DevCommand) -> BotResult<()> {
    match dev_command {
        DevCommand::Scrape { listing_url } => {
            let scraper = TrendingScraper::new(listing_url).context(ScrapeSnafu)?;
            let items = scraper.scrape_listing().await.context(ScrapeSnafu)?;

            println!("Scraped {} repositories:", items.len());
            println!();
            for (i, item) in items.iter().enumerate() {
                println!("{}. {}", i + 1, item.name);
                println!("  URL: {}", item.url);
                println!("  Description: {}", item.desc);
                println!("  Stars: {}", item.stars.fmt_option());
                println!("  Date: {}", format_date(item.date));
                println!();
            }
            Ok(())
        }
        DevCommand::Slug { name, date } => {
            let slug = post_slug(&name, date);
            println!("{}", slug.slug);
            println!("local date: {}", format_date(slug.local_date));
            Ok(())
        }
    }
}

pub fn init_logging() -> BotResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| BotError::Logging)?;

    Ok(())
}
