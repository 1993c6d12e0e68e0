use snafu::{ResultExt, Snafu, ensure};
use time::{Date, OffsetDateTime};
use tracing::info;
use trendpost_core::PostRecord;
use trendpost_core::classify::{Classification, resolve_classification};
use trendpost_core::slug::{self, PostSlug};
use trendpost_util_fmt::truncate_chars;

use crate::LOG_TARGET;
use crate::halo::{HaloClient, HaloError};

/// Length of the post excerpt, in characters of the source description.
pub const EXCERPT_CHARS: usize = 150;

#[derive(Debug, Snafu)]
pub enum PublisherError {
    #[snafu(display("Post record has an empty {field}"))]
    InvalidRecord { field: &'static str },
    #[snafu(display("Failed to create post: {source}"))]
    Create { source: HaloError },
}

pub type PublisherResult<T> = std::result::Result<T, PublisherError>;

/// Everything that goes into the created post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPost {
    pub title: String,
    pub slug: String,
    pub local_date: Date,
    pub publish_time: OffsetDateTime,
    pub excerpt: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub content: String,
}

pub fn validate(record: &PostRecord) -> PublisherResult<()> {
    ensure!(
        !record.title.trim().is_empty(),
        InvalidRecordSnafu { field: "title" }
    );
    ensure!(
        !record.content.trim().is_empty(),
        InvalidRecordSnafu { field: "content" }
    );
    ensure!(
        !record.source.name.trim().is_empty(),
        InvalidRecordSnafu {
            field: "repo_info.name"
        }
    );
    Ok(())
}

pub fn prepare_post(record: &PostRecord, classification: Classification) -> PublishedPost {
    let PostSlug { slug, local_date } = slug::post_slug(&record.source.name, record.source.date);

    PublishedPost {
        title: record.title.clone(),
        slug,
        local_date,
        publish_time: slug::publish_time(local_date),
        excerpt: truncate_chars(&record.source.desc, EXCERPT_CHARS).to_owned(),
        categories: classification.categories,
        tags: classification.tags,
        content: record.content.clone(),
    }
}

/// Resolve classification, then create the post.
///
/// Classification problems never fail the stage; only the final create does.
pub async fn publish(halo: &HaloClient, record: &PostRecord) -> PublisherResult<PublishedPost> {
    validate(record)?;

    info!(
        target: LOG_TARGET,
        name = %record.source.name,
        categories = ?record.categories,
        tags = ?record.tags,
        "Resolving classification"
    );
    let classification = resolve_classification(halo, &record.categories, &record.tags).await;

    let post = prepare_post(record, classification);
    info!(
        target: LOG_TARGET,
        slug = %post.slug,
        publish_time = %post.publish_time,
        categories = ?post.categories,
        tags = ?post.tags,
        "Prepared post"
    );

    halo.create_post(&post).await.context(CreateSnafu)?;

    info!(target: LOG_TARGET, slug = %post.slug, title = %post.title, "Published post");
    Ok(post)
}
