//! Client for the Halo 2.x content API: category/tag catalogs and post
//! creation.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use time::OffsetDateTime;
use tracing::{debug, info};
use trendpost_core::classify::{Catalog, CatalogEntry, ClassificationKind};

use crate::LOG_TARGET;
use crate::http::{self, HttpError};
use crate::publisher::PublishedPost;
use crate::retry::RetryPolicy;

const CATALOG_API: &str = "/apis/content.halo.run/v1alpha1";
const POSTS_API: &str = "/apis/api.console.halo.run/v1alpha1/posts";
const API_VERSION: &str = "content.halo.run/v1alpha1";

/// Page size of catalog listings. Larger catalogs are only partially seen.
pub const CATALOG_PAGE_SIZE: u32 = 100;

const CATALOG_TIMEOUT: Duration = Duration::from_secs(15);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

pub const POST_VISIBILITY: &str = "PUBLIC";

#[derive(Debug, Snafu)]
pub enum HaloError {
    #[snafu(display("Content API request failed: {source}"))]
    Http { source: HttpError },
    #[snafu(display(
        "A post named {slug} already exists. Post identifiers are derived from \
         the repository name and date only, so this item was most likely \
         published before: {source}"
    ))]
    SlugCollision { slug: String, source: HttpError },
}

pub type HaloResult<T> = std::result::Result<T, HaloError>;

impl HaloError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HaloError::Http { source } | HaloError::SlugCollision { source, .. } => source.status(),
        }
    }
}

fn is_duplicate_name(err: &HttpError) -> bool {
    let Some(status) = err.status() else {
        return false;
    };
    if status != StatusCode::BAD_REQUEST && status != StatusCode::CONFLICT {
        return false;
    }
    let body = err.body().unwrap_or_default().to_lowercase();
    ["名称重复", "already exists", "duplicate"]
        .iter()
        .any(|needle| body.contains(needle))
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListedEntry>,
}

#[derive(Debug, Deserialize)]
struct ListedEntry {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    spec: EntrySpec,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntrySpec {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    slug: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewResource<'a, S> {
    api_version: &'static str,
    kind: &'static str,
    metadata: NewMetadata<'a>,
    spec: S,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_name: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTagSpec<'a> {
    display_name: &'a str,
    slug: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewCategorySpec<'a> {
    display_name: &'a str,
    slug: &'a str,
    description: &'static str,
    cover: &'static str,
    template: &'static str,
    priority: u32,
    children: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NewPostRequest<'a> {
    post: NewResource<'a, NewPostSpec<'a>>,
    content: NewPostContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPostSpec<'a> {
    title: &'a str,
    slug: &'a str,
    template: &'static str,
    cover: &'static str,
    deleted: bool,
    publish: bool,
    #[serde(with = "time::serde::rfc3339")]
    publish_time: OffsetDateTime,
    pinned: bool,
    allow_comment: bool,
    visible: &'static str,
    priority: u32,
    excerpt: Excerpt<'a>,
    categories: &'a [String],
    tags: &'a [String],
    html_metas: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Excerpt<'a> {
    auto_generate: bool,
    raw: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewPostContent<'a> {
    raw: &'a str,
    content: &'a str,
    raw_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(default)]
    metadata: Metadata,
}

fn catalog_path(kind: ClassificationKind) -> &'static str {
    match kind {
        ClassificationKind::Category => "categories",
        ClassificationKind::Tag => "tags",
    }
}

pub struct HaloClient {
    client: Client,
    base_url: String,
    token: String,
    read_retry: RetryPolicy,
    publish_retry: RetryPolicy,
}

impl HaloClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> HaloResult<Self> {
        let client = http::build_client(crate::USER_AGENT, PUBLISH_TIMEOUT).context(HttpSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.into(),
            read_retry: RetryPolicy::READ,
            publish_retry: RetryPolicy::PUBLISH,
        })
    }

    pub fn with_retries(mut self, read: RetryPolicy, publish: RetryPolicy) -> Self {
        self.read_retry = read;
        self.publish_retry = publish;
        self
    }

    fn catalog_url(&self, kind: ClassificationKind) -> String {
        format!("{}{CATALOG_API}/{}", self.base_url, catalog_path(kind))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    async fn list_entries(&self, kind: ClassificationKind) -> Result<Vec<CatalogEntry>, HttpError> {
        let url = self.catalog_url(kind);
        let url = url.as_str();

        let list: ListResponse = self
            .read_retry
            .run("list catalog", || async {
                let response = self
                    .authorized(self.client.get(url))
                    .query(&[("size", CATALOG_PAGE_SIZE)])
                    .timeout(CATALOG_TIMEOUT)
                    .send()
                    .await
                    .context(http::TransportSnafu { url })?;
                let response = http::ensure_success(url, response).await?;
                http::read_json(url, response).await
            })
            .await?;

        let entries: Vec<_> = list
            .items
            .into_iter()
            .filter(|item| !item.metadata.name.is_empty())
            .map(|item| CatalogEntry {
                name: item.metadata.name,
                display_name: item.spec.display_name,
                slug: item.spec.slug,
            })
            .collect();

        debug!(target: LOG_TARGET, %kind, count = entries.len(), "Listed catalog");
        Ok(entries)
    }

    async fn create_entry(
        &self,
        kind: ClassificationKind,
        entry: &CatalogEntry,
    ) -> Result<String, HttpError> {
        let url = self.catalog_url(kind);
        let url = url.as_str();
        let metadata = NewMetadata {
            name: &entry.name,
            generate_name: None,
        };
        let slug = if entry.slug.is_empty() {
            entry.name.as_str()
        } else {
            entry.slug.as_str()
        };

        let request = self.authorized(self.client.post(url)).timeout(CATALOG_TIMEOUT);
        let request = match kind {
            ClassificationKind::Category => request.json(&NewResource {
                api_version: API_VERSION,
                kind: "Category",
                metadata,
                spec: NewCategorySpec {
                    display_name: &entry.display_name,
                    slug,
                    description: "",
                    cover: "",
                    template: "",
                    priority: 0,
                    children: vec![],
                },
            }),
            ClassificationKind::Tag => request.json(&NewResource {
                api_version: API_VERSION,
                kind: "Tag",
                metadata,
                spec: NewTagSpec {
                    display_name: &entry.display_name,
                    slug,
                },
            }),
        };

        let response = request.send().await.context(http::TransportSnafu { url })?;
        let response = http::ensure_success(url, response).await?;
        let created: Created = http::read_json(url, response).await?;

        Ok(if created.metadata.name.is_empty() {
            entry.name.clone()
        } else {
            created.metadata.name
        })
    }

    /// Create and publish `post`.
    ///
    /// Retried on transient failures; a duplicate-name rejection is reported
    /// as [`HaloError::SlugCollision`].
    pub async fn create_post(&self, post: &PublishedPost) -> HaloResult<()> {
        let url = format!("{}{POSTS_API}", self.base_url);
        let url = url.as_str();

        let body = NewPostRequest {
            post: NewResource {
                api_version: API_VERSION,
                kind: "Post",
                metadata: NewMetadata {
                    name: &post.slug,
                    generate_name: Some("post-"),
                },
                spec: NewPostSpec {
                    title: &post.title,
                    slug: &post.slug,
                    template: "",
                    cover: "",
                    deleted: false,
                    publish: true,
                    publish_time: post.publish_time,
                    pinned: false,
                    allow_comment: true,
                    visible: POST_VISIBILITY,
                    priority: 0,
                    excerpt: Excerpt {
                        auto_generate: false,
                        raw: &post.excerpt,
                    },
                    categories: &post.categories,
                    tags: &post.tags,
                    html_metas: vec![],
                },
            },
            content: NewPostContent {
                raw: &post.content,
                content: &post.content,
                raw_type: "HTML",
            },
        };

        info!(target: LOG_TARGET, slug = %post.slug, "Creating post");

        let res = self
            .publish_retry
            .run("create post", || async {
                let response = self
                    .authorized(self.client.post(url))
                    .timeout(PUBLISH_TIMEOUT)
                    .json(&body)
                    .send()
                    .await
                    .context(http::TransportSnafu { url })?;
                http::ensure_success(url, response).await
            })
            .await;

        match res {
            Ok(_) => Ok(()),
            Err(source) if is_duplicate_name(&source) => Err(HaloError::SlugCollision {
                slug: post.slug.clone(),
                source,
            }),
            Err(source) => Err(HaloError::Http { source }),
        }
    }
}

#[async_trait::async_trait]
impl Catalog for HaloClient {
    type Error = HaloError;

    async fn list(&self, kind: ClassificationKind) -> HaloResult<Vec<CatalogEntry>> {
        self.list_entries(kind).await.context(HttpSnafu)
    }

    /// Not retried: a timed-out create may still have succeeded.
    async fn create(&self, kind: ClassificationKind, entry: &CatalogEntry) -> HaloResult<String> {
        self.create_entry(kind, entry).await.context(HttpSnafu)
    }
}
