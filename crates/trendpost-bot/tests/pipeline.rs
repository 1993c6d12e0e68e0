use async_trait::async_trait;
use time::macros::{date, datetime};
use trendpost_bot::generator::{GeneratorResult, TextGenerator};
use trendpost_bot::halo::HaloClient;
use trendpost_bot::retry::RetryPolicy;
use trendpost_bot::scraper::{Scraper, ScraperResult};
use trendpost_bot::{BotError, CollectOutcome, require_credential, run_collect, run_generate, run_publish};
use trendpost_core::handoff;
use trendpost_core::item::{default_categories, default_tags};
use trendpost_core::seen_log::SeenLog;
use trendpost_core::{CandidateItem, PostRecord};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock scraper that returns a fixed listing.
struct MockScraper {
    items: Vec<CandidateItem>,
}

#[async_trait]
impl Scraper for MockScraper {
    async fn scrape_listing(&self) -> ScraperResult<Vec<CandidateItem>> {
        Ok(self.items.clone())
    }
}

/// A generator that replies with canned text.
struct CannedGenerator(&'static str);

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str) -> GeneratorResult<String> {
        assert!(prompt.contains("octo/tool"));
        Ok(self.0.to_owned())
    }
}

fn item(name: &str) -> CandidateItem {
    CandidateItem {
        name: name.to_owned(),
        url: format!("https://github.com/{name}"),
        desc: format!("{name} does things"),
        stars: Some("1,024".into()),
        date: date!(2024 - 03 - 01),
    }
}

fn scraper(names: &[&str]) -> MockScraper {
    MockScraper {
        items: names.iter().map(|n| item(n)).collect(),
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn collect_hands_over_first_unseen_then_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let seen_path = dir.path().join("seen.csv");
    let candidate_file = dir.path().join("candidate.json");
    std::fs::write(&seen_path, "name,url,processed_date\na/x,https://github.com/a/x,2024-02-29\n").unwrap();

    let scraper = scraper(&["a/x", "b/y", "c/z"]);
    let today = date!(2024 - 03 - 01);

    let mut seen = SeenLog::open(&seen_path).unwrap();
    let outcome = run_collect(&scraper, &mut seen, &candidate_file, today).await.unwrap();
    assert_eq!(outcome, CollectOutcome::Selected(item("b/y")));

    let handed: CandidateItem = handoff::read_json(&candidate_file).unwrap();
    assert_eq!(handed, item("b/y"));

    let log = std::fs::read_to_string(&seen_path).unwrap();
    assert!(log.ends_with("b/y,https://github.com/b/y,2024-03-01\n"));

    // A fresh process sees the previous selection.
    let mut seen = SeenLog::open(&seen_path).unwrap();
    let outcome = run_collect(&scraper, &mut seen, &candidate_file, today).await.unwrap();
    assert_eq!(outcome, CollectOutcome::Selected(item("c/z")));

    let mut seen = SeenLog::open(&seen_path).unwrap();
    let outcome = run_collect(&scraper, &mut seen, &candidate_file, today).await.unwrap();
    assert_eq!(outcome, CollectOutcome::NothingNew);
    assert!(!candidate_file.exists(), "stale candidate file must be removed");
    assert_eq!(seen.len(), 3);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn collect_on_empty_listing_leaves_seen_log_alone() {
    let dir = tempfile::tempdir().unwrap();
    let seen_path = dir.path().join("seen.csv");
    let candidate_file = dir.path().join("candidate.json");

    let mut seen = SeenLog::open(&seen_path).unwrap();
    let outcome = run_collect(&scraper(&[]), &mut seen, &candidate_file, date!(2024 - 03 - 01))
        .await
        .unwrap();

    assert_eq!(outcome, CollectOutcome::NothingNew);
    assert!(!seen_path.exists());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn generate_writes_post_record() {
    let dir = tempfile::tempdir().unwrap();
    let candidate_file = dir.path().join("candidate.json");
    let post_file = dir.path().join("post.json");
    handoff::write_json(&candidate_file, &item("octo/tool")).unwrap();

    let now = datetime!(2024-03-01 09:30 +8);
    let record = run_generate(
        &CannedGenerator("# Octo Tool, explained\n<p>Body</p>"),
        &candidate_file,
        &post_file,
        default_categories(),
        default_tags(),
        now,
    )
    .await
    .unwrap();

    assert_eq!(record.title, "Octo Tool, explained");
    assert_eq!(record.content, "<p>Body</p>");

    let on_disk: PostRecord = handoff::read_json(&post_file).unwrap();
    assert_eq!(on_disk, record);
    assert_eq!(on_disk.source, item("octo/tool"));
    assert_eq!(on_disk.generated_at, now);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn generate_without_candidate_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    let err = run_generate(
        &CannedGenerator("unused"),
        &dir.path().join("missing.json"),
        &dir.path().join("post.json"),
        vec![],
        vec![],
        datetime!(2024-03-01 09:30 UTC),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, BotError::Handoff { .. }));
}

fn record() -> PostRecord {
    PostRecord {
        title: "Octo Tool".into(),
        content: "<p>Body</p>".into(),
        source: item("octo/tool"),
        categories: vec!["GitHub Trending".into()],
        tags: vec!["GitHub".into(), "Daily Pick".into()],
        generated_at: datetime!(2024-03-01 09:30 UTC),
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn publish_resolves_classification_and_creates_post() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apis/content.halo.run/v1alpha1/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "metadata": { "name": "category-gt" }, "spec": { "displayName": "GitHub Trending", "slug": "github-trending" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apis/content.halo.run/v1alpha1/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                { "metadata": { "name": "tag-gh" }, "spec": { "displayName": "GitHub", "slug": "github" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    // "Daily Pick" is missing and gets created; the create is not retried.
    Mock::given(method("POST"))
        .and(path("/apis/content.halo.run/v1alpha1/tags"))
        .and(body_partial_json(serde_json::json!({
            "metadata": { "name": "daily-pick" },
            "spec": { "displayName": "Daily Pick", "slug": "daily-pick" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "metadata": { "name": "daily-pick" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apis/api.console.halo.run/v1alpha1/posts"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/apis/api.console.halo.run/v1alpha1/posts"))
        .and(body_partial_json(serde_json::json!({
            "post": {
                "metadata": { "name": "github-trending-2024-03-01-octo-tool" },
                "spec": {
                    "categories": ["category-gt"],
                    "tags": ["tag-gh", "daily-pick"],
                    "publishTime": "2024-03-01T08:00:00+08:00"
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let post_file = dir.path().join("post.json");
    handoff::write_json(&post_file, &record()).unwrap();

    let halo = HaloClient::new(&server.uri(), "tok")
        .unwrap()
        .with_retries(RetryPolicy::READ.without_delay(), RetryPolicy::PUBLISH.without_delay());
    let post = run_publish(&halo, &post_file).await.unwrap();

    assert_eq!(post.slug, "github-trending-2024-03-01-octo-tool");
    assert_eq!(post.excerpt, "octo/tool does things");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn publish_fails_on_malformed_post_file() {
    let dir = tempfile::tempdir().unwrap();
    let post_file = dir.path().join("post.json");
    std::fs::write(&post_file, "{ not json").unwrap();

    // Nothing listens here; the file is rejected before any request.
    let halo = HaloClient::new("http://127.0.0.1:9", "tok").unwrap();
    let err = run_publish(&halo, &post_file).await.unwrap_err();

    assert!(matches!(err, BotError::Handoff { .. }));
}

#[test]
fn blank_credentials_are_missing() {
    assert!(matches!(
        require_credential("HALO_TOKEN", None),
        Err(BotError::MissingCredential { name: "HALO_TOKEN" })
    ));
    assert!(matches!(
        require_credential("HALO_TOKEN", Some("  ".into())),
        Err(BotError::MissingCredential { .. })
    ));
    assert_eq!(
        require_credential("HALO_TOKEN", Some(" secret ".into())).unwrap(),
        "secret"
    );
}
