use time::macros::date;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn item() -> CandidateItem {
    CandidateItem {
        name: "octo/tool".into(),
        url: "https://github.com/octo/tool".into(),
        desc: "A tool for octopuses.".into(),
        stars: Some("12,345".into()),
        date: date!(2024 - 03 - 01),
    }
}

#[test]
fn prompt_mentions_every_item_field() {
    let prompt = build_prompt(&item());

    for needle in [
        "octo/tool",
        "https://github.com/octo/tool",
        "A tool for octopuses.",
        "12,345",
        "2024-03-01",
        "800-1200",
    ] {
        assert!(prompt.contains(needle), "prompt is missing {needle}");
    }
}

#[test]
fn prompt_without_stars_has_no_stars_line() {
    let prompt = build_prompt(&CandidateItem {
        stars: None,
        ..item()
    });
    assert!(!prompt.contains("Stars:"));
}

#[test]
fn first_line_becomes_the_title() {
    let post = split_title_body("Octo Tool: Deep Dive\n<p>Body</p>", &item());

    assert_eq!(
        post,
        GeneratedPost {
            title: "Octo Tool: Deep Dive".into(),
            body: "<p>Body</p>".into(),
        }
    );
}

#[test]
fn title_markup_is_stripped() {
    let post = split_title_body("<h1>## **Octo Tool**</h1>\n\n<p>Body</p>\n", &item());
    assert_eq!(post.title, "Octo Tool");
    assert_eq!(post.body, "<p>Body</p>");

    let post = split_title_body("Title: \"Octo Tool\"\n<p>Body</p>", &item());
    assert_eq!(post.title, "Octo Tool");
}

#[test]
fn code_fence_around_reply_is_dropped() {
    let post = split_title_body("```html\nOcto Tool\n<p>Body</p>\n```", &item());
    assert_eq!(post.title, "Octo Tool");
    assert_eq!(post.body, "<p>Body</p>");
}

#[test]
fn single_line_reply_uses_default_title() {
    let post = split_title_body("<p>Only a body, nothing else.</p>", &item());
    assert_eq!(post.title, "octo/tool: GitHub Trending daily pick");
    assert_eq!(post.body, "<p>Only a body, nothing else.</p>");
}

#[test]
fn overlong_first_line_uses_default_title() {
    let reply = format!("{}\n<p>Body</p>", "word ".repeat(40));
    let post = split_title_body(&reply, &item());
    assert_eq!(post.title, default_title(&item()));
    assert!(post.body.ends_with("<p>Body</p>"));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn sends_bearer_authenticated_chat_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "deepseek-chat",
            "max_tokens": 4000,
            "stream": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Title\n<p>Body</p>" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(
        format!("{}/chat/completions", server.uri()),
        "sk-test",
        GenerationParams::default(),
    )
    .unwrap();

    let reply = client.generate("hello").await.unwrap();
    assert_eq!(reply, "Title\n<p>Body</p>");
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        ChatCompletionsClient::new(server.uri(), "sk-test", GenerationParams::default()).unwrap();

    let err = client.generate("hello").await.unwrap_err();
    let GeneratorError::Http { source } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(source.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(source.body(), Some("overloaded"));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn empty_reply_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client =
        ChatCompletionsClient::new(server.uri(), "sk-test", GenerationParams::default()).unwrap();

    assert!(matches!(
        client.generate("hello").await,
        Err(GeneratorError::EmptyReply)
    ));
}
