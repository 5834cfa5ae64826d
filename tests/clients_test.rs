mod common;

use common::*;
use mockito::Matcher;
use seowatch::completion::{CompletionClient, CompletionRequest};
use seowatch::config::{CompletionConfig, Settings};
use seowatch::db;
use seowatch::optimizer::{CompletionOptimizer, OptimizationTarget, OptimizationTrigger, Optimizer};
use seowatch::publishing::{NewPost, PublishingClient, SiteCredentials};
use seowatch::usage::UsageTracker;
use seowatch::{utils, Error};
use serde_json::json;

fn completion_config(base_url: String) -> CompletionConfig {
    CompletionConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        ..Settings::for_memory_database().completion
    }
}

fn chat_reply(content: &str) -> String {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn test_completion_request_shape() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "response_format": { "type": "json_object" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply("{\"ok\":true}"))
        .create_async()
        .await;

    let client = CompletionClient::new(completion_config(server.url())).unwrap();
    let text = client
        .complete(&CompletionRequest::new("be brief", "hello").json())
        .await
        .unwrap();

    assert_eq!(text, "{\"ok\":true}");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_completion_error_status_is_upstream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("overloaded")
        .create_async()
        .await;

    let client = CompletionClient::new(completion_config(server.url())).unwrap();
    let err = client
        .complete(&CompletionRequest::new("s", "u"))
        .await
        .unwrap_err();

    match err {
        Error::Upstream {
            status, details, ..
        } => {
            assert_eq!(status, 503);
            assert_eq!(details, "overloaded");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[test]
fn test_unconfigured_completion_client() {
    let client = CompletionClient::new(Settings::for_memory_database().completion).unwrap();
    let result = tokio_test::block_on(client.complete(&CompletionRequest::new("s", "u")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_publish_post_uses_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/wp-json/wp/v2/posts")
        // base64("admin:secret")
        .match_header("authorization", "Basic YWRtaW46c2VjcmV0")
        .match_body(Matcher::PartialJson(json!({
            "title": "Launch",
            "status": "draft"
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "id": 42, "link": "https://blog.example.com/launch", "status": "draft" })
                .to_string(),
        )
        .create_async()
        .await;

    let client = PublishingClient::new().unwrap();
    let post = client
        .create_post(
            &server.url(),
            &SiteCredentials {
                username: "admin".to_string(),
                application_password: "secret".to_string(),
            },
            &NewPost {
                title: "Launch".to_string(),
                content: "<p>We shipped</p><script>alert(1)</script>".to_string(),
                status: "draft".to_string(),
                excerpt: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(post.id, 42);
    assert_eq!(post.status, "draft");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_publish_rejection_is_upstream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/wp-json/wp/v2/posts")
        .with_status(401)
        .with_body("{\"code\":\"rest_cannot_create\"}")
        .create_async()
        .await;

    let client = PublishingClient::new().unwrap();
    let err = client
        .create_post(
            &server.url(),
            &SiteCredentials {
                username: "admin".to_string(),
                application_password: "wrong".to_string(),
            },
            &NewPost {
                title: "Launch".to_string(),
                content: "body".to_string(),
                status: "publish".to_string(),
                excerpt: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Upstream { status: 401, .. }));
}

#[tokio::test]
async fn test_publish_does_not_follow_redirect_to_private_address() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/wp-json/wp/v2/posts")
        .with_status(307)
        .with_header("location", "http://10.0.0.5/wp-json/wp/v2/posts")
        .expect(1)
        .create_async()
        .await;

    let client = PublishingClient::new().unwrap();
    let err = client
        .create_post(
            &server.url(),
            &SiteCredentials {
                username: "admin".to_string(),
                application_password: "secret".to_string(),
            },
            &NewPost {
                title: "Launch".to_string(),
                content: "body".to_string(),
                status: "draft".to_string(),
                excerpt: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http(ref e) if e.is_redirect()));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_completion_optimizer_stores_record_and_counts_usage() {
    let mut server = mockito::Server::new_async().await;
    let suggestion = json!({
        "meta_title": "A Better Title For The Home Page",
        "meta_description": "A description that explains the page.",
        "recommendations": ["Add an h1 heading", "  "],
        "addressed_issues": ["h1_missing", "not_https"]
    })
    .to_string();
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(&suggestion))
        .create_async()
        .await;

    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "opt@example.com", "free").await;
    let usage = UsageTracker::new(pool.clone());
    let optimizer = CompletionOptimizer::new(
        pool.clone(),
        CompletionClient::new(completion_config(server.url())).unwrap(),
        usage.clone(),
    );

    let target = OptimizationTarget {
        user_id: user.id.clone(),
        website_url: "https://a.com/".to_string(),
        analysis: analysis(70, &["title_short", "h1_missing", "canonical_missing"]),
        trigger: OptimizationTrigger::Manual,
    };

    let record = optimizer.optimize(&target).await.unwrap();
    assert_eq!(record.trigger_source, "manual");
    assert_eq!(record.status, "completed");
    assert_eq!(record.before_metrics.0.seo_score, 70);
    // title_short and h1_missing are fixed, 5 points each
    assert_eq!(record.after_metrics.0.seo_score, 80);
    assert_eq!(
        record.after_metrics.0.issue_codes,
        vec!["canonical_missing".to_string()]
    );
    assert_eq!(record.changes.0.recommendations, vec!["Add an h1 heading".to_string()]);

    let summary = usage.summary(&user.id, utils::now()).await.unwrap();
    assert_eq!(summary.optimizations_used, 1);

    let stored = db::optimizations::list_optimizations(&pool, &user.id, 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_completion_optimizer_respects_quota() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "capped@example.com", "free").await;
    let usage = UsageTracker::new(pool.clone());
    let now = utils::now();
    for _ in 0..2 {
        usage
            .increment(&user.id, seowatch::usage::UsageKind::Optimizations, now)
            .await
            .unwrap();
    }

    // No mock server: the quota check fails before any request is made
    let optimizer = CompletionOptimizer::new(
        pool.clone(),
        CompletionClient::new(completion_config("http://127.0.0.1:9".to_string())).unwrap(),
        usage,
    );
    let err = optimizer
        .optimize(&OptimizationTarget {
            user_id: user.id,
            website_url: "https://a.com/".to_string(),
            analysis: analysis(50, &["h1_missing"]),
            trigger: OptimizationTrigger::Scheduled,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::QuotaExceeded(_)));
}
