//! Hashnode publisher against a local one-shot server.

use serde_json::json;

use syndicate::classify::{classify, Classification};
use syndicate::content::Platform;
use syndicate::publisher::hashnode::{build_request, interpret_response, HashnodePublisher};
use syndicate::publisher::{Payload, Publisher, RawOutcome, Submission};

use crate::support::{captured, client, serve_once};

const API_KEY: &str = "hashnode-secret-token";
const PUBLICATION: &str = "pub-123";

fn submission(canonical: Option<&str>) -> Submission {
    Submission {
        title: "Queues in Rust".to_owned(),
        body: "Body".to_owned(),
        canonical_url: canonical.map(str::to_owned),
        tags: vec!["rust".to_owned(), "web-dev".to_owned()],
        series: Some("Plumbing".to_owned()),
    }
}

fn publisher(endpoint: String) -> HashnodePublisher {
    HashnodePublisher::new(
        client(5),
        endpoint,
        API_KEY.to_owned(),
        PUBLICATION.to_owned(),
        vec![API_KEY.to_owned()],
    )
}

#[test]
fn request_carries_publication_tags_and_original_url() {
    let request = build_request(PUBLICATION, &submission(Some("https://blog.example/q")));
    assert!(request.query.contains("publishPost"));

    let input = &request.variables["input"];
    assert_eq!(input["publicationId"], json!(PUBLICATION));
    assert_eq!(input["contentMarkdown"], json!("Body"));
    assert_eq!(input["originalArticleURL"], json!("https://blog.example/q"));
    assert_eq!(
        input["tags"],
        json!([
            { "slug": "rust", "name": "rust" },
            { "slug": "web-dev", "name": "web-dev" },
        ])
    );
    assert!(input.get("series").is_none());

    let without_canonical = build_request(PUBLICATION, &submission(None));
    assert!(without_canonical.variables["input"]
        .get("originalArticleURL")
        .is_none());
}

#[test]
fn graphql_errors_are_in_band_rejections() {
    let body = r#"{"data":null,"errors":[{"message":"Invalid tag"},{"message":"Title too long"}]}"#;
    assert_eq!(
        interpret_response(200, body, &[]),
        Payload::Rejected {
            message: "Invalid tag; Title too long".to_owned(),
        }
    );
    assert!(matches!(
        interpret_response(200, r#"{"data":{"publishPost":null}}"#, &[]),
        Payload::Malformed { .. }
    ));
    assert!(matches!(
        interpret_response(200, "not json", &[]),
        Payload::Malformed { .. }
    ));
}

#[tokio::test]
async fn submit_uses_bearer_auth_and_reads_post_url() {
    let (url, handle) = serve_once(
        "200 OK",
        r#"{"data":{"publishPost":{"post":{"id":"p1","slug":"queues","url":"https://me.hashnode.dev/queues"}}}}"#,
    )
    .await;
    let publisher = publisher(url);
    assert_eq!(publisher.platform(), Platform::Hashnode);
    assert!(publisher.collision_rule().is_none());

    let submission = submission(Some("https://blog.example/q"));
    let outcome = publisher.submit(&submission).await;
    assert_eq!(
        classify(&outcome, submission.canonical_url.as_deref(), None),
        Classification::Published {
            url: "https://me.hashnode.dev/queues".to_owned(),
            reconciled: false,
        }
    );

    let request = captured(handle).await;
    assert!(request
        .head
        .contains(&format!("authorization: bearer {API_KEY}")));
    assert_eq!(
        request.json()["variables"]["input"]["title"],
        json!("Queues in Rust")
    );
}

#[tokio::test]
async fn gateway_errors_are_retryable() {
    let (url, _handle) = serve_once("502 Bad Gateway", "<html>bad gateway</html>").await;
    let outcome = publisher(url).submit(&submission(None)).await;

    match &outcome {
        RawOutcome::Response {
            status: 502,
            payload: Payload::Rejected { .. },
            ..
        } => {}
        other => panic!("expected a 502 rejection, got {other:?}"),
    }
    assert!(matches!(
        classify(&outcome, None, None),
        Classification::RetryableFailure { .. }
    ));
}
