//! Transport failures and response body sanitization.

use syndicate::classify::{classify, Classification};
use syndicate::publisher::devto::DevtoPublisher;
use syndicate::publisher::{sanitize_body, Publisher, RawOutcome, Submission};

use crate::support::{client, closed_port, serve_silence};

fn submission() -> Submission {
    Submission {
        title: "T".to_owned(),
        body: "B".to_owned(),
        canonical_url: None,
        tags: Vec::new(),
        series: None,
    }
}

#[tokio::test]
async fn unanswered_request_times_out_as_retryable() {
    let url = serve_silence().await;
    let publisher = DevtoPublisher::new(client(1), url, "key".to_owned(), Vec::new());

    let outcome = publisher.submit(&submission()).await;
    match &outcome {
        RawOutcome::Transport { timed_out, .. } => assert!(*timed_out),
        other => panic!("expected a transport timeout, got {other:?}"),
    }
    assert!(matches!(
        classify(&outcome, None, None),
        Classification::RetryableFailure { .. }
    ));
}

#[tokio::test]
async fn refused_connection_is_a_transport_failure() {
    let url = closed_port().await;
    let publisher = DevtoPublisher::new(client(5), url, "key".to_owned(), Vec::new());

    match publisher.submit(&submission()).await {
        RawOutcome::Transport { timed_out, .. } => assert!(!timed_out),
        other => panic!("expected a transport failure, got {other:?}"),
    }
}

#[test]
fn sanitize_redacts_bearer_tokens() {
    let body = sanitize_body("rejected header Authorization: Bearer abcdefgh12345678", &[]);
    assert!(!body.contains("abcdefgh12345678"));
    assert!(body.contains("[REDACTED]"));
}

#[test]
fn sanitize_truncates_long_bodies() {
    let body = sanitize_body(&"x".repeat(2000), &[]);
    assert!(body.ends_with("...[truncated]"));
    assert_eq!(body.chars().count(), 512 + "...[truncated]".len());
}

#[test]
fn short_secrets_are_not_redacted() {
    let body = sanitize_body("status ok", &["ok".to_owned()]);
    assert_eq!(body, "status ok");
}
