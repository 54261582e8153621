//! Dev.to publisher using the `POST /api/articles` REST API.
//!
//! Dev.to answers a duplicate canonical URL with `422` and the error text
//! "Canonical url has already been taken"; that exact condition is this
//! platform's [`CollisionRule`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    sanitize_body, transport_outcome, CollisionRule, Payload, Publisher, RawOutcome, Submission,
};
use crate::content::Platform;

/// Default Dev.to articles endpoint.
pub const DEFAULT_DEVTO_URL: &str = "https://dev.to/api/articles";

/// Dev.to's canonical-collision condition.
pub const CANONICAL_TAKEN: CollisionRule = CollisionRule {
    status: Some(422),
    needle: "canonical url has already been taken",
};

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Request body for `POST /api/articles`.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct DevtoRequest {
    /// Wrapped article.
    pub article: DevtoArticle,
}

/// Article fields sent to Dev.to.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct DevtoArticle {
    /// Title.
    pub title: String,
    /// Publish immediately rather than as a draft.
    pub published: bool,
    /// Markdown body.
    pub body_markdown: String,
    /// Canonical URL.
    pub canonical_url: Option<String>,
    /// Up to four tags.
    pub tags: Vec<String>,
    /// Series name.
    pub series: Option<String>,
}

/// The fields read back from a created article.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct DevtoArticleResponse {
    /// Public article URL.
    pub url: Option<String>,
    /// Canonical URL as stored by Dev.to.
    pub canonical_url: Option<String>,
}

/// Dev.to error body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct DevtoError {
    /// Error text.
    pub error: String,
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Dev.to publisher.
pub struct DevtoPublisher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    secrets: Vec<String>,
}

impl std::fmt::Debug for DevtoPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevtoPublisher")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl DevtoPublisher {
    /// Create a publisher posting to `endpoint` with `api_key`.
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        secrets: Vec<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            secrets,
        }
    }
}

#[async_trait]
impl Publisher for DevtoPublisher {
    fn platform(&self) -> Platform {
        Platform::Devto
    }

    fn collision_rule(&self) -> Option<CollisionRule> {
        Some(CANONICAL_TAKEN)
    }

    async fn submit(&self, submission: &Submission) -> RawOutcome {
        let request = build_request(submission);
        let sent = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(err) => return transport_outcome(&err, &self.secrets),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return transport_outcome(&err, &self.secrets),
        };

        RawOutcome::Response {
            status,
            payload: interpret_response(status, &body, &self.secrets),
            body: sanitize_body(&body, &self.secrets),
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build the Dev.to request body for a submission.
#[doc(hidden)]
pub fn build_request(submission: &Submission) -> DevtoRequest {
    DevtoRequest {
        article: DevtoArticle {
            title: submission.title.clone(),
            published: true,
            body_markdown: submission.body.clone(),
            canonical_url: submission.canonical_url.clone(),
            tags: submission.tags.clone(),
            series: submission.series.clone(),
        },
    }
}

/// Interpret a Dev.to response body.
///
/// Success bodies must be an article object; the published URL is its `url`,
/// falling back to the stored `canonical_url`. Error bodies are reduced to
/// their `error` text.
#[doc(hidden)]
pub fn interpret_response(status: u16, body: &str, secrets: &[String]) -> Payload {
    if (200..300).contains(&status) {
        return match serde_json::from_str::<DevtoArticleResponse>(body) {
            Ok(article) => Payload::Parsed {
                url: article
                    .url
                    .filter(|u| !u.is_empty())
                    .or(article.canonical_url.filter(|u| !u.is_empty())),
            },
            Err(e) => Payload::Malformed {
                reason: format!("unreadable Dev.to article response: {e}"),
            },
        };
    }

    let message = serde_json::from_str::<DevtoError>(body)
        .map(|err| err.error)
        .unwrap_or_else(|_| body.to_owned());
    Payload::Rejected {
        message: sanitize_body(&message, secrets),
    }
}
