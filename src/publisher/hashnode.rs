//! Hashnode publisher using the GraphQL `publishPost` mutation.
//!
//! Hashnode reports most failures as a GraphQL `errors` array on HTTP 200,
//! which surfaces here as [`Payload::Rejected`]. It has no documented,
//! stable message for a duplicate `originalArticleURL`, so this publisher
//! declares no collision rule.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    sanitize_body, transport_outcome, CollisionRule, Payload, Publisher, RawOutcome, Submission,
};
use crate::content::Platform;

/// Default Hashnode GraphQL endpoint.
pub const DEFAULT_HASHNODE_URL: &str = "https://gql.hashnode.com";

const PUBLISH_POST: &str = "mutation PublishPost($input: PublishPostInput!) {
  publishPost(input: $input) {
    post { id slug url }
  }
}";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// GraphQL request envelope.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct GraphqlRequest {
    /// Mutation text.
    pub query: &'static str,
    /// Mutation variables.
    pub variables: serde_json::Value,
}

/// GraphQL response envelope.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse {
    /// Result data.
    pub data: Option<PublishPostData>,
    /// Errors, if any.
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

/// `data` of a `publishPost` response.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct PublishPostData {
    /// Mutation payload.
    #[serde(rename = "publishPost")]
    pub publish_post: Option<PublishPostPayload>,
}

/// `publishPost` payload.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct PublishPostPayload {
    /// The created post.
    pub post: Option<HashnodePost>,
}

/// Fields read back from the created post.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct HashnodePost {
    /// Public post URL.
    pub url: Option<String>,
}

/// One GraphQL error.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    /// Error message.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Hashnode publisher.
pub struct HashnodePublisher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    publication_id: String,
    secrets: Vec<String>,
}

impl std::fmt::Debug for HashnodePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashnodePublisher")
            .field("endpoint", &self.endpoint)
            .field("publication_id", &self.publication_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl HashnodePublisher {
    /// Create a publisher for one Hashnode publication.
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        publication_id: String,
        secrets: Vec<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            publication_id,
            secrets,
        }
    }
}

#[async_trait]
impl Publisher for HashnodePublisher {
    fn platform(&self) -> Platform {
        Platform::Hashnode
    }

    fn collision_rule(&self) -> Option<CollisionRule> {
        None
    }

    async fn submit(&self, submission: &Submission) -> RawOutcome {
        let request = build_request(&self.publication_id, submission);
        let sent = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
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

/// Build the `publishPost` mutation for a submission.
///
/// Tags map to `{slug, name}` pairs with both set to the normalized tag.
/// The series name is not sent: Hashnode addresses series by id.
#[doc(hidden)]
pub fn build_request(publication_id: &str, submission: &Submission) -> GraphqlRequest {
    let tags: Vec<_> = submission
        .tags
        .iter()
        .map(|tag| json!({ "slug": tag, "name": tag }))
        .collect();

    let mut input = json!({
        "publicationId": publication_id,
        "title": submission.title,
        "contentMarkdown": submission.body,
        "tags": tags,
    });
    if let Some(url) = submission.canonical_url.as_deref() {
        input["originalArticleURL"] = json!(url);
    }

    GraphqlRequest {
        query: PUBLISH_POST,
        variables: json!({ "input": input }),
    }
}

/// Interpret a Hashnode GraphQL response body.
#[doc(hidden)]
pub fn interpret_response(status: u16, body: &str, secrets: &[String]) -> Payload {
    let parsed = match serde_json::from_str::<GraphqlResponse>(body) {
        Ok(parsed) => parsed,
        Err(e) if (200..300).contains(&status) => {
            return Payload::Malformed {
                reason: format!("unreadable Hashnode response: {e}"),
            }
        }
        Err(_) => {
            return Payload::Rejected {
                message: sanitize_body(body, secrets),
            }
        }
    };

    if !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Payload::Rejected {
            message: sanitize_body(&message, secrets),
        };
    }

    match parsed
        .data
        .and_then(|data| data.publish_post)
        .and_then(|payload| payload.post)
    {
        Some(post) => Payload::Parsed {
            url: post.url.filter(|u| !u.is_empty()),
        },
        None => Payload::Malformed {
            reason: "Hashnode response carried no post".to_owned(),
        },
    }
}
