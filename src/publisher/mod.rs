//! Publisher port: "submit this item to platform X".
//!
//! Defines the [`Publisher`] trait and the raw outcome types every platform
//! implementation produces. The run controller only ever sees a
//! [`RawOutcome`]; platform payload shapes stay inside the implementations.
//!
//! Two publishers are implemented:
//! - [`devto::DevtoPublisher`]: Dev.to REST `POST /api/articles`
//! - [`hashnode::HashnodePublisher`]: Hashnode GraphQL `publishPost`

use async_trait::async_trait;
use regex::Regex;

use crate::content::Platform;

pub mod devto;
pub mod hashnode;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// The transformed view of an item that is actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Title.
    pub title: String,
    /// Markdown body with footer applied.
    pub body: String,
    /// Canonical URL, if any.
    pub canonical_url: Option<String>,
    /// Normalized tags.
    pub tags: Vec<String>,
    /// Series name, if any.
    pub series: Option<String>,
}

/// What a platform said about the body of its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Body matched the platform's schema.
    Parsed {
        /// Published URL, when the platform reported one.
        url: Option<String>,
    },
    /// The platform rejected the item inside an otherwise successful response
    /// (e.g. a GraphQL `errors` array on HTTP 200).
    Rejected {
        /// Platform error text.
        message: String,
    },
    /// Body could not be understood.
    Malformed {
        /// Parse failure detail.
        reason: String,
    },
}

/// Unclassified result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOutcome {
    /// No HTTP response was received.
    Transport {
        /// Transport error text.
        reason: String,
        /// Whether the request timed out.
        timed_out: bool,
    },
    /// The platform answered.
    Response {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body text.
        body: String,
        /// Interpretation of the body.
        payload: Payload,
    },
}

/// The narrow condition under which a platform reports that an item's
/// canonical URL is already registered there.
///
/// Matches when the status equals `status` (if set) and the error text
/// contains `needle`, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionRule {
    /// Required HTTP status, or `None` for in-band rejections at any status.
    pub status: Option<u16>,
    /// Lower-case substring identifying the collision.
    pub needle: &'static str,
}

impl CollisionRule {
    /// Whether `text` returned with `status` reports a canonical URL collision.
    pub fn matches(&self, status: u16, text: &str) -> bool {
        self.status.map_or(true, |expected| expected == status)
            && text.to_lowercase().contains(self.needle)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One target platform.
///
/// Implementations must never panic or return early on transport problems;
/// every attempt yields a [`RawOutcome`].
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Platform this publisher targets.
    fn platform(&self) -> Platform;

    /// How this platform reports "canonical URL already taken", if it does.
    fn collision_rule(&self) -> Option<CollisionRule>;

    /// Submit one item.
    async fn submit(&self, submission: &Submission) -> RawOutcome;
}

// ---------------------------------------------------------------------------
// HTTP helpers (shared by the platform publishers)
// ---------------------------------------------------------------------------

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Map a reqwest transport error into a [`RawOutcome::Transport`].
pub fn transport_outcome(err: &reqwest::Error, secrets: &[String]) -> RawOutcome {
    RawOutcome::Transport {
        reason: sanitize_body(&err.to_string(), secrets),
        timed_out: err.is_timeout(),
    }
}

/// Collapse whitespace, redact secrets and truncate a response body for
/// storage in archive error fields and logs.
pub fn sanitize_body(raw: &str, secrets: &[String]) -> String {
    let mut sanitized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    for secret in secrets.iter().filter(|s| s.len() >= 4) {
        sanitized = sanitized.replace(secret.as_str(), "[REDACTED]");
    }
    for pattern in [
        r"(?i)bearer\s+[A-Za-z0-9._\-]{8,}",
        r#"(?i)api[-_]key["':=\s]+[A-Za-z0-9]{12,}"#,
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

/// Build the shared HTTP client.
///
/// # Errors
///
/// Returns an error when the TLS backend cannot be initialised.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("syndicate/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Build a publisher for a platform from resolved settings and credentials.
///
/// # Errors
///
/// Returns [`crate::config::ConfigError`] when a required credential is
/// missing or the HTTP client cannot be built.
pub fn for_platform(
    settings: &crate::config::RunSettings,
    credentials: &crate::credentials::Credentials,
) -> Result<Box<dyn Publisher>, crate::config::ConfigError> {
    let endpoint = &settings.endpoint;
    let client = http_client(settings.timeout_secs)
        .map_err(|e| crate::config::ConfigError::HttpClient(e.to_string()))?;
    let platform = settings.platform;
    let api_key = credentials.require(platform, &settings.api_key_env)?;
    let secrets = vec![api_key.clone()];

    match platform {
        Platform::Devto => Ok(Box::new(devto::DevtoPublisher::new(
            client,
            endpoint.clone(),
            api_key,
            secrets,
        ))),
        Platform::Hashnode => {
            let publication_env = settings.publication_id_env.as_deref().ok_or(
                crate::config::ConfigError::MissingSetting {
                    platform,
                    setting: "publication_id_env",
                },
            )?;
            let publication_id = credentials.require(platform, publication_env)?;
            Ok(Box::new(hashnode::HashnodePublisher::new(
                client,
                endpoint.clone(),
                api_key,
                publication_id,
                secrets,
            )))
        }
    }
}
