//! Response classification.
//!
//! Maps a publisher's [`RawOutcome`] onto one of three canonical results.
//! Only transient conditions (transport failure, timeout, 408, 429, 5xx)
//! leave an item in the queue; everything else makes monotonic progress
//! into the archive so a broken item can never block the queue.

use std::fmt;

use crate::publisher::{CollisionRule, Payload, RawOutcome};

/// Canonical result of one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Live on the platform at `url`.
    Published {
        /// Published (or reconciled canonical) URL.
        url: String,
        /// Whether this was a canonical-URL collision treated as success.
        reconciled: bool,
    },
    /// Transient back-pressure; leave the item for a later run.
    RetryableFailure {
        /// Diagnostic text.
        reason: String,
    },
    /// Will never succeed unmodified.
    PermanentFailure {
        /// Diagnostic text, archived for manual follow-up.
        reason: String,
    },
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published {
                url,
                reconciled: false,
            } => write!(f, "published at {url}"),
            Self::Published {
                url,
                reconciled: true,
            } => write!(f, "already present at {url}"),
            Self::RetryableFailure { reason } => write!(f, "retryable: {reason}"),
            Self::PermanentFailure { reason } => write!(f, "permanent: {reason}"),
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Classify a raw outcome for an item with `canonical_url`.
///
/// `collision` is the target platform's canonical-collision rule; when it
/// matches a client error (or an in-band rejection) and the item has a
/// canonical URL, the item is reconciled as published at that URL.
pub fn classify(
    outcome: &RawOutcome,
    canonical_url: Option<&str>,
    collision: Option<&CollisionRule>,
) -> Classification {
    let canonical = canonical_url.filter(|url| !url.trim().is_empty());

    let (status, body, payload) = match outcome {
        RawOutcome::Transport { reason, timed_out } => {
            let reason = if *timed_out {
                format!("request timed out: {reason}")
            } else {
                format!("transport error: {reason}")
            };
            return Classification::RetryableFailure { reason };
        }
        RawOutcome::Response {
            status,
            body,
            payload,
        } => (*status, body.as_str(), payload),
    };

    if is_retryable_status(status) {
        return Classification::RetryableFailure {
            reason: format!("HTTP {status}: {body}"),
        };
    }

    let reconcile = |text: &str| -> Option<Classification> {
        let rule = collision?;
        let url = canonical?;
        rule.matches(status, text).then(|| Classification::Published {
            url: url.to_owned(),
            reconciled: true,
        })
    };

    if (200..300).contains(&status) {
        return match payload {
            Payload::Parsed { url: Some(url) } => Classification::Published {
                url: url.clone(),
                reconciled: false,
            },
            Payload::Parsed { url: None } => match canonical {
                Some(url) => Classification::Published {
                    url: url.to_owned(),
                    reconciled: false,
                },
                None => Classification::PermanentFailure {
                    reason: format!(
                        "HTTP {status}: platform accepted the item but returned no URL and the item has no canonical URL"
                    ),
                },
            },
            Payload::Rejected { message } => {
                reconcile(message).unwrap_or_else(|| Classification::PermanentFailure {
                    reason: format!("HTTP {status}: {message}"),
                })
            }
            Payload::Malformed { reason } => Classification::PermanentFailure {
                reason: format!("HTTP {status}: unparseable success response: {reason}"),
            },
        };
    }

    let text = match payload {
        Payload::Rejected { message } => message.as_str(),
        Payload::Parsed { .. } | Payload::Malformed { .. } => body,
    };

    if (400..500).contains(&status) {
        if let Some(reconciled) = reconcile(text).or_else(|| reconcile(body)) {
            return reconciled;
        }
    }

    Classification::PermanentFailure {
        reason: format!("HTTP {status}: {text}"),
    }
}
