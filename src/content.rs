//! Content items and their per-platform delivery state.
//!
//! A [`ContentItem`] is authored upstream and never rewritten by the publish
//! pipeline except for its per-platform [`PlatformState`]. On disk each item
//! is a flat JSON record; platform state lives in `{platform}_status`,
//! `{platform}_url`, `{platform}_error` and `{platform}_timestamp` keys.
//! Keys this crate does not understand are carried through untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// A publishing platform an item can be syndicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// <https://dev.to>
    Devto,
    /// <https://hashnode.com>
    Hashnode,
}

impl Platform {
    /// Every supported platform, in display order.
    pub const ALL: [Platform; 2] = [Platform::Devto, Platform::Hashnode];

    /// Stable key used in config sections, file names and record field prefixes.
    pub fn key(self) -> &'static str {
        match self {
            Self::Devto => "devto",
            Self::Hashnode => "hashnode",
        }
    }

    /// Human-readable platform name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Devto => "Dev.to",
            Self::Hashnode => "Hashnode",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a platform name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform {0:?} (expected one of: devto, hashnode)")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devto" | "dev.to" | "dev-to" => Ok(Self::Devto),
            "hashnode" => Ok(Self::Hashnode),
            _ => Err(UnknownPlatform(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-platform state
// ---------------------------------------------------------------------------

/// Delivery status of an item on one platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformStatus {
    /// Waiting in the platform's queue.
    #[default]
    Pending,
    /// Live on the platform.
    Published,
    /// Rejected permanently; needs manual follow-up.
    Failed,
}

impl PlatformStatus {
    /// Whether the status is terminal (archived).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything recorded about an item on one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformState {
    /// Current delivery status.
    pub status: PlatformStatus,
    /// Published URL, once published.
    pub url: Option<String>,
    /// Diagnostic text, once failed.
    pub error: Option<String>,
    /// When the item reached its current status.
    pub timestamp: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Item identity
// ---------------------------------------------------------------------------

/// Identity of an item, as reported in logs.
///
/// The canonical URL wins when present; otherwise the title names the item.
/// A title is not unique, so matching items without a canonical URL goes
/// through [`ContentItem::same_item`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    /// Identified by canonical URL.
    Canonical(String),
    /// Identified by title (no canonical URL).
    Title(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canonical(url) => write!(f, "canonical:{url}"),
            Self::Title(title) => write!(f, "title:{title}"),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentItem
// ---------------------------------------------------------------------------

/// A unit of content to syndicate.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    title: String,
    body: String,
    canonical_url: Option<String>,
    tags: Vec<String>,
    series: Option<String>,
    states: BTreeMap<Platform, PlatformState>,
    extra: Map<String, Value>,
}

impl ContentItem {
    /// Create an item with a title and markdown body.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyTitle`] when the title is blank.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Result<Self, RecordError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        Ok(Self {
            title,
            body: body.into(),
            canonical_url: None,
            tags: Vec::new(),
            series: None,
            states: BTreeMap::new(),
            extra: Map::new(),
        })
    }

    /// Set the canonical URL.
    #[must_use]
    pub fn with_canonical_url(mut self, url: impl Into<String>) -> Self {
        self.canonical_url = Some(url.into());
        self
    }

    /// Set the raw tag list.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the series name.
    #[must_use]
    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = Some(series.into());
        self
    }

    /// Item title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Markdown body as authored.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Canonical URL, if any.
    pub fn canonical_url(&self) -> Option<&str> {
        self.canonical_url.as_deref()
    }

    /// Raw tags as authored.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Series name, if any.
    pub fn series(&self) -> Option<&str> {
        self.series.as_deref()
    }

    /// Identity of this item.
    pub fn key(&self) -> ItemKey {
        match self.canonical_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => ItemKey::Canonical(url.to_owned()),
            _ => ItemKey::Title(self.title.trim().to_owned()),
        }
    }

    /// Whether `other` is the same piece of content, ignoring platform state.
    ///
    /// Items with a canonical URL match on it alone. Items without one match
    /// only when title, body, tags and series are all equal.
    pub fn same_item(&self, other: &ContentItem) -> bool {
        match (self.key(), other.key()) {
            (ItemKey::Canonical(a), ItemKey::Canonical(b)) => a == b,
            (ItemKey::Title(a), ItemKey::Title(b)) => {
                a == b
                    && self.body == other.body
                    && self.tags == other.tags
                    && self.series == other.series
            }
            _ => false,
        }
    }

    /// Recorded state for a platform, if any.
    pub fn state(&self, platform: Platform) -> Option<&PlatformState> {
        self.states.get(&platform)
    }

    /// Status on a platform; items with no recorded state are pending.
    pub fn status(&self, platform: Platform) -> PlatformStatus {
        self.state(platform)
            .map(|state| state.status)
            .unwrap_or_default()
    }

    /// Mark the item as queued for a platform.
    #[must_use]
    pub fn queued_for(mut self, platform: Platform) -> Self {
        self.states.insert(platform, PlatformState::default());
        self
    }

    /// Copy of this item recorded as published on `platform`.
    #[must_use]
    pub fn published(&self, platform: Platform, url: String, at: DateTime<Utc>) -> Self {
        let mut item = self.clone();
        item.states.insert(
            platform,
            PlatformState {
                status: PlatformStatus::Published,
                url: Some(url),
                error: None,
                timestamp: Some(at),
            },
        );
        item
    }

    /// Copy of this item recorded as permanently failed on `platform`.
    #[must_use]
    pub fn failed(&self, platform: Platform, error: String, at: DateTime<Utc>) -> Self {
        let mut item = self.clone();
        item.states.insert(
            platform,
            PlatformState {
                status: PlatformStatus::Failed,
                url: None,
                error: Some(error),
                timestamp: Some(at),
            },
        );
        item
    }

    fn from_record(record: ItemRecord) -> Result<Self, RecordError> {
        let ItemRecord {
            title,
            body,
            body_markdown,
            content_markdown,
            canonical_url,
            tags,
            series,
            mut rest,
        } = record;

        if title.trim().is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        let body = body
            .or(body_markdown)
            .or(content_markdown)
            .ok_or(RecordError::MissingBody)?;

        let mut states = BTreeMap::new();
        for platform in Platform::ALL {
            if let Some(state) = take_platform_state(platform, &mut rest)? {
                states.insert(platform, state);
            }
        }

        Ok(Self {
            title,
            body,
            canonical_url: canonical_url.filter(|url| !url.trim().is_empty()),
            tags: tags.unwrap_or_default(),
            series: series.filter(|s| !s.trim().is_empty()),
            states,
            extra: rest,
        })
    }

    fn to_record(&self) -> ItemRecord {
        let mut rest = self.extra.clone();
        for (platform, state) in &self.states {
            let key = platform.key();
            rest.insert(
                format!("{key}_status"),
                Value::String(state.status.as_str().to_owned()),
            );
            rest.insert(format!("{key}_url"), optional_string(state.url.as_deref()));
            rest.insert(
                format!("{key}_error"),
                optional_string(state.error.as_deref()),
            );
            rest.insert(
                format!("{key}_timestamp"),
                optional_string(state.timestamp.map(|ts| ts.to_rfc3339()).as_deref()),
            );
        }
        ItemRecord {
            title: self.title.clone(),
            body: Some(self.body.clone()),
            body_markdown: None,
            content_markdown: None,
            canonical_url: self.canonical_url.clone(),
            tags: Some(self.tags.clone()),
            series: self.series.clone(),
            rest,
        }
    }
}

impl Serialize for ContentItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = ItemRecord::deserialize(deserializer)?;
        Self::from_record(record).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Record validation
// ---------------------------------------------------------------------------

/// Reasons a persisted record is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Title missing or blank.
    #[error("title must not be empty")]
    EmptyTitle,
    /// None of `body`, `body_markdown` or `content_markdown` is present.
    #[error("missing field `body`")]
    MissingBody,
    /// A per-platform field holds a value of the wrong type.
    #[error("field `{field}` must be {expected}")]
    FieldType {
        /// Offending field name.
        field: String,
        /// Expected JSON type.
        expected: &'static str,
    },
    /// Status string is not one of pending/published/failed.
    #[error("field `{field}` has unknown status {value:?}")]
    UnknownStatus {
        /// Offending field name.
        field: String,
        /// The unrecognised value.
        value: String,
    },
    /// Timestamp is not RFC 3339.
    #[error("field `{field}` is not an RFC 3339 timestamp: {value:?}")]
    BadTimestamp {
        /// Offending field name.
        field: String,
        /// The unparseable value.
        value: String,
    },
}

/// On-disk shape of an item.
#[derive(Debug, Serialize, Deserialize)]
struct ItemRecord {
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default, skip_serializing)]
    body_markdown: Option<String>,
    #[serde(default, skip_serializing)]
    content_markdown: Option<String>,
    #[serde(default)]
    canonical_url: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    series: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn optional_string(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_owned()))
}

fn take_string(rest: &mut Map<String, Value>, field: &str) -> Result<Option<String>, RecordError> {
    match rest.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(RecordError::FieldType {
            field: field.to_owned(),
            expected: "a string or null",
        }),
    }
}

/// Pull a platform's fields out of the loose record.
///
/// A legacy `{platform}_published` boolean is honoured when no explicit
/// status is present and is not written back.
fn take_platform_state(
    platform: Platform,
    rest: &mut Map<String, Value>,
) -> Result<Option<PlatformState>, RecordError> {
    let key = platform.key();
    let [status_field, published_field, url_field, error_field, timestamp_field] =
        ["status", "published", "url", "error", "timestamp"].map(|suffix| format!("{key}_{suffix}"));

    let present = [
        &status_field,
        &published_field,
        &url_field,
        &error_field,
        &timestamp_field,
    ]
    .into_iter()
    .any(|field| rest.contains_key(field.as_str()));
    if !present {
        return Ok(None);
    }

    let legacy_published = match rest.remove(&published_field) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(flag),
        Some(_) => {
            return Err(RecordError::FieldType {
                field: published_field,
                expected: "a boolean",
            })
        }
    };

    let status = match take_string(rest, &status_field)? {
        Some(raw) => match raw.as_str() {
            "pending" => PlatformStatus::Pending,
            "published" => PlatformStatus::Published,
            "failed" => PlatformStatus::Failed,
            _ => {
                return Err(RecordError::UnknownStatus {
                    field: status_field,
                    value: raw,
                })
            }
        },
        None if legacy_published == Some(true) => PlatformStatus::Published,
        None => PlatformStatus::Pending,
    };

    let url = take_string(rest, &url_field)?;
    let error = take_string(rest, &error_field)?;
    let timestamp = match take_string(rest, &timestamp_field)? {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|_| RecordError::BadTimestamp {
                    field: timestamp_field,
                    value: raw,
                })?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(Some(PlatformState {
        status,
        url,
        error,
        timestamp,
    }))
}
