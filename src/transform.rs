//! Pre-submission content transforms.
//!
//! Both transforms are pure and idempotent: applying them twice yields the
//! same result as applying them once, so retries and re-runs never stack
//! footers or drift tags.

use std::collections::HashSet;

use serde::Deserialize;

use crate::content::Platform;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Characters a platform accepts in a tag (after lower-casing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAlphabet {
    /// `[a-z0-9]`
    Alphanumeric,
    /// `[a-z0-9-]`, hyphens never leading or trailing.
    AlphanumericHyphen,
}

impl TagAlphabet {
    fn allows(self, c: char) -> bool {
        match self {
            Self::Alphanumeric => c.is_ascii_lowercase() || c.is_ascii_digit(),
            Self::AlphanumericHyphen => c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-',
        }
    }
}

/// Syntactic tag constraints of one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    /// Maximum number of tags submitted.
    pub max_tags: usize,
    /// Allowed characters.
    pub alphabet: TagAlphabet,
    /// Maximum characters per tag.
    pub max_len: usize,
    /// Tag used when normalization leaves nothing.
    pub fallback: Option<String>,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self {
            max_tags: 4,
            alphabet: TagAlphabet::Alphanumeric,
            max_len: 30,
            fallback: None,
        }
    }
}

impl TagPolicy {
    /// Built-in policy for a platform.
    ///
    /// Dev.to takes up to four alphanumeric tags and accepts untagged
    /// articles. Hashnode takes slug-style tags and always gets at least one.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Devto => Self::default(),
            Platform::Hashnode => Self {
                max_tags: 5,
                alphabet: TagAlphabet::AlphanumericHyphen,
                max_len: 50,
                fallback: Some("general".to_owned()),
            },
        }
    }

    fn normalize_one(&self, raw: &str) -> Option<String> {
        let trim_hyphens = |s: &str| s.trim_matches('-').to_owned();

        let filtered: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| self.alphabet.allows(*c))
            .collect();
        let truncated: String = trim_hyphens(&filtered)
            .chars()
            .take(self.max_len)
            .collect();
        let tag = trim_hyphens(&truncated);
        (!tag.is_empty()).then_some(tag)
    }
}

/// Normalize raw tags for submission under `policy`.
///
/// Lower-cases, strips characters outside the alphabet, truncates, drops
/// empties and duplicates (first occurrence wins) and caps the count. When
/// nothing survives, the policy's fallback tag is used if it has one.
pub fn normalize_tags(tags: &[String], policy: &TagPolicy) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = tags
        .iter()
        .filter_map(|raw| policy.normalize_one(raw))
        .filter(|tag| seen.insert(tag.clone()))
        .take(policy.max_tags)
        .collect();

    if out.is_empty() && policy.max_tags > 0 {
        if let Some(fallback) = policy
            .fallback
            .as_deref()
            .and_then(|f| policy.normalize_one(f))
        {
            out.push(fallback);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

/// A promotional block appended to every submitted body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    text: String,
    markers: Vec<String>,
}

/// Invalid footer configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FooterError {
    /// Footer text is blank.
    #[error("footer text must not be empty")]
    EmptyText,
    /// A marker is not contained in the footer, so injection would repeat.
    #[error("footer marker {0:?} does not appear in the footer text")]
    MarkerNotInText(String),
}

impl Footer {
    /// Build a footer. With no markers the whole (trimmed) text is the marker.
    ///
    /// # Errors
    ///
    /// Returns [`FooterError`] if the text is blank or a marker is empty or
    /// absent from the text.
    pub fn new(text: impl Into<String>, markers: Vec<String>) -> Result<Self, FooterError> {
        let text = text.into().trim().to_owned();
        if text.is_empty() {
            return Err(FooterError::EmptyText);
        }
        let markers = if markers.is_empty() {
            vec![text.clone()]
        } else {
            markers
        };
        if let Some(bad) = markers
            .iter()
            .find(|marker| marker.is_empty() || !text.contains(marker.as_str()))
        {
            return Err(FooterError::MarkerNotInText(bad.clone()));
        }
        Ok(Self { text, markers })
    }

    /// Footer text as appended.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substrings whose presence means the footer is already there.
    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

/// Ensure the footer is present exactly once.
///
/// Returns `body` unchanged when any marker already appears in it; otherwise
/// appends the footer after a blank line.
pub fn inject_footer(body: &str, footer: &Footer) -> String {
    if footer
        .markers
        .iter()
        .any(|marker| body.contains(marker.as_str()))
    {
        return body.to_owned();
    }

    let trimmed = body.trim_end();
    if trimmed.is_empty() {
        return footer.text.clone();
    }
    format!("{trimmed}\n\n{}", footer.text)
}
