//! Configuration loading and validation.
//!
//! Loads `syndicate.toml` (or `$SYNDICATE_CONFIG`, or an explicit `--config`
//! path). A missing default file yields built-in defaults.
//!
//! Precedence: CLI flags > env vars > config file > defaults.
//!
//! The loaded [`Config`] is resolved once per run into [`RunSettings`] for a
//! single platform; nothing below the entry point reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::content::Platform;
use crate::publisher::{devto, hashnode, DEFAULT_TIMEOUT_SECS};
use crate::transform::{Footer, FooterError, TagAlphabet, TagPolicy};

/// Default config file name in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "syndicate.toml";

// ── Errors ──────────────────────────────────────────────────────

/// Fatal configuration problems, reported before any item is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file exists but could not be read.
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Config file is not valid TOML for [`Config`].
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Environment override has an unusable value.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidEnv {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// A setting is out of range.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Setting name.
        field: &'static str,
        /// Why it is rejected.
        reason: String,
    },
    /// Footer configuration is unusable.
    #[error("invalid footer: {0}")]
    Footer(#[from] FooterError),
    /// Endpoint is not an absolute http(s) URL.
    #[error("invalid {platform} endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// Platform.
        platform: Platform,
        /// Configured endpoint.
        endpoint: String,
        /// Parse failure.
        reason: String,
    },
    /// A required credential is absent or blank.
    #[error("missing {platform} credential: {key} is not set")]
    MissingCredential {
        /// Platform needing the credential.
        platform: Platform,
        /// Environment key that was looked up.
        key: String,
    },
    /// A required platform setting is absent.
    #[error("missing {platform} setting: {setting}")]
    MissingSetting {
        /// Platform.
        platform: Platform,
        /// Setting name.
        setting: &'static str,
    },
    /// The credentials file is unreadable or too permissive.
    #[error("credentials file {}: {reason}", path.display())]
    CredentialsFile {
        /// `.env` path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

// ── File model ──────────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run pacing and limits.
    pub run: RunConfig,
    /// Queue/archive file locations.
    pub storage: StorageConfig,
    /// Promotional footer appended to every submission.
    pub footer: Option<FooterConfig>,
    /// Per-platform settings.
    pub platforms: PlatformsConfig,
}

/// Per-run limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum successful publications per run.
    pub max_per_run: u32,
    /// Seconds to wait after a successful publication before the next submission.
    pub pacing_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_per_run: default_max_per_run(),
            pacing_secs: default_pacing_secs(),
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `{platform}.queue.json` and `{platform}.archive.json`.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("content"),
        }
    }
}

/// Footer text and the markers that prove it is already present.
#[derive(Debug, Clone, Deserialize)]
pub struct FooterConfig {
    /// Markdown block appended after a blank line.
    pub text: String,
    /// Substrings of `text`; any of them in a body means "already has footer".
    #[serde(default)]
    pub markers: Vec<String>,
}

/// Settings for every platform.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    /// Dev.to.
    pub devto: PlatformConfig,
    /// Hashnode.
    pub hashnode: PlatformConfig,
}

impl PlatformsConfig {
    /// Settings for one platform.
    pub fn get(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::Devto => &self.devto,
            Platform::Hashnode => &self.hashnode,
        }
    }
}

/// Settings for one platform; unset fields take platform defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Environment key holding the API key.
    pub api_key_env: Option<String>,
    /// Environment key holding the publication id (Hashnode).
    pub publication_id_env: Option<String>,
    /// API endpoint.
    pub endpoint: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Queue file path.
    pub queue: Option<PathBuf>,
    /// Archive file path.
    pub archive: Option<PathBuf>,
    /// Tag policy overrides.
    pub tags: Option<TagPolicyConfig>,
}

/// Tag policy overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TagPolicyConfig {
    /// Maximum tags.
    pub max_tags: Option<usize>,
    /// Allowed alphabet.
    pub alphabet: Option<TagAlphabet>,
    /// Maximum tag length.
    pub max_len: Option<usize>,
    /// Fallback tag; an empty string disables the fallback.
    pub fallback: Option<String>,
}

// Default value functions for serde

fn default_max_per_run() -> u32 {
    3
}
fn default_pacing_secs() -> u64 {
    30
}

// ── Resolved settings ───────────────────────────────────────────

/// Command-line overrides applied on top of the file and environment.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// `--max`
    pub max_per_run: Option<u32>,
    /// `--pacing-secs`
    pub pacing_secs: Option<u64>,
    /// `--queue`
    pub queue: Option<PathBuf>,
    /// `--archive`
    pub archive: Option<PathBuf>,
}

/// Everything one run against one platform needs, validated.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Target platform.
    pub platform: Platform,
    /// Per-run success cap (at least 1).
    pub max_per_run: u32,
    /// Delay after each success when more are permitted.
    pub pacing: Duration,
    /// Queue file.
    pub queue_path: PathBuf,
    /// Archive file.
    pub archive_path: PathBuf,
    /// Tag policy.
    pub tag_policy: TagPolicy,
    /// Footer, if configured.
    pub footer: Option<Footer>,
    /// API endpoint.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Environment key holding the API key.
    pub api_key_env: String,
    /// Environment key holding the publication id, when the platform needs one.
    pub publication_id_env: Option<String>,
}

impl Config {
    /// Load configuration: explicit path, else `$SYNDICATE_CONFIG`, else
    /// `./syndicate.toml`; then apply environment overrides.
    ///
    /// A missing file is an error only when the path was given explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed or an
    /// environment override is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    #[doc(hidden)]
    pub fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match env("SYNDICATE_CONFIG") {
                Some(path) => (PathBuf::from(path), true),
                None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!("no config file found, using defaults");
                Config::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.apply_overrides(env)?;
        Ok(config)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = env("MAX_ARTICLES_PER_RUN") {
            self.run.max_per_run = parse_env("MAX_ARTICLES_PER_RUN", &v)?;
        }
        if let Some(v) = env("SYNDICATE_PACING_SECS") {
            self.run.pacing_secs = parse_env("SYNDICATE_PACING_SECS", &v)?;
        }
        if let Some(v) = env("SYNDICATE_STORAGE_DIR") {
            if !v.trim().is_empty() {
                self.storage.dir = PathBuf::from(v);
            }
        }
        Ok(())
    }

    /// Queue and archive paths for a platform, before CLI overrides.
    pub fn storage_paths(&self, platform: Platform) -> (PathBuf, PathBuf) {
        let section = self.platforms.get(platform);
        let queue = section.queue.clone().unwrap_or_else(|| {
            self.storage
                .dir
                .join(format!("{}.queue.json", platform.key()))
        });
        let archive = section.archive.clone().unwrap_or_else(|| {
            self.storage
                .dir
                .join(format!("{}.archive.json", platform.key()))
        });
        (queue, archive)
    }

    /// Resolve and validate settings for one run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero cap, a malformed footer or an
    /// invalid endpoint.
    pub fn settings(
        &self,
        platform: Platform,
        overrides: &RunOverrides,
    ) -> Result<RunSettings, ConfigError> {
        let section = self.platforms.get(platform);

        let max_per_run = overrides.max_per_run.unwrap_or(self.run.max_per_run);
        if max_per_run == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_per_run",
                reason: "must be at least 1".to_owned(),
            });
        }
        let pacing = Duration::from_secs(overrides.pacing_secs.unwrap_or(self.run.pacing_secs));

        let (queue_path, archive_path) = self.storage_paths(platform);
        let queue_path = overrides.queue.clone().unwrap_or(queue_path);
        let archive_path = overrides.archive.clone().unwrap_or(archive_path);
        if queue_path == archive_path {
            return Err(ConfigError::InvalidValue {
                field: "archive",
                reason: format!("queue and archive both point at {}", queue_path.display()),
            });
        }

        let footer = self
            .footer
            .as_ref()
            .map(|f| Footer::new(f.text.clone(), f.markers.clone()))
            .transpose()?;

        let endpoint = section
            .endpoint
            .clone()
            .unwrap_or_else(|| default_endpoint(platform).to_owned());
        validate_endpoint(platform, &endpoint)?;

        let timeout_secs = section.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                reason: "must be at least 1".to_owned(),
            });
        }

        let (api_key_env, publication_id_env) = match platform {
            Platform::Devto => (
                section
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| "DEVTO_API_KEY".to_owned()),
                None,
            ),
            Platform::Hashnode => (
                section
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| "HASHNODE_API_KEY".to_owned()),
                Some(
                    section
                        .publication_id_env
                        .clone()
                        .unwrap_or_else(|| "HASHNODE_PUBLICATION_ID".to_owned()),
                ),
            ),
        };

        Ok(RunSettings {
            platform,
            max_per_run,
            pacing,
            queue_path,
            archive_path,
            tag_policy: tag_policy(platform, section.tags.as_ref()),
            footer,
            endpoint,
            timeout_secs,
            api_key_env,
            publication_id_env,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn default_endpoint(platform: Platform) -> &'static str {
    match platform {
        Platform::Devto => devto::DEFAULT_DEVTO_URL,
        Platform::Hashnode => hashnode::DEFAULT_HASHNODE_URL,
    }
}

fn validate_endpoint(platform: Platform, endpoint: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        platform,
        endpoint: endpoint.to_owned(),
        reason,
    };
    let url = url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

fn tag_policy(platform: Platform, overrides: Option<&TagPolicyConfig>) -> TagPolicy {
    let mut policy = TagPolicy::for_platform(platform);
    if let Some(o) = overrides {
        if let Some(max_tags) = o.max_tags {
            policy.max_tags = max_tags;
        }
        if let Some(alphabet) = o.alphabet {
            policy.alphabet = alphabet;
        }
        if let Some(max_len) = o.max_len {
            policy.max_len = max_len;
        }
        if let Some(fallback) = o.fallback.as_deref() {
            policy.fallback = (!fallback.trim().is_empty()).then(|| fallback.to_owned());
        }
    }
    policy
}
