//! Credential loading from an optional `.env` file and the process environment.
//!
//! Process environment values win over the file, matching `dotenvy`'s
//! behaviour. Values are never logged or printed.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::ConfigError;
use crate::content::Platform;

/// Default `.env` path in the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Credentials available to publishers.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.len())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a credential value for a key, if present and non-blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns a required credential or a configuration error when missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the key is absent or blank.
    pub fn require(&self, platform: Platform, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .map(str::to_owned)
            .ok_or_else(|| ConfigError::MissingCredential {
                platform,
                key: key.to_owned(),
            })
    }
}

/// Load credentials from the process environment overlaid on `env_file`.
///
/// When `env_file` is `None` the default `.env` is used if it exists. An
/// explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::CredentialsFile`] if the file is missing (when
/// explicit), readable by group/other on unix, or cannot be parsed.
pub fn load_credentials(env_file: Option<&Path>) -> Result<Credentials, ConfigError> {
    load_credentials_with(env_file, std::env::vars())
}

/// Load credentials with an explicit process environment (for testing).
#[doc(hidden)]
pub fn load_credentials_with(
    env_file: Option<&Path>,
    process_env: impl IntoIterator<Item = (String, String)>,
) -> Result<Credentials, ConfigError> {
    let mut vars = BTreeMap::new();

    let (path, explicit) = match env_file {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_ENV_FILE), false),
    };

    if path.exists() {
        vars.extend(read_env_file(path)?);
        tracing::debug!(path = %path.display(), "loaded credentials file");
    } else if explicit {
        return Err(ConfigError::CredentialsFile {
            path: path.to_path_buf(),
            reason: "file does not exist".to_owned(),
        });
    }

    vars.extend(process_env);
    Ok(Credentials { vars })
}

fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let file_error = |reason: String| ConfigError::CredentialsFile {
        path: path.to_path_buf(),
        reason,
    };

    validate_private_permissions(path).map_err(file_error)?;

    let iter = dotenvy::from_path_iter(path).map_err(|e| file_error(e.to_string()))?;
    let mut vars = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| file_error(format!("invalid entry: {e}")))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| format!("failed to inspect: {e}"))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(format!("must be 0600, found {mode:o}"));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(path: &Path) -> Result<(), String> {
    fs::metadata(path)
        .map(|_| ())
        .map_err(|e| format!("failed to inspect: {e}"))
}
