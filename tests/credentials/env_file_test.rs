//! Coverage for `.env` loading, precedence, and permission checks.

use std::fs;
use std::path::PathBuf;

use syndicate::config::ConfigError;
use syndicate::content::Platform;
use syndicate::credentials::load_credentials_with;

fn temp_env(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("temp dir should be created: {err}"),
    };
    let path = dir.path().join(".env");
    assert!(fs::write(&path, contents).is_ok());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        assert!(fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).is_ok());
    }

    (dir, path)
}

fn no_process_env() -> Vec<(String, String)> {
    Vec::new()
}

#[test]
fn loads_env_file() {
    let (_dir, path) = temp_env("DEVTO_API_KEY=abc123\nHASHNODE_API_KEY=\"quoted value\"\n");
    let loaded = load_credentials_with(Some(path.as_path()), no_process_env());
    assert!(loaded.is_ok());
    let credentials = match loaded {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };
    assert_eq!(credentials.get("DEVTO_API_KEY"), Some("abc123"));
    assert_eq!(credentials.get("HASHNODE_API_KEY"), Some("quoted value"));
}

#[test]
fn process_env_wins_over_file() {
    let (_dir, path) = temp_env("DEVTO_API_KEY=from-file\n");
    let process = vec![("DEVTO_API_KEY".to_owned(), "from-env".to_owned())];
    let credentials = match load_credentials_with(Some(path.as_path()), process) {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };
    assert_eq!(credentials.get("DEVTO_API_KEY"), Some("from-env"));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let missing = PathBuf::from("/nonexistent/syndicate/.env");
    assert!(matches!(
        load_credentials_with(Some(missing.as_path()), no_process_env()),
        Err(ConfigError::CredentialsFile { .. })
    ));
}

#[test]
fn require_reports_platform_and_key() {
    let (_dir, path) = temp_env("DEVTO_API_KEY=\n");
    let credentials = match load_credentials_with(Some(path.as_path()), no_process_env()) {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };
    match credentials.require(Platform::Devto, "DEVTO_API_KEY") {
        Err(ConfigError::MissingCredential { platform, key }) => {
            assert_eq!(platform, Platform::Devto);
            assert_eq!(key, "DEVTO_API_KEY");
        }
        other => panic!("blank key should be missing, got {other:?}"),
    }
}

#[test]
fn debug_output_hides_values() {
    let (_dir, path) = temp_env("DEVTO_API_KEY=super-secret-value\n");
    let credentials = match load_credentials_with(Some(path.as_path()), no_process_env()) {
        Ok(credentials) => credentials,
        Err(err) => panic!("credentials should load: {err}"),
    };
    assert!(!format!("{credentials:?}").contains("super-secret-value"));
}

#[cfg(unix)]
#[test]
fn rejects_group_readable_env_file() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, path) = temp_env("DEVTO_API_KEY=abc123\n");
    assert!(fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).is_ok());

    match load_credentials_with(Some(path.as_path()), no_process_env()) {
        Err(ConfigError::CredentialsFile { reason, .. }) => assert!(reason.contains("0600")),
        Err(other) => panic!("expected a credentials file error, got {other}"),
        Ok(_) => panic!("world-readable file should be rejected"),
    }
}
