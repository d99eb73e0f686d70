//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from OAUTH_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cms_auth::{AuthConfig, DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET};
use common::Secret;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// CMS backend settings
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub api_url: String,
    /// Per-request timeout; none means the transport default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// OAuth client settings
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to OAUTH_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    /// Origin the loopback callback listener binds to
    #[serde(default = "default_callback_origin")]
    pub callback_origin: String,
    /// Authorization endpoint override; defaults to `{api_url}/oauth/authorize`
    #[serde(default)]
    pub authorize_url: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            client_secret: None,
            client_secret_file: None,
            callback_origin: default_callback_origin(),
            authorize_url: None,
        }
    }
}

/// Local session persistence
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_callback_origin() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_token_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn require_http(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    /// 3. development default
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("CMS_API_URL") {
            config.backend.api_url = url;
        }
        if let Ok(client_id) = std::env::var("OAUTH_CLIENT_ID") {
            config.oauth.client_id = client_id;
        }

        require_http("api_url", &config.backend.api_url)?;
        require_http("callback_origin", &config.oauth.callback_origin)?;

        if config.backend.timeout_secs == Some(0) {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.oauth.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        if let Ok(secret) = std::env::var("OAUTH_CLIENT_SECRET") {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("cms-client.toml")
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.backend.timeout_secs.map(Duration::from_secs)
    }

    /// Settings for `AuthService`.
    pub fn auth_config(&self) -> AuthConfig {
        let client_secret = self
            .oauth
            .client_secret
            .clone()
            .unwrap_or_else(|| Secret::new(DEFAULT_CLIENT_SECRET.to_string()));
        AuthConfig {
            api_url: self.backend.api_url.clone(),
            client_id: self.oauth.client_id.clone(),
            client_secret,
            callback_origin: self.oauth.callback_origin.clone(),
            authorize_url: self.oauth.authorize_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "CMS_API_URL",
        "OAUTH_CLIENT_ID",
        "OAUTH_CLIENT_SECRET",
        "CONFIG_PATH",
    ];

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn clear_env() {
        for key in ENV_KEYS {
            unsafe { std::env::remove_var(key) };
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("cms-client.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn minimal_toml() -> &'static str {
        r#"
[backend]
api_url = "https://cms.example.com"
"#
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        let config = Config::load(&path).unwrap();

        assert_eq!(config.backend.api_url, "https://cms.example.com");
        assert!(config.timeout().is_none());
        assert_eq!(config.oauth.client_id, DEFAULT_CLIENT_ID);
        assert_eq!(config.oauth.callback_origin, "http://127.0.0.1:8765");
        assert_eq!(config.storage.token_path, PathBuf::from("session.json"));
        assert!(config.oauth.client_secret.is_none());
        assert_eq!(
            config.auth_config().client_secret.expose(),
            DEFAULT_CLIENT_SECRET
        );
    }

    #[test]
    fn full_config_is_read() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[backend]
api_url = "https://cms.example.com"
timeout_secs = 15

[oauth]
client_id = "my-client"
callback_origin = "http://localhost:9000"
authorize_url = "https://sso.example.com/authorize"

[storage]
token_path = "/var/lib/cms/session.json"
"#,
        );

        let config = Config::load(&path).unwrap();

        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
        let auth = config.auth_config();
        assert_eq!(auth.client_id, "my-client");
        assert_eq!(auth.redirect_uri(), "http://localhost:9000/auth/callback");
        assert_eq!(
            auth.authorize_endpoint(),
            "https://sso.example.com/authorize"
        );
        assert_eq!(
            config.storage.token_path,
            PathBuf::from("/var/lib/cms/session.json")
        );
    }

    #[test]
    fn env_overrides_api_url_and_client_id() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        unsafe { set_env("CMS_API_URL", "http://localhost:8080") };
        unsafe { set_env("OAUTH_CLIENT_ID", "env-client") };
        let config = Config::load(&path).unwrap();
        unsafe { clear_env() };

        assert_eq!(config.backend.api_url, "http://localhost:8080");
        assert_eq!(config.oauth.client_id, "env-client");
    }

    #[test]
    fn client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[backend]
api_url = "https://cms.example.com"

[oauth]
client_secret_file = "{}"
"#,
                secret_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();

        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
    }

    #[test]
    fn client_secret_env_overrides_missing_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[backend]
api_url = "https://cms.example.com"

[oauth]
client_secret_file = "/nonexistent/client_secret"
"#,
        );

        unsafe { set_env("OAUTH_CLIENT_SECRET", "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { clear_env() };

        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "env-secret"
        );
    }

    #[test]
    fn missing_secret_file_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[backend]
api_url = "https://cms.example.com"

[oauth]
client_secret_file = "/nonexistent/client_secret"
"#,
        );

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("client_secret_file"), "got: {err}");
    }

    #[test]
    fn api_url_without_scheme_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[backend]
api_url = "cms.example.com"
"#,
        );

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("api_url must start with http"), "got: {err}");
    }

    #[test]
    fn zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[backend]
api_url = "https://cms.example.com"
timeout_secs = 0
"#,
        );

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_file_and_invalid_toml_are_errors() {
        assert!(Config::load(Path::new("/nonexistent/cms-client.toml")).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_env() };
        assert_eq!(Config::resolve_path(None), PathBuf::from("cms-client.toml"));

        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        assert_eq!(Config::resolve_path(None), PathBuf::from("/env/path.toml"));
        assert_eq!(
            Config::resolve_path(Some("/cli/wins.toml")),
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { clear_env() };
    }
}
