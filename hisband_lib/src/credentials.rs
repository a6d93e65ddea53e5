//! Endpoint credentials: the validated (project URL, API key) pair.

use crate::error::ConfigError;
use crate::helpers::redact_key;
use crate::secret::{env_value, Backend};
use reqwest::header::HeaderValue;
use std::fmt;
use url::Url;

/// Environment variable holding the project URL.
pub const URL_ENV: &str = "SUPABASE_URL";

/// Environment variables checked for the key, in order.
pub const KEY_ENV_VARS: [&str; 3] = ["SUPABASE_ANON_KEY", "SUPABASE_KEY", "SUPABASE_SERVICE_KEY"];

/// Where the API key was obtained (for diagnostics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    Env(&'static str),
    Secret(Backend),
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Explicit => f.write_str("explicit"),
            KeySource::Env(var) => write!(f, "env:{}", var),
            KeySource::Secret(backend) => write!(f, "secret:{}", backend.name()),
        }
    }
}

/// Validated project URL and API key. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    url: String,
    base: Url,
    key: String,
}

impl Credentials {
    /// Validate a URL and key pair.
    ///
    /// The URL must be absolute `http`/`https` with a host; the key must be
    /// non-empty and usable as a header value.
    pub fn new(url: &str, key: &str) -> Result<Self, ConfigError> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        let mut base = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(base.scheme().to_string()));
        }
        match base.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(ConfigError::InvalidUrl {
                    url: url.to_string(),
                    reason: "missing host".to_string(),
                })
            }
        }
        if !base.username().is_empty() || base.password().is_some() {
            let mut shown = base.clone();
            let _ = shown.set_username("");
            let _ = shown.set_password(None);
            return Err(ConfigError::InvalidUrl {
                url: shown.to_string(),
                reason: "userinfo is not allowed in the project url".to_string(),
            });
        }
        // Service paths are joined relative to the base, so it must end in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingKey);
        }
        if HeaderValue::from_str(key).is_err() {
            return Err(ConfigError::InvalidKey);
        }

        Ok(Self {
            url: url.to_string(),
            base,
            key: key.to_string(),
        })
    }

    /// Read the URL from `SUPABASE_URL` and the key via [`resolve_key`].
    pub fn from_env() -> Result<(Self, KeySource), ConfigError> {
        let url = env_value(URL_ENV).ok_or(ConfigError::MissingUrl)?;
        let (key, source) = resolve_key().ok_or(ConfigError::MissingKey)?;
        Ok((Self::new(&url, &key)?, source))
    }

    /// Project URL as supplied, without trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Base URL with a trailing slash, for joining service paths.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("key", &redact_key(&self.key))
            .finish()
    }
}

/// Find the API key: environment variables first, then secret backends.
pub fn resolve_key() -> Option<(String, KeySource)> {
    for var in KEY_ENV_VARS {
        if let Some(k) = env_value(var) {
            tracing::debug!(source = var, "api key found in environment");
            return Some((k, KeySource::Env(var)));
        }
    }
    for backend in Backend::ALL {
        if let Some(k) = backend.read() {
            tracing::debug!(source = backend.name(), "api key read from secret backend");
            return Some((k, KeySource::Secret(backend)));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 13] = [
        "SUPABASE_URL",
        "SUPABASE_ANON_KEY",
        "SUPABASE_KEY",
        "SUPABASE_SERVICE_KEY",
        "SUPABASE_OP_ENTRY_PATH",
        "SUPABASE_OP_VAULT",
        "SUPABASE_OP_ITEM",
        "SUPABASE_OP_FIELD",
        "SUPABASE_BW_ITEM_ID",
        "SUPABASE_BW_SESSION",
        "SUPABASE_KPXC_DB",
        "SUPABASE_KPXC_ENTRY",
        "SUPABASE_KPXC_ATTRIBUTE",
    ];

    #[test]
    fn accepts_valid_pair() {
        let c = Credentials::new("https://example.supabase.co", "abc123").unwrap();
        assert_eq!(c.url(), "https://example.supabase.co");
        assert_eq!(c.base_url().as_str(), "https://example.supabase.co/");
        assert_eq!(c.key(), "abc123");
    }

    #[test]
    fn trims_trailing_slash_and_keeps_path_prefix() {
        let c = Credentials::new(" https://db.example.com/supabase/ ", " k ").unwrap();
        assert_eq!(c.url(), "https://db.example.com/supabase");
        assert_eq!(c.base_url().as_str(), "https://db.example.com/supabase/");
        assert_eq!(c.key(), "k");
    }

    #[test]
    fn rejects_empty_and_malformed_urls() {
        assert_eq!(Credentials::new("", "k"), Err(ConfigError::MissingUrl));
        assert_eq!(Credentials::new("   /", "k"), Err(ConfigError::MissingUrl));
        assert!(matches!(
            Credentials::new("example.supabase.co", "k"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert_eq!(
            Credentials::new("ftp://example.supabase.co", "k"),
            Err(ConfigError::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn rejects_userinfo_without_echoing_it() {
        let err = Credentials::new("https://user:pw@x.supabase.co:8443/p", "k").unwrap_err();
        match &err {
            ConfigError::InvalidUrl { url, .. } => {
                assert_eq!(url, "https://x.supabase.co:8443/p");
            }
            other => panic!("expected InvalidUrl, got {:?}", other),
        }
        assert!(!err.to_string().contains("pw"));
        assert!(!err.to_string().contains("user:"));
        assert!(Credentials::new("https://user@x.supabase.co", "k").is_err());
    }

    #[test]
    fn rejects_bad_keys() {
        assert_eq!(
            Credentials::new("https://example.supabase.co", "  "),
            Err(ConfigError::MissingKey)
        );
        assert_eq!(
            Credentials::new("https://example.supabase.co", "bad\nkey"),
            Err(ConfigError::InvalidKey)
        );
    }

    #[test]
    fn debug_redacts_key() {
        let c = Credentials::new("https://example.supabase.co", "super-secret-key-value").unwrap();
        let dbg = format!("{:?}", c);
        assert!(!dbg.contains("super-secret-key-value"));
        assert!(dbg.contains("super-****"));
    }

    /// Run `f` with every variable this crate reads unset, except those in `set`.
    fn with_env<R>(set: &[(&str, &str)], f: impl FnOnce() -> R) -> R {
        let mut vars: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = set.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        vars.extend(
            set.iter()
                .filter(|(k, _)| !ALL_VARS.contains(k))
                .map(|(k, v)| (*k, Some(*v))),
        );
        temp_env::with_vars(vars, f)
    }

    #[test]
    fn env_key_precedence() {
        with_env(
            &[("SUPABASE_KEY", "generic"), ("SUPABASE_SERVICE_KEY", "service")],
            || {
                let (key, source) = resolve_key().unwrap();
                assert_eq!(key, "generic");
                assert_eq!(source, KeySource::Env("SUPABASE_KEY"));
                assert_eq!(source.to_string(), "env:SUPABASE_KEY");
            },
        );
        with_env(
            &[("SUPABASE_ANON_KEY", "anon"), ("SUPABASE_KEY", "generic")],
            || {
                assert_eq!(
                    resolve_key(),
                    Some(("anon".to_string(), KeySource::Env("SUPABASE_ANON_KEY")))
                );
            },
        );
    }

    #[cfg(unix)]
    #[test]
    fn secret_backend_used_when_env_has_no_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let set = [
            ("PATH", path.as_str()),
            ("SUPABASE_OP_ENTRY_PATH", "op://Dev/Supabase"),
        ];
        with_env(&set, || {
            crate::secret::install_stub(dir.path(), "op", "echo op-key");
            let (key, source) = resolve_key().unwrap();
            assert_eq!(key, "op-key");
            assert_eq!(source, KeySource::Secret(Backend::OnePassword));
            assert_eq!(source.to_string(), "secret:1password");
        });
    }

    #[cfg(unix)]
    #[test]
    fn env_key_beats_secret_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let set = [
            ("PATH", path.as_str()),
            ("SUPABASE_OP_ENTRY_PATH", "op://Dev/Supabase"),
            ("SUPABASE_SERVICE_KEY", "from-env"),
        ];
        with_env(&set, || {
            crate::secret::install_stub(dir.path(), "op", "echo op-key");
            assert_eq!(
                resolve_key(),
                Some(("from-env".to_string(), KeySource::Env("SUPABASE_SERVICE_KEY")))
            );
        });
    }

    #[test]
    fn from_env_builds_credentials() {
        with_env(
            &[
                ("SUPABASE_URL", "https://example.supabase.co/"),
                ("SUPABASE_ANON_KEY", "abc123"),
            ],
            || {
                let (creds, source) = Credentials::from_env().unwrap();
                assert_eq!(creds.url(), "https://example.supabase.co");
                assert_eq!(creds.key(), "abc123");
                assert_eq!(source, KeySource::Env("SUPABASE_ANON_KEY"));
            },
        );
    }

    #[test]
    fn from_env_reports_missing_values() {
        with_env(&[], || {
            assert_eq!(Credentials::from_env(), Err(ConfigError::MissingUrl));
        });
        with_env(&[("SUPABASE_URL", "https://example.supabase.co")], || {
            assert_eq!(Credentials::from_env(), Err(ConfigError::MissingKey));
        });
    }
}
