//! Client bootstrap: build a client once and publish it under a well-known name.
//!
//! A [`Registry`] is a plain value, so components and tests can own their own.
//! [`global`] provides one process-wide registry for code that reads the
//! `supabase` binding without having it passed in.
//!
//! Publication is last-writer-wins. A failed initialize leaves the binding as it was.

use crate::client::{Client, ClientOptions};
use crate::credentials::Credentials;
use crate::error::Error;
use crate::helpers::{inspect_key, parse_project_url};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Name the bootstrap publishes the client under.
pub const DEFAULT_BINDING: &str = "supabase";

/// Named client bindings.
#[derive(Debug, Default)]
pub struct Registry {
    bindings: RwLock<HashMap<String, Arc<Client>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client and publish it under [`DEFAULT_BINDING`].
    pub fn initialize(&self, credentials: Credentials) -> Result<Arc<Client>, Error> {
        self.initialize_with(credentials, ClientOptions::default())
    }

    pub fn initialize_with(
        &self,
        credentials: Credentials,
        options: ClientOptions,
    ) -> Result<Arc<Client>, Error> {
        warn_on_risky_key(&credentials);
        let client = Client::with_options(credentials, options)?;
        Ok(self.publish(DEFAULT_BINDING, client))
    }

    /// Store `client` under `name`, replacing any previous handle.
    pub fn publish(&self, name: &str, client: Client) -> Arc<Client> {
        let client = Arc::new(client);
        let previous = self
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&client));
        if previous.is_some() {
            tracing::debug!(binding = name, url = client.url(), "client binding replaced");
        } else {
            tracing::debug!(binding = name, url = client.url(), "client binding published");
        }
        client
    }

    pub fn get(&self, name: &str) -> Option<Arc<Client>> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// The client published under [`DEFAULT_BINDING`].
    pub fn client(&self) -> Option<Arc<Client>> {
        self.get(DEFAULT_BINDING)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Client>> {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }
}

/// Process-wide registry.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::new)
}

/// Build a client from `url` and `key` and publish it in the [`global`] registry.
pub fn initialize(url: &str, key: &str) -> Result<Arc<Client>, Error> {
    global().initialize(Credentials::new(url, key)?)
}

/// Read the `supabase` binding from the [`global`] registry.
pub fn client() -> Option<Arc<Client>> {
    global().client()
}

/// Reasons a key deserves a warning at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyWarning {
    /// `service_role` keys bypass row level security.
    Privileged { role: String },
    Expired { expires_at: DateTime<Utc> },
    /// The key's `ref` claim names a different project than the URL.
    ProjectMismatch { key_ref: String, url_ref: String },
}

/// Inspect the key against the URL. Opaque keys never warn.
pub fn key_warnings(credentials: &Credentials, now: DateTime<Utc>) -> Vec<KeyWarning> {
    let info = inspect_key(credentials.key());
    let mut warnings = Vec::new();
    if info.is_privileged() {
        warnings.push(KeyWarning::Privileged {
            role: info.role.clone().unwrap_or_default(),
        });
    }
    if let Some(expires_at) = info.expires_at.filter(|_| info.is_expired(now)) {
        warnings.push(KeyWarning::Expired { expires_at });
    }
    let url_ref = parse_project_url(credentials.url())
        .ok()
        .and_then(|p| p.project_ref);
    if let (Some(key_ref), Some(url_ref)) = (info.project_ref, url_ref) {
        if key_ref != url_ref {
            warnings.push(KeyWarning::ProjectMismatch { key_ref, url_ref });
        }
    }
    warnings
}

fn warn_on_risky_key(credentials: &Credentials) {
    for warning in key_warnings(credentials, Utc::now()) {
        match warning {
            KeyWarning::Privileged { role } => tracing::warn!(
                role = %role,
                "privileged key in use; it bypasses row level security and must not reach clients"
            ),
            KeyWarning::Expired { expires_at } => {
                tracing::warn!(%expires_at, "api key has expired")
            }
            KeyWarning::ProjectMismatch { key_ref, url_ref } => {
                tracing::warn!(%key_ref, %url_ref, "api key was issued for a different project")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn creds(url: &str, key: &str) -> Credentials {
        Credentials::new(url, key).unwrap()
    }

    #[test]
    fn initialize_publishes_default_binding() {
        let registry = Registry::new();
        assert!(registry.client().is_none());

        let handle = registry
            .initialize(creds("https://example.supabase.co", "abc123"))
            .unwrap();
        assert_eq!(handle.url(), "https://example.supabase.co");

        let read = registry.get("supabase").unwrap();
        assert!(Arc::ptr_eq(&handle, &read));
        assert!(Arc::ptr_eq(&read, &registry.client().unwrap()));
    }

    #[test]
    fn reinitialize_overwrites_binding() {
        let registry = Registry::new();
        let first = registry
            .initialize(creds("https://first.supabase.co", "abc123"))
            .unwrap();
        let second = registry
            .initialize(creds("https://second.supabase.co", "def456"))
            .unwrap();

        let current = registry.client().unwrap();
        assert!(!Arc::ptr_eq(&first, &current));
        assert!(Arc::ptr_eq(&second, &current));
        assert_eq!(current.url(), "https://second.supabase.co");
        assert_eq!(current.key(), "def456");
        // Holders of the old handle keep a working client.
        assert_eq!(first.url(), "https://first.supabase.co");
    }

    #[test]
    fn failed_initialize_leaves_binding_untouched() {
        let registry = Registry::new();
        let options = ClientOptions {
            headers: vec![("bad header".to_string(), "x".to_string())],
            ..ClientOptions::default()
        };
        let err = registry
            .initialize_with(creds("https://example.supabase.co", "abc123"), options.clone())
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidHeader { .. })));
        assert!(registry.client().is_none());

        let kept = registry
            .initialize(creds("https://example.supabase.co", "abc123"))
            .unwrap();
        assert!(registry
            .initialize_with(creds("https://other.supabase.co", "abc123"), options)
            .is_err());
        assert!(Arc::ptr_eq(&kept, &registry.client().unwrap()));
    }

    #[test]
    fn named_bindings_are_independent() {
        let registry = Registry::new();
        let admin = Client::new(creds("https://example.supabase.co", "service")).unwrap();
        registry.publish("admin", admin);
        assert!(registry.client().is_none());
        assert_eq!(registry.get("admin").unwrap().key(), "service");
        assert!(registry.remove("admin").is_some());
        assert!(registry.get("admin").is_none());
    }

    fn jwt(role: &str, project_ref: &str, exp: i64) -> String {
        crate::helpers::fake_jwt(serde_json::json!({
            "iss": "supabase",
            "ref": project_ref,
            "role": role,
            "iat": 1_759_074_139,
            "exp": exp,
        }))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    const FAR_FUTURE: i64 = 2_074_650_139;

    #[test]
    fn matching_anon_key_has_no_warnings() {
        let c = creds("https://example.supabase.co", &jwt("anon", "example", FAR_FUTURE));
        assert!(key_warnings(&c, at(1_800_000_000)).is_empty());
    }

    #[test]
    fn service_role_key_warns() {
        let c = creds(
            "https://example.supabase.co",
            &jwt("service_role", "example", FAR_FUTURE),
        );
        assert_eq!(
            key_warnings(&c, at(1_800_000_000)),
            vec![KeyWarning::Privileged {
                role: "service_role".to_string()
            }]
        );
    }

    #[test]
    fn expired_key_warns() {
        let c = creds("https://example.supabase.co", &jwt("anon", "example", 1_760_000_000));
        assert_eq!(
            key_warnings(&c, at(1_800_000_000)),
            vec![KeyWarning::Expired {
                expires_at: at(1_760_000_000)
            }]
        );
        assert!(key_warnings(&c, at(1_759_999_999)).is_empty());
    }

    #[test]
    fn key_for_other_project_warns() {
        let c = creds("https://other.supabase.co", &jwt("anon", "example", FAR_FUTURE));
        assert_eq!(
            key_warnings(&c, at(1_800_000_000)),
            vec![KeyWarning::ProjectMismatch {
                key_ref: "example".to_string(),
                url_ref: "other".to_string(),
            }]
        );
    }

    #[test]
    fn self_hosted_url_skips_project_check() {
        let c = creds("https://db.example.com", &jwt("anon", "example", FAR_FUTURE));
        assert!(key_warnings(&c, at(1_800_000_000)).is_empty());
        let opaque = creds("https://other.supabase.co", "abc123");
        assert!(key_warnings(&opaque, at(1_800_000_000)).is_empty());
    }

    #[test]
    fn global_initialize_is_shared() {
        let err = initialize("", "abc123").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingUrl)));

        let handle = initialize("https://example.supabase.co", "abc123").unwrap();
        let read = client().unwrap();
        assert!(Arc::ptr_eq(&handle, &read));
        assert!(Arc::ptr_eq(&read, &global().get(DEFAULT_BINDING).unwrap()));
    }
}
