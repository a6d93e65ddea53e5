//! Supabase client handle: credentials, derived service endpoints, authorized requests.

use crate::credentials::Credentials;
use crate::error::{ApiError, AuthError, ConfigError, Error};
use crate::helpers::redact_key;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const REST_PATH: &str = "rest/v1";
const AUTH_PATH: &str = "auth/v1";
const STORAGE_PATH: &str = "storage/v1";
const FUNCTIONS_PATH: &str = "functions/v1";
const REALTIME_PATH: &str = "realtime/v1";

/// Tuning for [`Client::with_options`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    /// Sent on every request after the defaults; same-named defaults are replaced.
    pub headers: Vec<(String, String)>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

/// Supabase project client.
///
/// Holds the credentials and a pooled HTTP client. Cloning shares the pool.
#[derive(Clone)]
pub struct Client {
    credentials: Credentials,
    rest_url: Url,
    auth_url: Url,
    storage_url: Url,
    functions_url: Url,
    realtime_url: Url,
    headers: HeaderMap,
    http: HttpClient,
}

/// Build a client from a project URL and API key.
pub fn create_client(url: &str, key: &str) -> Result<Client, Error> {
    Client::new(Credentials::new(url, key)?)
}

impl Client {
    /// Create a client with default options.
    pub fn new(credentials: Credentials) -> Result<Self, Error> {
        Self::with_options(credentials, ClientOptions::default())
    }

    pub fn with_options(credentials: Credentials, options: ClientOptions) -> Result<Self, Error> {
        let base = credentials.base_url();
        let join = |path: &str| {
            base.join(path).map_err(|e| ConfigError::InvalidUrl {
                url: credentials.url().to_string(),
                reason: e.to_string(),
            })
        };
        let rest_url = join(REST_PATH)?;
        let auth_url = join(AUTH_PATH)?;
        let storage_url = join(STORAGE_PATH)?;
        let functions_url = join(FUNCTIONS_PATH)?;
        let mut realtime_url = join(REALTIME_PATH)?;
        let ws_scheme = if realtime_url.scheme() == "https" { "wss" } else { "ws" };
        realtime_url
            .set_scheme(ws_scheme)
            .map_err(|_| ConfigError::UnsupportedScheme(ws_scheme.to_string()))?;

        let headers = default_headers(credentials.key(), &options.headers)?;
        let http = HttpClient::builder()
            .timeout(options.timeout)
            .default_headers(headers.clone())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        tracing::debug!(
            url = credentials.url(),
            key = %redact_key(credentials.key()),
            "supabase client created"
        );
        Ok(Self {
            credentials,
            rest_url,
            auth_url,
            storage_url,
            functions_url,
            realtime_url,
            headers,
            http,
        })
    }

    /// Project URL as supplied, without trailing slash.
    pub fn url(&self) -> &str {
        self.credentials.url()
    }

    pub fn key(&self) -> &str {
        self.credentials.key()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// PostgREST endpoint (`<url>/rest/v1`).
    pub fn rest_url(&self) -> &Url {
        &self.rest_url
    }

    /// Auth endpoint (`<url>/auth/v1`).
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Storage endpoint (`<url>/storage/v1`).
    pub fn storage_url(&self) -> &Url {
        &self.storage_url
    }

    /// Edge functions endpoint (`<url>/functions/v1`).
    pub fn functions_url(&self) -> &Url {
        &self.functions_url
    }

    /// Realtime websocket endpoint (`ws(s)://.../realtime/v1`).
    pub fn realtime_url(&self) -> &Url {
        &self.realtime_url
    }

    /// Headers attached to every request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Authorized request builder for an arbitrary project URL.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Check the auth service health endpoint.
    pub async fn health(&self) -> Result<Value, Error> {
        let url = join_segment(&self.auth_url, "health")?;
        self.send(self.request(Method::GET, url)).await
    }

    /// Send a request and decode the JSON body, mapping error statuses.
    pub async fn send(&self, req: RequestBuilder) -> Result<Value, Error> {
        let res = req.send().await?;
        let status = res.status();
        let body = res.text().await?;
        let data: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        if status.as_u16() == 401 {
            return Err(Error::Auth(AuthError {
                message: "Authentication failed. Check your API key.".to_string(),
            }));
        }
        if !status.is_success() {
            let msg = ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|k| data.get(*k).and_then(Value::as_str))
                .unwrap_or("API request failed");
            tracing::debug!(status = status.as_u16(), "supabase request failed");
            return Err(Error::Api(ApiError::new(
                msg,
                Some(status.as_u16()),
                Some(data.clone()),
            )));
        }
        Ok(data)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url())
            .field("key", &redact_key(self.key()))
            .finish_non_exhaustive()
    }
}

fn default_headers(key: &str, extra: &[(String, String)]) -> Result<HeaderMap, ConfigError> {
    let invalid = |name: &str, reason: String| ConfigError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let mut headers = HeaderMap::new();
    let mut api_key = HeaderValue::from_str(key).map_err(|_| ConfigError::InvalidKey)?;
    api_key.set_sensitive(true);
    let mut bearer =
        HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|_| ConfigError::InvalidKey)?;
    bearer.set_sensitive(true);
    headers.insert("apikey", api_key);
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(
        "x-client-info",
        HeaderValue::from_str(&format!("hisband/{}", crate::VERSION))
            .map_err(|e| invalid("x-client-info", e.to_string()))?,
    );
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("hisband/{}", crate::VERSION))
            .map_err(|e| invalid("user-agent", e.to_string()))?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (name, value) in extra {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(name, e.to_string()))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(name, e.to_string()))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Append one path segment, keeping any existing prefix.
fn join_segment(base: &Url, segment: &str) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Other(format!("cannot extend url {}", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}
