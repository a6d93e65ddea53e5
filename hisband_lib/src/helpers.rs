//! Helpers for project URL parsing, API key inspection and display.

use base64::Engine;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

const HOSTED_DOMAINS: [&str; 2] = [".supabase.co", ".supabase.in"];
const PUBLISHABLE_PREFIX: &str = "sb_publishable_";
const SECRET_PREFIX: &str = "sb_secret_";

/// Where a Supabase project is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    Hosted,
    Local,
    SelfHosted,
}

/// Result of parsing a Supabase project URL.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedProjectUrl {
    pub kind: ProjectKind,
    pub host: String,
    pub port: Option<u16>,
    pub project_ref: Option<String>,
}

/// Parse a project URL and extract the project ref for hosted projects.
pub fn parse_project_url(url: &str) -> Result<ParsedProjectUrl, String> {
    let parsed = Url::parse(url.trim()).map_err(|e| e.to_string())?;
    let host = parsed
        .host_str()
        .ok_or_else(|| format!("url has no host: {}", url))?
        .to_ascii_lowercase();

    let project_ref = HOSTED_DOMAINS
        .iter()
        .find_map(|domain| host.strip_suffix(domain))
        .filter(|sub| !sub.is_empty() && !sub.contains('.'))
        .map(str::to_string);

    let kind = if project_ref.is_some() {
        ProjectKind::Hosted
    } else if matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "0.0.0.0") {
        ProjectKind::Local
    } else {
        ProjectKind::SelfHosted
    };

    Ok(ParsedProjectUrl {
        kind,
        host,
        port: parsed.port(),
        project_ref,
    })
}

/// Shape of an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    /// Legacy `anon` / `service_role` JWT.
    Jwt,
    /// `sb_publishable_...`
    Publishable,
    /// `sb_secret_...`
    Secret,
    Opaque,
}

/// What can be learned about a key without contacting the service.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub format: KeyFormat,
    pub role: Option<String>,
    pub project_ref: Option<String>,
    pub issuer: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl KeyInfo {
    /// Keys with `service_role` bypass row level security.
    pub fn is_privileged(&self) -> bool {
        self.role.as_deref() == Some("service_role")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(Utc::now())
    }
}

#[derive(Deserialize)]
struct JwtClaims {
    role: Option<String>,
    #[serde(rename = "ref")]
    project_ref: Option<String>,
    iss: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
}

/// Classify a key and decode JWT claims when present. The signature is not verified.
pub fn inspect_key(key: &str) -> KeyInfo {
    let key = key.trim();
    let bare = |format: KeyFormat, role: Option<&str>| KeyInfo {
        format,
        role: role.map(str::to_string),
        project_ref: None,
        issuer: None,
        issued_at: None,
        expires_at: None,
    };

    if key.starts_with(PUBLISHABLE_PREFIX) {
        return bare(KeyFormat::Publishable, Some("anon"));
    }
    if key.starts_with(SECRET_PREFIX) {
        return bare(KeyFormat::Secret, Some("service_role"));
    }

    let segments: Vec<&str> = key.split('.').collect();
    let claims = match segments.as_slice() {
        [_, payload, _] => decode_segment(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<JwtClaims>(&bytes).ok()),
        _ => None,
    };
    match claims {
        Some(c) => KeyInfo {
            format: KeyFormat::Jwt,
            role: c.role,
            project_ref: c.project_ref,
            issuer: c.iss,
            issued_at: c.iat.and_then(|t| DateTime::from_timestamp(t, 0)),
            expires_at: c.exp.and_then(|t| DateTime::from_timestamp(t, 0)),
        },
        None => bare(KeyFormat::Opaque, None),
    }
}

/// Decode one base64url JWT segment, tolerating padding.
fn decode_segment(segment: &str) -> Result<Vec<u8>, String> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment.as_bytes())
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(segment.as_bytes()))
        .map_err(|e| e.to_string())
}

/// Short, non-reversible form of a key for logs and diagnostics.
pub fn redact_key(key: &str) -> String {
    let visible: String = key.chars().take(6).collect();
    if key.chars().count() <= 12 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Format a timestamp for display, in UTC or the local timezone.
pub fn format_timestamp_display(dt: DateTime<Utc>, use_utc: bool) -> String {
    if use_utc {
        dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    } else {
        dt.with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S %:z")
            .to_string()
    }
}

/// Build an unsigned JWT with the given payload, shaped like a Supabase key.
#[cfg(test)]
pub(crate) fn fake_jwt(payload: serde_json::Value) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.signature",
        enc.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        enc.encode(payload.to_string())
    )
}
