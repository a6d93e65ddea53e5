//! Secret backends for reading the Supabase API key.
//!
//! Each backend shells out to its password-manager CLI and is only consulted
//! when its environment variables are set. Nothing is read from disk directly.

use std::process::{Command, Stdio};

/// Password managers the key can be read from, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OnePassword,
    Bitwarden,
    Keepassxc,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::OnePassword, Backend::Bitwarden, Backend::Keepassxc];

    pub fn name(self) -> &'static str {
        match self {
            Backend::OnePassword => "1password",
            Backend::Bitwarden => "bitwarden",
            Backend::Keepassxc => "keepassxc",
        }
    }

    /// Read the key from this backend. `None` when unconfigured or the CLI fails.
    pub fn read(self) -> Option<String> {
        match self {
            Backend::OnePassword => one_password(),
            Backend::Bitwarden => bitwarden(),
            Backend::Keepassxc => keepassxc(),
        }
    }
}

/// Trimmed, non-empty value of an environment variable.
pub(crate) fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Run a CLI and capture stdout; stderr is discarded so it never reaches our output.
fn run_cmd(args: &[&str], env_extra: &[(&str, &str)]) -> Option<String> {
    let (bin, rest) = args.split_first()?;
    let mut cmd = Command::new(bin);
    cmd.args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    for (k, v) in env_extra {
        cmd.env(k, v);
    }
    let out = cmd.output().ok()?;
    if !out.status.success() {
        tracing::debug!(program = *bin, status = ?out.status, "secret backend exited unsuccessfully");
        return None;
    }
    String::from_utf8(out.stdout)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 1Password CLI (`op read`).
///
/// - `SUPABASE_OP_ENTRY_PATH`: `op://Vault/Item`, or `SUPABASE_OP_VAULT` + `SUPABASE_OP_ITEM`
/// - `SUPABASE_OP_FIELD`: field name (default `ANON_KEY`)
pub fn one_password() -> Option<String> {
    let field = std::env::var("SUPABASE_OP_FIELD").unwrap_or_else(|_| "ANON_KEY".to_string());
    let field = field.trim();
    if field.is_empty() {
        return None;
    }

    let uri = match env_value("SUPABASE_OP_ENTRY_PATH") {
        Some(path) => format!("{}/{}", path.trim_end_matches('/'), field),
        None => {
            let vault = env_value("SUPABASE_OP_VAULT")?;
            let item = env_value("SUPABASE_OP_ITEM")?;
            format!("op://{}/{}/{}", vault, item, field)
        }
    };
    run_cmd(&["op", "read", &uri], &[])
}

/// Bitwarden CLI (`bw get password`).
///
/// - `SUPABASE_BW_ITEM_ID`: UUID of the login item
/// - `SUPABASE_BW_SESSION`: optional session key, passed through as `BW_SESSION`
pub fn bitwarden() -> Option<String> {
    let id = env_value("SUPABASE_BW_ITEM_ID")?;
    match env_value("SUPABASE_BW_SESSION") {
        Some(session) => run_cmd(
            &["bw", "get", "password", &id],
            &[("BW_SESSION", session.as_str())],
        ),
        None => run_cmd(&["bw", "get", "password", &id], &[]),
    }
}

/// KeePassXC CLI (`keepassxc-cli show`).
///
/// - `SUPABASE_KPXC_DB`: path to the .kdbx database
/// - `SUPABASE_KPXC_ENTRY`: entry title or path (e.g. "Web/Supabase")
/// - `SUPABASE_KPXC_ATTRIBUTE`: attribute name (default `Password`)
pub fn keepassxc() -> Option<String> {
    let db = env_value("SUPABASE_KPXC_DB")?;
    let entry = env_value("SUPABASE_KPXC_ENTRY")?;
    let attr = std::env::var("SUPABASE_KPXC_ATTRIBUTE").unwrap_or_else(|_| "Password".to_string());
    let attr = attr.trim();
    if attr.is_empty() {
        return None;
    }
    run_cmd(&["keepassxc-cli", "show", "-a", attr, &db, &entry], &[])
}

/// Write an executable shell script named `name` into `dir`, standing in for a password-manager CLI.
#[cfg(all(test, unix))]
pub(crate) fn install_stub(dir: &std::path::Path, name: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
