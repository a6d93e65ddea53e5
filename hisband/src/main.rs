//! hisband CLI: inspect and health-check the configured Supabase project from the terminal.

mod output;

use clap::{ArgAction, Parser, Subcommand};
use hisband_lib::helpers::format_timestamp_display;
use hisband_lib::{
    inspect_key, parse_project_url, redact_key, resolve_key, Client, ClientOptions, Credentials,
    Error, KeySource,
};
use output::OutputFormat;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const MISSING_KEY: &str = "API key not found. Set SUPABASE_ANON_KEY (or SUPABASE_KEY / SUPABASE_SERVICE_KEY), \
     or configure a secret backend: SUPABASE_OP_ENTRY_PATH (1Password), SUPABASE_BW_ITEM_ID (Bitwarden), \
     or SUPABASE_KPXC_DB+SUPABASE_KPXC_ENTRY (KeePassXC).";

#[derive(Parser)]
#[command(name = "hisband")]
#[command(about = "Inspect and health-check the configured Supabase project", long_about = None)]
struct Cli {
    /// Supabase project URL (e.g. https://<ref>.supabase.co).
    #[arg(long, env = "SUPABASE_URL", global = true)]
    url: Option<String>,

    /// Output format: plain (human-readable), json (structured).
    #[arg(short, long, default_value = "plain", value_enum, global = true)]
    output: OutputFormat,

    /// HTTP request timeout in seconds.
    #[arg(
        long,
        default_value = "15",
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    timeout: u64,

    /// Show timestamps in UTC. By default they are shown in the local timezone.
    #[arg(long, global = true)]
    utc: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved project URL, service endpoints and key details
    Info,
    /// Check the auth service health endpoint
    Health,
    /// Decode an API key (the resolved one when omitted)
    DecodeKey { key: Option<String> },
    /// Parse a Supabase project URL
    ParseUrl {
        #[arg(value_name = "URL")]
        project_url: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<(), String> {
    let print_value = |v: &Value| -> Result<(), String> {
        let text = output::render(v, cli.output).map_err(|e| e.to_string())?;
        println!("{}", text);
        Ok(())
    };

    match &cli.command {
        Commands::Version => {
            println!("hisband {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::ParseUrl { project_url } => {
            let parsed = parse_project_url(project_url)?;
            print_value(&serde_json::to_value(&parsed).map_err(|e| e.to_string())?)?;
        }
        Commands::DecodeKey { key } => {
            let (key, source) = match key {
                Some(k) => (k.clone(), KeySource::Explicit),
                None => resolve_key().ok_or(MISSING_KEY)?,
            };
            print_value(&key_report(&key, &source, cli.utc))?;
        }
        Commands::Info => {
            let (client, source) = bootstrap(cli)?;
            print_value(&info_report(&client, &source, cli.utc))?;
        }
        Commands::Health => {
            let (client, _source) = bootstrap(cli)?;
            let body = client.health().await.map_err(|e| e.to_string())?;
            print_value(&body)?;
        }
    }
    Ok(())
}

/// Resolve credentials and publish the client in the global registry.
fn bootstrap(cli: &Cli) -> Result<(Arc<Client>, KeySource), String> {
    let url = cli
        .url
        .as_deref()
        .ok_or("Supabase URL not set. Pass --url or set SUPABASE_URL.")?;
    let (key, source) = resolve_key().ok_or(MISSING_KEY)?;
    let credentials = Credentials::new(url, &key).map_err(|e| Error::from(e).to_string())?;
    let options = ClientOptions {
        timeout: Duration::from_secs(cli.timeout),
        ..ClientOptions::default()
    };
    let client = hisband_lib::global()
        .initialize_with(credentials, options)
        .map_err(|e| e.to_string())?;
    tracing::info!(url = client.url(), source = %source, "supabase client ready");
    Ok((client, source))
}

fn key_report(key: &str, source: &KeySource, use_utc: bool) -> Value {
    let info = inspect_key(key);
    json!({
        "key": redact_key(key),
        "source": source.to_string(),
        "format": info.format,
        "role": info.role,
        "project_ref": info.project_ref,
        "issuer": info.issuer,
        "issued_at": info.issued_at.map(|t| format_timestamp_display(t, use_utc)),
        "expires_at": info.expires_at.map(|t| format_timestamp_display(t, use_utc)),
        "expired": info.is_expired_now(),
        "privileged": info.is_privileged(),
    })
}

fn info_report(client: &Client, source: &KeySource, use_utc: bool) -> Value {
    let project = parse_project_url(client.url())
        .ok()
        .and_then(|p| serde_json::to_value(p).ok())
        .unwrap_or(Value::Null);
    json!({
        "url": client.url(),
        "project": project,
        "endpoints": {
            "rest": client.rest_url().as_str(),
            "auth": client.auth_url().as_str(),
            "storage": client.storage_url().as_str(),
            "functions": client.functions_url().as_str(),
            "realtime": client.realtime_url().as_str(),
        },
        "key": key_report(client.key(), source, use_utc),
    })
}
