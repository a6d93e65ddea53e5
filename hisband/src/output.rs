//! Output formatting: plain key-value text or pretty JSON.

use clap::ValueEnum;
use serde_json::Value;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable key-value lines
    #[default]
    Plain,
    /// JSON (pretty-printed)
    Json,
}

/// Render a value in the requested format.
pub fn render(value: &Value, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Plain => Ok(format_plain(value)),
        OutputFormat::Json => serde_json::to_string_pretty(value),
    }
}

/// Objects become `key: value` lines, nested values are indented beneath their key.
pub fn format_plain(value: &Value) -> String {
    let mut out = String::new();
    write_plain(value, &mut out, 0);
    out.trim_end().to_string()
}

fn write_plain(v: &Value, out: &mut String, indent: usize) {
    let pad = "  ".repeat(indent);
    match v {
        Value::Object(map) => {
            for (k, val) in map {
                match scalar(val) {
                    Some(s) => {
                        let _ = writeln!(out, "{}{}: {}", pad, k, s);
                    }
                    None => {
                        let _ = writeln!(out, "{}{}:", pad, k);
                        write_plain(val, out, indent + 1);
                    }
                }
            }
        }
        Value::Array(arr) if arr.is_empty() => {
            let _ = writeln!(out, "{}<empty>", pad);
        }
        Value::Array(arr) => {
            for item in arr {
                match scalar(item) {
                    Some(s) => {
                        let _ = writeln!(out, "{}- {}", pad, s);
                    }
                    None => {
                        let _ = writeln!(out, "{}-", pad);
                        write_plain(item, out, indent + 1);
                    }
                }
            }
        }
        other => {
            let _ = writeln!(out, "{}{}", pad, scalar(other).unwrap_or_default());
        }
    }
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.replace('\n', " ")),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("-".to_string()),
        _ => None,
    }
}
