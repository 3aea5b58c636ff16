//! Serializer: turn a [`ConfigMap`] back into a PHP configuration file.
//!
//! The top level is written one entry per line:
//!
//! ```text
//! <?php
//!
//! return [
//!     'mailer_dsn' => 'smtp://localhost:25',
//!     'debug' => false,
//!     'api_rate_limiter_cache' => null,
//!     'trusted_hosts' => array (
//!   0 => 'localhost',
//! ),
//! ];
//! ```
//!
//! Nested arrays use the layout of the runtime's `var_export()`, so files
//! touched by this tool diff cleanly against files the application writes
//! itself. Output depends only on the map, never on the original text.

use std::path::Path;

use tracing::info;

use crate::error::ConfpatchError;
use crate::parse::canonical_int;
use crate::value::{ConfigMap, ConfigValue, Number};

const PREAMBLE: &str = "<?php\n\nreturn [\n";
const CLOSING: &str = "];\n";
const INDENT: &str = "    ";

/// Render the complete file content for `map`.
pub fn render(map: &ConfigMap) -> String {
    let mut out = String::from(PREAMBLE);
    for (key, value) in map.iter() {
        out.push_str(INDENT);
        push_quoted(&mut out, key);
        out.push_str(" => ");
        match value {
            ConfigValue::String(s) => push_quoted(&mut out, s),
            ConfigValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            ConfigValue::Null => out.push_str("null"),
            ConfigValue::Sequence(_) | ConfigValue::Map(_) => export_into(&mut out, value, 1),
            ConfigValue::Number(n) => push_number(&mut out, *n),
        }
        out.push_str(",\n");
    }
    out.push_str(CLOSING);
    out
}

/// Render `map` and replace the content of `path` with it.
pub fn save(path: &Path, map: &ConfigMap) -> Result<(), ConfpatchError> {
    let content = render(map);
    std::fs::write(path, &content).map_err(|e| ConfpatchError::WriteFailure {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(path = %path.display(), bytes = content.len(), "configuration written");
    Ok(())
}

/// Literal form of a single value as the runtime's `var_export()` prints it.
pub fn export(value: &ConfigValue) -> String {
    let mut out = String::new();
    export_into(&mut out, value, 1);
    out
}

fn export_into(out: &mut String, value: &ConfigValue, level: usize) {
    match value {
        ConfigValue::String(s) => push_quoted(out, s),
        ConfigValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ConfigValue::Null => out.push_str("NULL"),
        ConfigValue::Number(n) => push_number(out, *n),
        ConfigValue::Sequence(items) => {
            open_array(out, level);
            for (i, item) in items.iter().enumerate() {
                push_spaces(out, level + 1);
                out.push_str(&i.to_string());
                out.push_str(" => ");
                export_into(out, item, level + 2);
                out.push_str(",\n");
            }
            close_array(out, level);
        }
        ConfigValue::Map(map) => {
            open_array(out, level);
            for (key, item) in map.iter() {
                push_spaces(out, level + 1);
                match canonical_int(key) {
                    Some(i) => out.push_str(&i.to_string()),
                    None => push_quoted(out, key),
                }
                out.push_str(" => ");
                export_into(out, item, level + 2);
                out.push_str(",\n");
            }
            close_array(out, level);
        }
    }
}

// Nested arrays start on their own line, indented one step less than their
// elements' keys.
fn open_array(out: &mut String, level: usize) {
    if level > 1 {
        out.push('\n');
        push_spaces(out, level - 1);
    }
    out.push_str("array (\n");
}

fn close_array(out: &mut String, level: usize) {
    if level > 1 {
        push_spaces(out, level - 1);
    }
    out.push(')');
}

fn push_spaces(out: &mut String, n: usize) {
    out.extend(std::iter::repeat_n(' ', n));
}

/// Single-quote `s`, escaping `\` and `'`. NUL bytes cannot appear inside a
/// single-quoted literal and are spliced in as `' . "\0" . '`.
fn push_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("' . \"\\0\" . '"),
            _ => out.push(c),
        }
    }
    out.push('\'');
}

fn push_number(out: &mut String, n: Number) {
    match n {
        Number::Int(i) => out.push_str(&i.to_string()),
        Number::Float(f) => out.push_str(&format_float(f)),
    }
}

/// Format a float the way the runtime exports it: shortest round-trip digits,
/// always with a fraction or exponent so it reads back as a float.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NAN".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.into();
    }
    let sign = if f.is_sign_negative() { "-" } else { "" };
    if f == 0.0 {
        return format!("{sign}0.0");
    }

    // `{:e}` yields the shortest digits that round-trip, e.g. "1.2345e3".
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let point = exp + 1;

    if !(-3..=17).contains(&point) {
        let (lead, frac) = digits.split_at(1);
        let frac = if frac.is_empty() { "0" } else { frac };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        return format!("{sign}{lead}.{frac}E{exp_sign}{}", exp.abs());
    }

    if point <= 0 {
        let zeros = "0".repeat(point.unsigned_abs() as usize);
        return format!("{sign}0.{zeros}{digits}");
    }

    let point = point as usize;
    if digits.len() <= point {
        let zeros = "0".repeat(point - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        let (int, frac) = digits.split_at(point);
        format!("{sign}{int}.{frac}")
    }
}
