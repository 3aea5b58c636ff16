//! Loader for PHP array configuration files.
//!
//! The runtime that owns these files loads them by executing them. We accept
//! the literal subset instead: a `<?php` opening tag, optional `declare(...);`
//! statements, and one `return <array>;` whose value is built only from array
//! literals, strings, numbers, `true`, `false` and `null`. Anything computed
//! (variables, function calls, constants, interpolated strings) is rejected
//! with a [`FormatError`] pointing at it.
//!
//! Array semantics follow the runtime so that a file means the same thing to
//! both readers:
//!
//! - integer-like string keys (`'5'`) become integer keys, `true`/`false`
//!   become `1`/`0`, `null` becomes `''`, floats truncate;
//! - elements without a key get the largest integer key so far plus one;
//! - a repeated key keeps its first position and its last value.
//!
//! An array whose keys are exactly `0..n` in order becomes a
//! [`ConfigValue::Sequence`]; anything else becomes a [`ConfigValue::Map`]
//! with integer keys stored in decimal.

use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{ConfpatchError, FormatError};
use crate::value::{ConfigMap, ConfigValue, Number};

type Result<T> = std::result::Result<T, FormatError>;

/// Deepest nesting of arrays, parentheses and unary signs accepted.
const MAX_DEPTH: usize = 128;

/// Read and parse the configuration file at `path`.
pub fn load(path: &Path) -> std::result::Result<ConfigMap, ConfpatchError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfpatchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(ConfpatchError::ReadFailure {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let content = match String::from_utf8(bytes) {
        Ok(c) => c,
        Err(e) => {
            let offset = e.utf8_error().valid_up_to();
            let content = String::from_utf8_lossy(e.as_bytes()).into_owned();
            return Err(ConfpatchError::InvalidFormat {
                path: path.to_path_buf(),
                source: FormatError::at(&content, offset, "file is not valid UTF-8"),
                content,
            });
        }
    };

    debug!(path = %path.display(), bytes = content.len(), "loading configuration");
    match parse_document(&content) {
        Ok(map) => Ok(map),
        Err(source) => Err(ConfpatchError::InvalidFormat {
            path: path.to_path_buf(),
            source,
            content,
        }),
    }
}

/// Parse a complete configuration document into its top-level map.
pub fn parse_document(src: &str) -> Result<ConfigMap> {
    let mut parser = Parser::new(src);
    let map = parser.document()?;
    debug!(entries = map.len(), "parsed configuration document");
    Ok(map)
}

/// Parse a single literal expression, e.g. `['a' => 1]` or `'text'`.
pub fn parse_value(src: &str) -> Result<ConfigValue> {
    let mut parser = Parser::new(src);
    let value = parser.expr()?;
    parser.skip_trivia()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected content after value"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ArrayKey {
    Int(i64),
    Str(String),
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    // --- document structure ---

    fn document(&mut self) -> Result<ConfigMap> {
        if self.rest().starts_with('\u{feff}') {
            self.pos += '\u{feff}'.len_utf8();
        }
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        if !self.eat_keyword("<?php") {
            return Err(self.error("expected '<?php' opening tag"));
        }
        if self.peek().is_some_and(|b| !b.is_ascii_whitespace()) {
            return Err(self.error("expected whitespace after '<?php'"));
        }

        loop {
            self.skip_trivia()?;
            if self.eat_keyword("declare") {
                self.declare()?;
            } else {
                break;
            }
        }

        if !self.eat_keyword("return") {
            return Err(match self.peek() {
                Some(b'$') => self.error(
                    "configuration must be returned directly (`return [...];`), not assigned to a variable",
                ),
                Some(_) => self.error("expected 'return' statement"),
                None => self.error("unexpected end of file, expected 'return' statement"),
            });
        }

        self.skip_trivia()?;
        let value_start = self.pos;
        let value = self.expr()?;
        self.skip_trivia()?;
        self.expect(";")?;
        self.skip_trivia()?;
        if !self.at_end() && !self.eat("?>") {
            return Err(self.error("unexpected content after return statement"));
        }

        match value {
            ConfigValue::Map(map) => Ok(map),
            ConfigValue::Sequence(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect()),
            other => Err(self.error_at(
                value_start,
                format!(
                    "configuration must return an array, found {}",
                    other.type_name()
                ),
            )),
        }
    }

    /// `declare(strict_types=1);` after the `declare` keyword.
    fn declare(&mut self) -> Result<()> {
        self.skip_trivia()?;
        self.expect("(")?;
        self.skip_trivia()?;
        if self.ident().is_none() {
            return Err(self.error("expected directive name in declare"));
        }
        self.skip_trivia()?;
        self.expect("=")?;
        self.expr()?;
        self.skip_trivia()?;
        self.expect(")")?;
        self.skip_trivia()?;
        self.expect(";")
    }

    // --- expressions ---

    /// An operand, optionally followed by `.`-joined string operands.
    fn expr(&mut self) -> Result<ConfigValue> {
        let first = self.operand()?;
        self.skip_trivia()?;
        if !self.at_concat() {
            return Ok(first);
        }
        let mut joined = match first {
            ConfigValue::String(s) => s,
            other => {
                return Err(self.error(format!("cannot join {} with '.'", other.type_name())));
            }
        };
        while self.at_concat() {
            self.pos += 1;
            self.skip_trivia()?;
            let at = self.pos;
            match self.operand()? {
                ConfigValue::String(s) => joined.push_str(&s),
                other => {
                    return Err(self.error_at(
                        at,
                        format!("cannot join {} with '.'", other.type_name()),
                    ));
                }
            }
            self.skip_trivia()?;
        }
        Ok(ConfigValue::String(joined))
    }

    fn at_concat(&self) -> bool {
        self.peek() == Some(b'.')
            && !self
                .peek_at(1)
                .is_some_and(|b| b.is_ascii_digit() || b == b'=' || b == b'.')
    }

    fn operand(&mut self) -> Result<ConfigValue> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("value nested too deeply"));
        }
        self.depth += 1;
        let value = self.term();
        self.depth -= 1;
        value
    }

    fn term(&mut self) -> Result<ConfigValue> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Err(self.error("unexpected end of file, expected a value"));
        };

        match b {
            b'[' => {
                self.pos += 1;
                self.array(b']')
            }
            b'\'' => self.single_quoted().map(ConfigValue::String),
            b'"' => self.double_quoted().map(ConfigValue::String),
            b'-' | b'+' => {
                self.pos += 1;
                match self.operand()? {
                    ConfigValue::Number(n) if b == b'+' => Ok(ConfigValue::Number(n)),
                    ConfigValue::Number(Number::Int(i)) => Ok(ConfigValue::from(-i)),
                    ConfigValue::Number(Number::Float(f)) => Ok(ConfigValue::from(-f)),
                    other => Err(self.error_at(
                        start,
                        format!("unary '{}' needs a number, found {}", b as char, other.type_name()),
                    )),
                }
            }
            b'(' => {
                self.pos += 1;
                let value = self.expr()?;
                self.skip_trivia()?;
                self.expect(")")?;
                Ok(value)
            }
            b'0'..=b'9' => self.number(),
            b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
            b'$' => Err(self.error("variables are not supported; reduce the configuration to literal values")),
            b'<' if self.rest().starts_with("<<<") => {
                Err(self.error("heredoc and nowdoc strings are not supported"))
            }
            _ if is_ident_start(b) => self.constant_or_array(start),
            _ => Err(self.error(format!(
                "unexpected character '{}', expected a value",
                self.rest().chars().next().unwrap_or('?')
            ))),
        }
    }

    fn constant_or_array(&mut self, start: usize) -> Result<ConfigValue> {
        let Some(name) = self.ident() else {
            return Err(self.error("expected a value"));
        };
        if name.eq_ignore_ascii_case("array") {
            self.skip_trivia()?;
            if self.eat("(") {
                return self.array(b')');
            }
            return Err(self.error("expected '(' after 'array'"));
        }
        if name.eq_ignore_ascii_case("true") {
            return Ok(ConfigValue::Bool(true));
        }
        if name.eq_ignore_ascii_case("false") {
            return Ok(ConfigValue::Bool(false));
        }
        if name.eq_ignore_ascii_case("null") {
            return Ok(ConfigValue::Null);
        }
        match name {
            "INF" => Ok(ConfigValue::from(f64::INFINITY)),
            "NAN" => Ok(ConfigValue::from(f64::NAN)),
            _ => Err(self.error_at(
                start,
                format!(
                    "unsupported expression '{name}'; only literal values are allowed"
                ),
            )),
        }
    }

    fn array(&mut self, close: u8) -> Result<ConfigValue> {
        let mut entries: IndexMap<ArrayKey, ConfigValue> = IndexMap::new();
        let mut max_int: Option<i64> = None;

        loop {
            self.skip_trivia()?;
            if self.eat_byte(close) {
                break;
            }

            let element_start = self.pos;
            let first = self.expr()?;
            self.skip_trivia()?;
            let (key, value) = if self.eat("=>") {
                let key = self.array_key(first, element_start)?;
                (key, self.expr()?)
            } else {
                let next = match max_int {
                    None => 0,
                    Some(i) => i.checked_add(1).ok_or_else(|| {
                        self.error_at(element_start, "next array index is out of range")
                    })?,
                };
                (ArrayKey::Int(next), first)
            };

            if let ArrayKey::Int(i) = key {
                max_int = Some(max_int.map_or(i, |m| m.max(i)));
            }
            entries.insert(key, value);

            self.skip_trivia()?;
            if self.eat(",") {
                continue;
            }
            if self.eat_byte(close) {
                break;
            }
            return Err(self.error(format!("expected ',' or '{}'", close as char)));
        }

        Ok(into_value(entries))
    }

    fn array_key(&self, key: ConfigValue, at: usize) -> Result<ArrayKey> {
        Ok(match key {
            ConfigValue::String(s) => match canonical_int(&s) {
                Some(i) => ArrayKey::Int(i),
                None => ArrayKey::Str(s),
            },
            ConfigValue::Bool(b) => ArrayKey::Int(i64::from(b)),
            ConfigValue::Null => ArrayKey::Str(String::new()),
            ConfigValue::Number(Number::Int(i)) => ArrayKey::Int(i),
            ConfigValue::Number(Number::Float(f)) if f.is_finite() => {
                ArrayKey::Int(f.trunc() as i64)
            }
            other => {
                return Err(self.error_at(
                    at,
                    format!("{} cannot be used as an array key", other.type_name()),
                ));
            }
        })
    }

    // --- literals ---

    fn single_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        let mut chunk = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    out.push_str(&self.src[chunk..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' if matches!(self.peek_at(1), Some(b'\\' | b'\'')) => {
                    out.push_str(&self.src[chunk..self.pos]);
                    out.push(self.bytes[self.pos + 1] as char);
                    self.pos += 2;
                    chunk = self.pos;
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error_at(start, "unterminated string"))
    }

    fn double_quoted(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            match b {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'$' if self.peek_at(1).is_some_and(|c| is_ident_start(c) || c == b'{') => {
                    return Err(self.error("string interpolation is not supported"));
                }
                b'{' if self.peek_at(1) == Some(b'$') => {
                    return Err(self.error("string interpolation is not supported"));
                }
                b'\\' => self.escape(&mut out)?,
                _ => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8(out)
            .map_err(|_| self.error_at(start, "string escapes produce invalid UTF-8"))
    }

    /// One escape sequence inside a double-quoted string, starting at `\`.
    fn escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let Some(c) = self.peek_at(1) else {
            out.push(b'\\');
            self.pos += 1;
            return Ok(());
        };
        let simple = match c {
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'v' => Some(0x0b),
            b'e' => Some(0x1b),
            b'f' => Some(0x0c),
            b'\\' | b'$' | b'"' => Some(c),
            _ => None,
        };
        if let Some(byte) = simple {
            out.push(byte);
            self.pos += 2;
            return Ok(());
        }

        match c {
            b'0'..=b'7' => {
                let digits = self.run_of(self.pos + 1, 3, |d| (b'0'..=b'7').contains(&d));
                let value = u32::from_str_radix(digits, 8).unwrap_or(0);
                out.push((value & 0xff) as u8);
                self.pos += 1 + digits.len();
            }
            b'x' if self.peek_at(2).is_some_and(|d| d.is_ascii_hexdigit()) => {
                let digits = self.run_of(self.pos + 2, 2, |d| d.is_ascii_hexdigit());
                out.push(u8::from_str_radix(digits, 16).unwrap_or(0));
                self.pos += 2 + digits.len();
            }
            b'u' if self.peek_at(2) == Some(b'{') => {
                let open = self.pos;
                let body_start = self.pos + 3;
                let Some(len) = self.src[body_start..].find('}') else {
                    return Err(self.error_at(open, "unterminated \\u{...} escape"));
                };
                let ch = u32::from_str_radix(&self.src[body_start..body_start + len], 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error_at(open, "invalid unicode escape"))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                self.pos = body_start + len + 1;
            }
            _ => {
                // Unknown escapes are kept verbatim, backslash included.
                out.push(b'\\');
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn number(&mut self) -> Result<ConfigValue> {
        let start = self.pos;
        let rest = self.rest();
        let radix = match rest.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0b" | "0B") => Some(2),
            Some("0o" | "0O") => Some(8),
            _ => None,
        };

        let value = if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while self
                .peek()
                .is_some_and(|b| b == b'_' || (b as char).is_digit(radix))
            {
                self.pos += 1;
            }
            let digits = strip_separators(&self.src[digits_start..self.pos], radix)
                .ok_or_else(|| self.error_at(start, "invalid numeric literal"))?;
            integer_or_float(&digits, radix)
        } else {
            let mut is_float = false;
            self.skip_digits();
            if self.peek() == Some(b'.') {
                is_float = true;
                self.pos += 1;
                self.skip_digits();
            }
            if matches!(self.peek(), Some(b'e' | b'E')) {
                let signed = matches!(self.peek_at(1), Some(b'+' | b'-'));
                let digit_at = if signed { 2 } else { 1 };
                if self.peek_at(digit_at).is_some_and(|b| b.is_ascii_digit()) {
                    is_float = true;
                    self.pos += digit_at;
                    self.skip_digits();
                }
            }

            let text = strip_separators(&self.src[start..self.pos], 10)
                .ok_or_else(|| self.error_at(start, "invalid numeric literal"))?;
            if is_float {
                let f = text
                    .parse::<f64>()
                    .map_err(|_| self.error_at(start, "invalid numeric literal"))?;
                ConfigValue::from(f)
            } else if text.len() > 1 && text.starts_with('0') {
                if !text.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                    return Err(self.error_at(start, "invalid octal literal"));
                }
                integer_or_float(&text[1..], 8)
            } else {
                integer_or_float(&text, 10)
            }
        };

        if self.peek().is_some_and(is_ident_char) {
            return Err(self.error_at(start, "invalid numeric literal"));
        }
        Ok(value)
    }

    // --- lexing helpers ---

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'#') => self.line_comment(),
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.line_comment(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    match self.src[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => return Err(self.error_at(start, "unterminated comment")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Line comments end at a newline or just before a closing `?>`.
    fn line_comment(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' || self.bytes[self.pos..].starts_with(b"?>") {
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_digit() || b == b'_') {
            self.pos += 1;
        }
    }

    fn run_of(&self, from: usize, max: usize, pred: impl Fn(u8) -> bool) -> &'a str {
        let mut end = from;
        while end < self.bytes.len() && end - from < max && pred(self.bytes[end]) {
            end += 1;
        }
        &self.src[from..end]
    }

    fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        Some(&self.src[start..self.pos])
    }

    /// Consume `kw` (ASCII case-insensitive) when it is not followed by an
    /// identifier character.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        let end = self.pos + kw.len();
        let matches = self
            .bytes
            .get(self.pos..end)
            .is_some_and(|s| s.eq_ignore_ascii_case(kw.as_bytes()))
            && !self.bytes.get(end).copied().is_some_and(is_ident_char);
        if matches {
            self.pos = end;
        }
        matches
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn eat_byte(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else if self.at_end() {
            Err(self.error(format!("unexpected end of file, expected '{token}'")))
        } else {
            Err(self.error(format!("expected '{token}'")))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn error(&self, message: impl Into<String>) -> FormatError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> FormatError {
        FormatError::at(self.src, offset, message)
    }
}

fn into_value(entries: IndexMap<ArrayKey, ConfigValue>) -> ConfigValue {
    let is_list = entries
        .keys()
        .enumerate()
        .all(|(i, k)| *k == ArrayKey::Int(i as i64));
    if is_list {
        return ConfigValue::Sequence(entries.into_values().collect());
    }
    ConfigValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| {
                let key = match k {
                    ArrayKey::Int(i) => i.to_string(),
                    ArrayKey::Str(s) => s,
                };
                (key, v)
            })
            .collect(),
    )
}

/// Integer value of a string the runtime treats as an integer key:
/// `0`, or an optional `-` followed by a decimal without leading zeros.
pub(crate) fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
        && s != "-0";
    if canonical { s.parse().ok() } else { None }
}

/// Remove `_` separators, rejecting ones that are not between two digits of
/// `radix`.
fn strip_separators(text: &str, radix: u32) -> Option<String> {
    let is_digit = |b: u8| (b as char).is_digit(radix);
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'_' {
            let prev = i.checked_sub(1).map(|p| bytes[p]);
            let next = bytes.get(i + 1).copied();
            if !prev.is_some_and(is_digit) || !next.is_some_and(is_digit) {
                return None;
            }
        }
    }
    if text.is_empty() {
        return None;
    }
    Some(text.replace('_', ""))
}

/// Integer literals that overflow `i64` become floats, as in the runtime.
fn integer_or_float(digits: &str, radix: u32) -> ConfigValue {
    match i64::from_str_radix(digits, radix) {
        Ok(i) => ConfigValue::from(i),
        Err(_) => {
            let f = digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0f64, |acc, d| acc * f64::from(radix) + f64::from(d));
            ConfigValue::from(f)
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}
