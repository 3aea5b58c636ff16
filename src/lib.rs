//! Patch keys in PHP array configuration files. Load the file, change the
//! keys you name, write it back in a fixed, diff-friendly layout.
//!
//! Applications in the PHP world often keep their settings in a file like
//! `config/local.php` that does nothing but `return [...]`. Deployment
//! scripts need to change a mailer DSN or a cache adapter in that file, and
//! text substitution breaks on quoting, nesting and keys that do not exist
//! yet. Confpatch reads the array into a typed, ordered structure, applies
//! field updates and serializes it again.
//!
//! ```ignore
//! let request = PatchRequest {
//!     path: "app/config/local.php".into(),
//!     updates: vec![FieldUpdate::new("mailer_dsn", "smtp://mail:25")],
//!     dry_run: false,
//! };
//! let outcome = patch_file(&request)?;
//! println!("{outcome}");
//! ```
//!
//! # Pipeline
//!
//! ```text
//! parse::load        file → ConfigMap         literal subset only
//!        ↓
//! update::apply      FieldUpdates in order    existing keys keep position
//!        ↓
//! render::save       ConfigMap → file         deterministic layout
//! ```
//!
//! # What the loader accepts
//!
//! A `<?php` tag, optional `declare(...)` statements and one `return` of an
//! array literal built from strings, numbers, booleans and `null`, using
//! either `[...]` or `array(...)`. Variables, constants, function calls and
//! interpolated strings are rejected with the line and column of the
//! offending token. The file is never executed.
//!
//! Array semantics follow the runtime: `'5'` and `5` are the same key,
//! elements without a key get the next integer index, and a repeated key
//! keeps its first position with its last value.
//!
//! # Output layout
//!
//! The top level is one `'key' => value,` line per entry, in load order, with
//! appended keys last. Nested arrays use the runtime's `var_export()` layout.
//! Strings escape `\` and `'`; floats always keep a decimal point or exponent
//! so they read back as floats. Rendering the same map twice gives the same
//! bytes.
//!
//! # Flags
//!
//! The binary maps `--flag=value` arguments to keys through a [`FlagTable`].
//! The built-in table covers the mailer and API rate limiter keys;
//! `--api-rate-limiter-cache=null` stores `null` instead of the string. More
//! rules can be declared in the tool's own settings.
//!
//! # Tool settings
//!
//! [`Settings`] is a confique struct layered from `confpatch.toml` in the
//! platform config directory and the working directory, an explicit
//! `--settings` file, `CONFPATCH__*` environment variables and CLI flags.
//! Settings files are strict: unknown keys fail with file and line.
//!
//! # Error handling
//!
//! All fallible operations return [`ConfpatchError`]. Messages name the file
//! involved; parse failures carry a [`FormatError`] with line and column. With
//! the `rich-errors` feature the error is also a `miette::Diagnostic` that
//! labels the offending span.

pub mod cli;
pub mod discover;
pub mod error;
pub mod flags;
pub mod ops;
pub mod parse;
pub mod render;
pub mod settings;
pub mod types;
pub mod update;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use error::{ConfpatchError, FormatError};
pub use flags::{FlagMapping, FlagTable};
pub use ops::{PatchOutcome, PatchRequest, patch_document, patch_file};
pub use settings::{Settings, SettingsLoader};
pub use types::{OutputFormat, SearchPath};
pub use update::{FieldUpdate, apply_updates};
pub use value::{ConfigMap, ConfigValue, Number};
