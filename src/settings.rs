//! Settings for the tool itself, layered from files, environment and CLI.
//!
//! This is separate from the PHP configuration being patched. Layers, lowest
//! priority first:
//!
//! 1. `#[config(default)]` values on [`Settings`]
//! 2. `confpatch.toml` in each search path (platform dir, then cwd)
//! 3. an explicit `--settings <FILE>`
//! 4. `CONFPATCH__*` environment variables (`__` separates nesting levels)
//! 5. CLI overrides such as `--log-level`
//!
//! Layers are deep-merged as TOML tables, then handed to confique which fills
//! defaults. Settings files are always strict: an unknown key fails with its
//! file and line.

use std::path::PathBuf;

use confique::Config;
use toml::{Table, Value};
use tracing::debug;

use crate::discover;
use crate::error::ConfpatchError;
use crate::flags::{FlagMapping, FlagTable};
use crate::types::SearchPath;

pub const ENV_PREFIX: &str = "CONFPATCH";

#[derive(Config, Debug)]
pub struct Settings {
    /// Log filter used when RUST_LOG is not set, e.g. "info" or "confpatch=debug".
    #[config(default = "warn")]
    pub log_level: String,

    /// Extra `--flag=value` rules, as [[flags]] tables with `flag`, `key` and
    /// optional `null_sentinel`.
    #[config(default = [])]
    pub flags: Vec<FlagMapping>,
}

impl Settings {
    /// The built-in flag table extended by [`Settings::flags`].
    pub fn flag_table(&self) -> FlagTable {
        FlagTable::with_extra(&self.flags)
    }
}

/// Pre-loaded inputs for [`resolve`]. No I/O happens during resolution.
#[derive(Debug, Default)]
pub struct SettingsSources {
    /// Settings files, lowest priority first.
    pub files: Vec<(PathBuf, String)>,
    pub env_vars: Vec<(String, String)>,
    /// `None` disables the environment layer.
    pub env_prefix: Option<String>,
    /// Dotted key overrides, highest priority.
    pub overrides: Vec<(String, Value)>,
}

/// Merge all layers and build [`Settings`].
pub fn resolve(sources: SettingsSources) -> Result<Settings, ConfpatchError> {
    let mut merged = Table::new();
    for (path, content) in &sources.files {
        validate_unknown_keys(content, path)?;
        let table: Table = toml::from_str(content).map_err(|e| ConfpatchError::SettingsParse {
            path: path.clone(),
            source: e,
        })?;
        merge_into(&mut merged, table);
    }

    if let Some(prefix) = &sources.env_prefix {
        merge_into(&mut merged, env_to_table(prefix, sources.env_vars));
    }

    let mut overrides = Table::new();
    for (key, value) in sources.overrides {
        insert_path(&mut overrides, &key.split('.').collect::<Vec<_>>(), value);
    }
    merge_into(&mut merged, overrides);

    let layer: <Settings as Config>::Layer =
        Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfpatchError::InvalidSetting {
                key: "<merged>".into(),
                reason: e.to_string(),
            })?;

    Ok(Settings::builder().preloaded(layer).load()?)
}

/// Fail on keys in `content` that [`Settings`] does not define.
fn validate_unknown_keys(content: &str, path: &std::path::Path) -> Result<(), ConfpatchError> {
    let mut unknown: Vec<String> = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let _layer: <Settings as Config>::Layer =
        serde_ignored::deserialize(deserializer, |ignored| unknown.push(ignored.to_string()))
            .map_err(|e| ConfpatchError::SettingsParse {
                path: path.to_path_buf(),
                source: e,
            })?;

    match unknown.len() {
        0 => Ok(()),
        _ => {
            let errors: Vec<ConfpatchError> = unknown
                .into_iter()
                .map(|key| ConfpatchError::UnknownSetting {
                    line: key_line(content, &key),
                    key,
                    path: path.to_path_buf(),
                })
                .collect();
            Err(ConfpatchError::UnknownSettings(errors))
        }
    }
}

/// Best-effort 1-indexed line of the last segment of a dotted key, 0 if not
/// found. Good enough for flat settings and `[[flags]]` entries.
fn key_line(content: &str, dotted_key: &str) -> usize {
    let leaf = dotted_key.rsplit('.').next().unwrap_or(dotted_key);
    content
        .lines()
        .position(|line| {
            line.trim_start()
                .strip_prefix(leaf)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        })
        .map_or(0, |i| i + 1)
}

/// Build a table from `{PREFIX}__*` variables. Segments are lowercased;
/// values are typed bool, then integer, then float, then string.
pub fn env_to_table(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Table {
    let needle = format!("{prefix}__");
    let mut table = Table::new();
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(&needle).filter(|r| !r.is_empty()) else {
            continue;
        };
        let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        insert_path(&mut table, &segments, typed_env_value(&raw));
    }
    table
}

fn typed_env_value(raw: &str) -> Value {
    if let Ok(b) = raw.to_ascii_lowercase().parse::<bool>() {
        return Value::Boolean(b);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    match raw.parse::<f64>() {
        Ok(f) if raw.contains('.') => Value::Float(f),
        _ => Value::String(raw.to_string()),
    }
}

fn insert_path(table: &mut Table, segments: &[&str], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut current = table;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert(Value::Table(Table::new()));
        if !slot.is_table() {
            *slot = Value::Table(Table::new());
        }
        let Value::Table(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(leaf.to_string(), value);
}

/// Deep-merge `overlay` into `base`: tables recurse, anything else replaces.
fn merge_into(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Table(mut existing)), Value::Table(incoming)) => {
                merge_into(&mut existing, incoming);
                Value::Table(existing)
            }
            (_, value) => value,
        };
        base.insert(key, merged);
    }
}

/// Builder that discovers settings files and resolves [`Settings`].
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    search_paths: Vec<SearchPath>,
    settings_file: Option<PathBuf>,
    env_prefix: Option<String>,
    overrides: Vec<(String, Value)>,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    pub fn new() -> Self {
        SettingsLoader {
            search_paths: vec![SearchPath::Platform, SearchPath::Cwd],
            settings_file: None,
            env_prefix: Some(ENV_PREFIX.into()),
            overrides: Vec::new(),
        }
    }

    /// Replace the directories searched for `confpatch.toml`.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Also read this file, above all discovered ones. It must exist.
    pub fn settings_file(mut self, path: Option<PathBuf>) -> Self {
        self.settings_file = path;
        self
    }

    /// Skip the environment layer.
    pub fn no_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Set `key` at the highest priority. `None` is ignored so optional CLI
    /// flags can be passed straight through.
    pub fn cli_override<V: Into<Value>>(mut self, key: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.overrides.push((key.to_string(), v.into()));
        }
        self
    }

    fn sources(&self) -> Result<SettingsSources, ConfpatchError> {
        let mut files = discover::load_settings_files(&self.search_paths)?;
        if let Some(path) = &self.settings_file {
            files.push(discover::load_explicit(path)?);
        }
        debug!(files = files.len(), "settings files loaded");
        Ok(SettingsSources {
            files,
            env_vars: match self.env_prefix {
                Some(_) => std::env::vars().collect(),
                None => Vec::new(),
            },
            env_prefix: self.env_prefix.clone(),
            overrides: self.overrides.clone(),
        })
    }

    pub fn load(self) -> Result<Settings, ConfpatchError> {
        resolve(self.sources()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file(name: &str, content: &str) -> (PathBuf, String) {
        (PathBuf::from(name), content.to_string())
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_only() {
        let settings = resolve(SettingsSources::default()).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert!(settings.flags.is_empty());
        assert_eq!(settings.flag_table(), FlagTable::builtin());
    }

    #[test]
    fn file_sets_values_and_flags() {
        let settings = resolve(SettingsSources {
            files: vec![file(
                "confpatch.toml",
                r#"
log_level = "info"

[[flags]]
flag = "site-url"
key = "site_url"

[[flags]]
flag = "cache-adapter"
key = "cache_adapter"
null_sentinel = true
"#,
            )],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.flags.len(), 2);
        assert!(!settings.flags[0].null_sentinel);
        assert!(settings.flags[1].null_sentinel);
        assert_eq!(settings.flag_table().get("site-url").unwrap().key, "site_url");
    }

    #[test]
    fn later_file_wins() {
        let settings = resolve(SettingsSources {
            files: vec![
                file("a.toml", "log_level = \"info\"\n"),
                file("b.toml", "log_level = \"debug\"\n"),
            ],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let sources = SettingsSources {
            files: vec![file("a.toml", "log_level = \"info\"\n")],
            env_vars: vars(&[("CONFPATCH__LOG_LEVEL", "debug"), ("OTHER__LOG_LEVEL", "x")]),
            env_prefix: Some(ENV_PREFIX.into()),
            overrides: vec![],
        };
        assert_eq!(resolve(sources).unwrap().log_level, "debug");

        let sources = SettingsSources {
            env_vars: vars(&[("CONFPATCH__LOG_LEVEL", "debug")]),
            env_prefix: Some(ENV_PREFIX.into()),
            overrides: vec![("log_level".into(), Value::String("trace".into()))],
            ..Default::default()
        };
        assert_eq!(resolve(sources).unwrap().log_level, "trace");
    }

    #[test]
    fn env_ignored_without_prefix() {
        let settings = resolve(SettingsSources {
            env_vars: vars(&[("CONFPATCH__LOG_LEVEL", "debug")]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn unknown_key_reports_line() {
        let err = resolve(SettingsSources {
            files: vec![file("confpatch.toml", "log_level = \"info\"\nlog_levle = \"x\"\n")],
            ..Default::default()
        })
        .unwrap_err();
        match err {
            ConfpatchError::UnknownSettings(errors) => {
                assert_eq!(errors.len(), 1);
                let msg = errors[0].to_string();
                assert!(msg.contains("log_levle"));
                assert!(msg.contains("line 2"));
            }
            other => panic!("expected UnknownSettings, got {other:?}"),
        }
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let err = resolve(SettingsSources {
            files: vec![file("confpatch.toml", "log_level = \n")],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfpatchError::SettingsParse { .. }));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = resolve(SettingsSources {
            files: vec![file("confpatch.toml", "log_level = 3\n")],
            ..Default::default()
        });
        assert!(err.is_err());
    }

    #[test]
    fn env_values_are_typed() {
        let table = env_to_table(
            "APP",
            vars(&[
                ("APP__A", "TRUE"),
                ("APP__B", "42"),
                ("APP__C", "1.5"),
                ("APP__D", "inf"),
                ("APP__NESTED__KEY", "x"),
                ("APP__", "ignored"),
            ]),
        );
        assert_eq!(table["a"].as_bool(), Some(true));
        assert_eq!(table["b"].as_integer(), Some(42));
        assert_eq!(table["c"].as_float(), Some(1.5));
        assert_eq!(table["d"].as_str(), Some("inf"));
        assert_eq!(table["nested"]["key"].as_str(), Some("x"));
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn merge_recurses_into_tables() {
        let mut base: Table = toml::from_str("a = 1\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: Table = toml::from_str("[t]\ny = 3\n").unwrap();
        merge_into(&mut base, overlay);
        assert_eq!(base["a"].as_integer(), Some(1));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn loader_reads_search_paths_and_explicit_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(discover::SETTINGS_FILE), "log_level = \"info\"\n").unwrap();
        let explicit = dir.path().join("ci.toml");
        fs::write(&explicit, "[[flags]]\nflag = \"db-host\"\nkey = \"db_host\"\n").unwrap();

        let settings = SettingsLoader::new()
            .search_paths(vec![SearchPath::Path(dir.path().to_path_buf())])
            .settings_file(Some(explicit))
            .no_env()
            .load()
            .unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.flags[0].key, "db_host");
    }

    #[test]
    fn loader_cli_override_wins_and_none_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(discover::SETTINGS_FILE), "log_level = \"info\"\n").unwrap();
        let settings = SettingsLoader::new()
            .search_paths(vec![SearchPath::Path(dir.path().to_path_buf())])
            .no_env()
            .cli_override("log_level", None::<String>)
            .load()
            .unwrap();
        assert_eq!(settings.log_level, "info");

        let settings = SettingsLoader::new()
            .search_paths(vec![SearchPath::Path(dir.path().to_path_buf())])
            .no_env()
            .cli_override("log_level", Some("error"))
            .load()
            .unwrap();
        assert_eq!(settings.log_level, "error");
    }

    #[test]
    fn loader_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = SettingsLoader::new()
            .search_paths(vec![])
            .settings_file(Some(dir.path().join("absent.toml")))
            .no_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfpatchError::FileNotFound { .. }));
    }
}
