//! Static flag-to-key lookup and `--flag=value` tokenization.
//!
//! The built-in table covers the mailer and API keys operators edit most.
//! Extra rules come from the tool settings (see [`Settings::flags`]); a rule
//! for an existing flag replaces it in place, new flags are appended.
//!
//! [`Settings::flags`]: crate::settings::Settings::flags

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::update::FieldUpdate;

/// One flag rule: `--<flag>=<value>` sets `<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagMapping {
    /// Flag name without the leading `--`.
    pub flag: String,
    /// Configuration key the flag writes.
    pub key: String,
    /// Treat the value `null` as "unset" instead of the string `"null"`.
    #[serde(default)]
    pub null_sentinel: bool,
}

impl FlagMapping {
    pub fn new(flag: &str, key: &str, null_sentinel: bool) -> Self {
        FlagMapping {
            flag: flag.into(),
            key: key.into(),
            null_sentinel,
        }
    }
}

const BUILTIN: &[(&str, &str, bool)] = &[
    ("mailer-dsn", "mailer_dsn", false),
    ("mailer-from-name", "mailer_from_name", false),
    ("mailer-from-email", "mailer_from_email", false),
    ("api-rate-limiter-cache", "api_rate_limiter_cache", true),
];

/// Help text listing the built-in flags.
pub const BUILTIN_HELP: &str = "\
Field updates (after CONFIG_FILE):
  --mailer-dsn=<dsn>                 Set mailer_dsn
  --mailer-from-name=<name>          Set mailer_from_name
  --mailer-from-email=<email>        Set mailer_from_email
  --api-rate-limiter-cache=<value>   Set api_rate_limiter_cache (`null` unsets it)

More flags can be declared under [[flags]] in confpatch.toml.";

/// Ordered flag rules.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagTable {
    rules: Vec<FlagMapping>,
}

impl Default for FlagTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FlagTable {
    pub fn builtin() -> Self {
        FlagTable {
            rules: BUILTIN
                .iter()
                .map(|(flag, key, null)| FlagMapping::new(flag, key, *null))
                .collect(),
        }
    }

    /// Built-ins extended (or overridden) by `extra`.
    pub fn with_extra(extra: &[FlagMapping]) -> Self {
        let mut table = Self::builtin();
        for rule in extra {
            match table.rules.iter_mut().find(|r| r.flag == rule.flag) {
                Some(existing) => *existing = rule.clone(),
                None => table.rules.push(rule.clone()),
            }
        }
        table
    }

    pub fn rules(&self) -> &[FlagMapping] {
        &self.rules
    }

    pub fn get(&self, flag: &str) -> Option<&FlagMapping> {
        self.rules.iter().find(|r| r.flag == flag)
    }

    /// Turn parsed flags into updates, in table order.
    ///
    /// Flags the table does not know are logged and skipped.
    pub fn updates(&self, options: &IndexMap<String, String>) -> Vec<FieldUpdate> {
        for name in options.keys() {
            if self.get(name).is_none() {
                warn!(flag = %name, "ignoring unrecognized flag");
            }
        }
        self.rules
            .iter()
            .filter_map(|rule| {
                options
                    .get(&rule.flag)
                    .map(|raw| FieldUpdate::from_raw(&rule.key, raw, rule.null_sentinel))
            })
            .collect()
    }
}

/// Collect `--name=value` tokens into a name → value map.
///
/// Tokens that do not start with `--` or have no `=` are ignored. The value is
/// everything after the first `=`, so values may contain `=` themselves. When a
/// flag repeats, the last value wins.
pub fn parse_flag_args<S: AsRef<str>>(args: &[S]) -> IndexMap<String, String> {
    let mut options = IndexMap::new();
    for arg in args {
        let arg = arg.as_ref();
        let Some(body) = arg.strip_prefix("--") else {
            debug!(arg, "ignoring argument without '--'");
            continue;
        };
        match body.split_once('=') {
            Some((name, value)) => {
                options.insert(name.to_string(), value.to_string());
            }
            None => debug!(arg, "ignoring flag without '='"),
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ConfigValue;

    #[test]
    fn parses_name_value_pairs() {
        let opts = parse_flag_args(&["--mailer-dsn=smtp://u:p@host:25?x=1", "--mailer-from-name="]);
        assert_eq!(opts["mailer-dsn"], "smtp://u:p@host:25?x=1");
        assert_eq!(opts["mailer-from-name"], "");
    }

    #[test]
    fn ignores_tokens_without_equals_or_dashes() {
        let opts = parse_flag_args(&["--mailer-dsn", "stray", "-x=1", "--ok=1"]);
        assert_eq!(opts.len(), 1);
        assert_eq!(opts["ok"], "1");
    }

    #[test]
    fn last_repeat_wins() {
        let opts = parse_flag_args(&["--mailer-dsn=a", "--mailer-dsn=b"]);
        assert_eq!(opts["mailer-dsn"], "b");
    }

    #[test]
    fn builtin_table_maps_flags_to_keys() {
        let table = FlagTable::builtin();
        assert_eq!(table.get("mailer-dsn").unwrap().key, "mailer_dsn");
        assert!(table.get("api-rate-limiter-cache").unwrap().null_sentinel);
        assert!(!table.get("mailer-from-name").unwrap().null_sentinel);
        assert_eq!(table.rules().len(), 4);
    }

    #[test]
    fn updates_follow_table_order_not_argv_order() {
        let opts = parse_flag_args(&[
            "--api-rate-limiter-cache=redis",
            "--mailer-from-email=a@b.c",
            "--mailer-dsn=smtp://new",
        ]);
        let keys: Vec<String> = FlagTable::builtin()
            .updates(&opts)
            .into_iter()
            .map(|u| u.key)
            .collect();
        assert_eq!(keys, ["mailer_dsn", "mailer_from_email", "api_rate_limiter_cache"]);
    }

    #[test]
    fn null_sentinel_only_where_declared() {
        let opts = parse_flag_args(&["--api-rate-limiter-cache=null", "--mailer-from-name=null"]);
        let updates = FlagTable::builtin().updates(&opts);
        assert_eq!(updates[0].key, "mailer_from_name");
        assert_eq!(updates[0].value, ConfigValue::from("null"));
        assert_eq!(updates[1].value, ConfigValue::Null);
    }

    #[test]
    fn unknown_flags_produce_no_updates() {
        let opts = parse_flag_args(&["--db-host=x"]);
        assert!(FlagTable::builtin().updates(&opts).is_empty());
    }

    #[test]
    fn extra_rules_append_and_override() {
        let table = FlagTable::with_extra(&[
            FlagMapping::new("db-host", "db_host", false),
            FlagMapping::new("mailer-dsn", "mailer_transport_dsn", false),
        ]);
        assert_eq!(table.rules().len(), 5);
        assert_eq!(table.rules()[0].key, "mailer_transport_dsn");
        assert_eq!(table.rules()[4].flag, "db-host");
    }
}
