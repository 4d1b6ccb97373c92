// Configuration for kgidx.
// Reads from environment variables with defaults; built once in `main` and
// passed down explicitly.

use crate::indexer::IndexOptions;
use crate::indexer::python::DEFAULT_MAX_FILE_SIZE;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Snapshot file (KGIDX_SNAPSHOT). `None` means the CLI default.
    pub snapshot_path: Option<PathBuf>,

    /// Largest source accepted for analysis, in bytes (KGIDX_MAX_FILE_SIZE)
    pub max_file_size: u64,

    /// Log level or filter directive when RUST_LOG is unset (KGIDX_LOG)
    pub log_level: String,

    /// Requests slower than this are logged at warn level (KGIDX_SLOW_REQUEST_MS)
    pub slow_request_ms: u64,

    /// KGIDX_LINK_IMPORTS
    pub link_imports: bool,

    /// KGIDX_LINK_CALLS
    pub link_calls: bool,

    /// KGIDX_LINK_INHERITANCE
    pub link_inheritance: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            log_level: "info".to_string(),
            slow_request_ms: 100,
            link_imports: false,
            link_calls: false,
            link_inheritance: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, which maps variable names to values.
    /// Invalid values print a warning and keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(val) = lookup("KGIDX_SNAPSHOT").filter(|val| !val.trim().is_empty()) {
            config.snapshot_path = Some(PathBuf::from(val.trim()));
        }
        if let Some(val) = lookup("KGIDX_LOG").filter(|val| !val.trim().is_empty()) {
            config.log_level = val.trim().to_string();
        }
        parse_into(&lookup, "KGIDX_MAX_FILE_SIZE", &mut config.max_file_size);
        parse_into(&lookup, "KGIDX_SLOW_REQUEST_MS", &mut config.slow_request_ms);
        flag_into(&lookup, "KGIDX_LINK_IMPORTS", &mut config.link_imports);
        flag_into(&lookup, "KGIDX_LINK_CALLS", &mut config.link_calls);
        flag_into(&lookup, "KGIDX_LINK_INHERITANCE", &mut config.link_inheritance);

        config
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            link_imports: self.link_imports,
            link_calls: self.link_calls,
            link_inheritance: self.link_inheritance,
        }
    }
}

fn parse_into<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    let Some(val) = lookup(key) else {
        return;
    };
    match val.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => eprintln!("kgidx: Warning: Invalid {key} value: {val}, using default: {slot}"),
    }
}

fn flag_into(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut bool) {
    let Some(val) = lookup(key) else {
        return;
    };
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        _ => eprintln!("kgidx: Warning: Invalid {key} value: {val}, using default: {slot}"),
    }
}
