//! Where the history database lives and how much of it the panel shows

use crate::search::DEFAULT_LIST_LIMIT;
use std::ffi::OsString;
use std::path::PathBuf;

/// Overrides the database location
pub const DB_PATH_ENV: &str = "SUPERPASTE_DB";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub list_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Defaults, with `SUPERPASTE_DB` taking precedence for the path
    pub fn from_env() -> Self {
        Self::with_override(std::env::var_os(DB_PATH_ENV))
    }

    fn with_override(db_path: Option<OsString>) -> Self {
        match db_path.filter(|p| !p.is_empty()) {
            Some(path) => Self {
                db_path: PathBuf::from(path),
                ..Self::default()
            },
            None => Self::default(),
        }
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("super-paste")
        .join("super-paste.db")
}
