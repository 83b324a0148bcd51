//! Core data models for SuperPaste
//!
//! Persisted settings, the retention policy derived from them, and the
//! timestamp encoding shared by the database layer.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Shortcut registered when nothing usable is persisted
pub const DEFAULT_SHORTCUT: &str = "CommandOrControl+Shift+V";

/// Shortcuts offered by the settings UI
pub const SHORTCUT_OPTIONS: &[&str] = &[
    "CommandOrControl+Shift+V",
    "CommandOrControl+Shift+C",
    "CommandOrControl+Alt+V",
    "CommandOrControl+Alt+C",
    "CommandOrControl+Shift+P",
];

pub const MAX_ITEMS_RANGE: (i64, i64) = (100, 5000);
pub const MAX_DAYS_RANGE: (i64, i64) = (1, 365);

/// Settings keys in the key/value table
pub mod keys {
    pub const SHORTCUT: &str = "shortcut";
    pub const MAX_ITEMS: &str = "max_items";
    pub const MAX_DAYS: &str = "max_days";
    pub const MAX_FILE_SIZE_MB: &str = "max_file_size_mb";
}

// ─────────────────────────────────────────────────────────────────────────────
// SETTINGS
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub shortcut: String,
    pub max_items: i64,
    pub max_days: i64,
    pub max_file_size_mb: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shortcut: DEFAULT_SHORTCUT.to_string(),
            max_items: 1000,
            max_days: 30,
            max_file_size_mb: 10,
        }
    }
}

impl Settings {
    /// Overlay persisted key/value pairs onto the defaults.
    ///
    /// Unknown keys are ignored. Values that do not parse keep the default,
    /// numeric values outside their range are clamped into it.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Settings::default();
        for (key, value) in pairs {
            match key {
                keys::SHORTCUT => {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        settings.shortcut = trimmed.to_string();
                    }
                }
                keys::MAX_ITEMS => {
                    if let Ok(n) = value.trim().parse::<i64>() {
                        settings.max_items = n.clamp(MAX_ITEMS_RANGE.0, MAX_ITEMS_RANGE.1);
                    }
                }
                keys::MAX_DAYS => {
                    if let Ok(n) = value.trim().parse::<i64>() {
                        settings.max_days = n.clamp(MAX_DAYS_RANGE.0, MAX_DAYS_RANGE.1);
                    }
                }
                keys::MAX_FILE_SIZE_MB => {
                    if let Ok(n) = value.trim().parse::<i64>() {
                        settings.max_file_size_mb = n.max(1);
                    }
                }
                _ => {}
            }
        }
        settings
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_items: self.max_items,
            max_days: self.max_days,
        }
    }

    /// Largest capture accepted, in bytes
    pub fn max_file_size_bytes(&self) -> i64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// A partial settings update. `shortcut` is absent on purpose: rebinding
/// goes through `SettingsStore::update_shortcut`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub max_items: Option<i64>,
    pub max_days: Option<i64>,
    pub max_file_size_mb: Option<i64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.max_items.is_none() && self.max_days.is_none() && self.max_file_size_mb.is_none()
    }

    /// Check every present field against its allowed range
    pub fn validate(&self) -> Result<(), String> {
        if let Some(n) = self.max_items {
            if !(MAX_ITEMS_RANGE.0..=MAX_ITEMS_RANGE.1).contains(&n) {
                return Err(format!(
                    "max_items must be between {} and {}, got {}",
                    MAX_ITEMS_RANGE.0, MAX_ITEMS_RANGE.1, n
                ));
            }
        }
        if let Some(n) = self.max_days {
            if !(MAX_DAYS_RANGE.0..=MAX_DAYS_RANGE.1).contains(&n) {
                return Err(format!(
                    "max_days must be between {} and {}, got {}",
                    MAX_DAYS_RANGE.0, MAX_DAYS_RANGE.1, n
                ));
            }
        }
        if let Some(n) = self.max_file_size_mb {
            if n < 1 {
                return Err(format!("max_file_size_mb must be positive, got {}", n));
            }
        }
        Ok(())
    }

    /// Fields in write order, as key/value strings
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(n) = self.max_items {
            entries.push((keys::MAX_ITEMS, n.to_string()));
        }
        if let Some(n) = self.max_days {
            entries.push((keys::MAX_DAYS, n.to_string()));
        }
        if let Some(n) = self.max_file_size_mb {
            entries.push((keys::MAX_FILE_SIZE_MB, n.to_string()));
        }
        entries
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RETENTION
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity and age bounds enforced by the retention sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_items: i64,
    pub max_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Settings::default().retention()
    }
}

impl RetentionPolicy {
    /// Rows last updated before this instant are expired
    pub fn age_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.max_days.max(0))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TIMESTAMPS
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-width so that lexical order in SQLite equals chronological order
const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Also accepts SQLite's `datetime('now')` format.
pub fn parse_db_timestamp(timestamp_str: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .ok()
}

/// Truncate to the stored precision
pub fn to_db_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    let micros = ts.timestamp_micros();
    Utc.timestamp_micros(micros).single().unwrap_or(ts)
}
