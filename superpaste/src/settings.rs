//! Persisted settings and global hotkey rebinding
//!
//! Settings live in a key/value table so new keys can be added without a
//! migration. The shortcut is special: changing it swaps the registered
//! global hotkey, and the swap is rolled back when the host refuses the new one.

use crate::database::{Database, DatabaseResult};
use crate::interface::{HotkeyRegistrar, SuperPasteError, SuperPasteResult};
use crate::models::{keys, Settings, SettingsPatch, DEFAULT_SHORTCUT};
use parking_lot::Mutex;
use std::sync::Arc;

/// Key/value persistence for settings
pub trait SettingsRepository: Send + Sync {
    fn load_all(&self) -> DatabaseResult<Vec<(String, String)>>;

    fn put(&self, key: &str, value: &str) -> DatabaseResult<()>;
}

impl SettingsRepository for Database {
    fn load_all(&self) -> DatabaseResult<Vec<(String, String)>> {
        self.load_settings()
    }

    fn put(&self, key: &str, value: &str) -> DatabaseResult<()> {
        self.put_setting(key, value)
    }
}

pub struct SettingsStore {
    repo: Arc<dyn SettingsRepository>,
    hotkeys: Arc<dyn HotkeyRegistrar>,
    /// Also held across a shortcut swap so swaps never interleave
    current: Mutex<Settings>,
}

impl SettingsStore {
    /// Defaults overlaid with whatever is persisted
    pub fn load(
        repo: Arc<dyn SettingsRepository>,
        hotkeys: Arc<dyn HotkeyRegistrar>,
    ) -> SuperPasteResult<Self> {
        let pairs = repo.load_all()?;
        let settings = Settings::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        tracing::debug!(?settings, "Loaded settings");

        Ok(Self {
            repo,
            hotkeys,
            current: Mutex::new(settings),
        })
    }

    /// Snapshot of the in-memory settings
    pub fn settings(&self) -> Settings {
        self.current.lock().clone()
    }

    /// Register the configured shortcut at startup.
    ///
    /// Safe to call repeatedly. If the host refuses the configured shortcut,
    /// the default one is registered instead for this session; the persisted
    /// choice is left alone. Returns the shortcut that is now active.
    pub fn activate_hotkey(&self) -> SuperPasteResult<String> {
        let mut current = self.current.lock();

        let err = match self.hotkeys.register(&current.shortcut) {
            Ok(()) => return Ok(current.shortcut.clone()),
            Err(e) => e,
        };

        if current.shortcut == DEFAULT_SHORTCUT {
            return Err(err.into());
        }

        tracing::warn!(
            shortcut = %current.shortcut,
            error = %err,
            "Configured shortcut unavailable, falling back to default"
        );
        self.hotkeys.register(DEFAULT_SHORTCUT)?;
        current.shortcut = DEFAULT_SHORTCUT.to_string();
        Ok(current.shortcut.clone())
    }

    /// Swap the global hotkey.
    ///
    /// On any failure the previous shortcut is registered again and the
    /// in-memory and persisted settings keep it. `HotkeyRollback` means even
    /// that re-registration failed.
    pub fn update_shortcut(&self, new_shortcut: &str) -> SuperPasteResult<()> {
        let new_shortcut = new_shortcut.trim();
        if new_shortcut.is_empty() {
            return Err(SuperPasteError::InvalidInput(
                "shortcut must not be empty".to_string(),
            ));
        }

        let mut current = self.current.lock();
        let old_shortcut = current.shortcut.clone();
        if new_shortcut == old_shortcut {
            return Ok(());
        }

        // Old one is still active if this fails
        self.hotkeys.unregister(&old_shortcut)?;

        if let Err(e) = self.hotkeys.register(new_shortcut) {
            self.restore_shortcut(&old_shortcut)?;
            tracing::warn!(shortcut = new_shortcut, error = %e, "Shortcut rejected, kept previous");
            return Err(e.into());
        }

        if let Err(e) = self.repo.put(keys::SHORTCUT, new_shortcut) {
            if let Err(unreg) = self.hotkeys.unregister(new_shortcut) {
                tracing::warn!(error = %unreg, "Failed to unregister shortcut after save failure");
            }
            self.restore_shortcut(&old_shortcut)?;
            return Err(e.into());
        }

        tracing::info!(from = %old_shortcut, to = new_shortcut, "Shortcut updated");
        current.shortcut = new_shortcut.to_string();
        Ok(())
    }

    fn restore_shortcut(&self, shortcut: &str) -> SuperPasteResult<()> {
        self.hotkeys.register(shortcut).map_err(|e| {
            tracing::error!(shortcut, error = %e, "Shortcut rollback failed, no global hotkey is active");
            SuperPasteError::HotkeyRollback(e)
        })
    }

    /// Persist each field of the patch and merge the written ones.
    ///
    /// The whole patch is range-checked before anything is written. Fields are
    /// then written one by one and the first write failure ends the call.
    /// Fields written before it stay written and merged; later fields are not
    /// attempted. Returns the merged settings.
    pub fn update_settings(&self, patch: &SettingsPatch) -> SuperPasteResult<Settings> {
        patch.validate().map_err(SuperPasteError::InvalidInput)?;

        let mut current = self.current.lock();
        for (key, value) in patch.entries() {
            if let Err(e) = self.repo.put(key, &value) {
                tracing::warn!(key, error = %e, "Failed to save setting");
                return Err(e.into());
            }
            apply_field(&mut current, key, patch);
        }
        Ok(current.clone())
    }
}

fn apply_field(settings: &mut Settings, key: &str, patch: &SettingsPatch) {
    match key {
        keys::MAX_ITEMS => {
            if let Some(n) = patch.max_items {
                settings.max_items = n;
            }
        }
        keys::MAX_DAYS => {
            if let Some(n) = patch.max_days {
                settings.max_days = n;
            }
        }
        keys::MAX_FILE_SIZE_MB => {
            if let Some(n) = patch.max_file_size_mb {
                settings.max_file_size_mb = n;
            }
        }
        _ => {}
    }
}
