//! ClipboardService - the object the host application holds
//!
//! Owns the history store and the settings on one database, ingests capture
//! events, and keeps the store's retention in step with the settings.

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::database::{Database, UpsertOutcome};
use crate::interface::{
    CapturePayload, ContentType, FsImageFileRemover, HotkeyRegistrar, ImageFileRemover,
    SuperPasteResult,
};
use crate::models::{Settings, SettingsPatch};
use crate::settings::SettingsStore;
use crate::store::ClipboardStore;
use std::sync::Arc;

pub struct ClipboardService {
    store: Arc<ClipboardStore>,
    settings: SettingsStore,
}

impl ClipboardService {
    /// Open the database named by `config` with the wall clock and the
    /// filesystem image remover
    pub fn open(config: &StoreConfig, hotkeys: Arc<dyn HotkeyRegistrar>) -> SuperPasteResult<Self> {
        let db = Database::open(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Opened clipboard history");
        Self::with_parts(
            Arc::new(db),
            hotkeys,
            Arc::new(SystemClock),
            Arc::new(FsImageFileRemover),
        )
    }

    /// Assemble from explicit collaborators. Settings are loaded first so the
    /// store starts with the persisted retention, which is applied right away.
    pub fn with_parts(
        db: Arc<Database>,
        hotkeys: Arc<dyn HotkeyRegistrar>,
        clock: Arc<dyn Clock>,
        files: Arc<dyn ImageFileRemover>,
    ) -> SuperPasteResult<Self> {
        let settings = SettingsStore::load(db.clone(), hotkeys)?;
        let store = ClipboardStore::with_collaborators(db, settings.settings().retention(), clock, files)?;
        store.sweep()?;

        Ok(Self {
            store: Arc::new(store),
            settings,
        })
    }

    pub fn store(&self) -> &Arc<ClipboardStore> {
        &self.store
    }

    pub fn settings(&self) -> Settings {
        self.settings.settings()
    }

    /// Register the global hotkey. Returns the shortcut that ended up active.
    pub fn start(&self) -> SuperPasteResult<String> {
        let shortcut = self.settings.activate_hotkey()?;
        tracing::info!(%shortcut, "Global shortcut active");
        Ok(shortcut)
    }

    /// Persist a capture from the clipboard watcher.
    ///
    /// Images over the configured size limit are skipped and `None` is
    /// returned. Payloads are otherwise stored as given.
    pub fn ingest(&self, payload: &CapturePayload) -> SuperPasteResult<Option<UpsertOutcome>> {
        let limit = self.settings.settings().max_file_size_bytes();
        if payload.content_type == ContentType::Image && payload.file_size > limit {
            tracing::info!(
                file_size = payload.file_size,
                limit,
                "Skipping image over size limit"
            );
            return Ok(None);
        }

        self.store.upsert(payload).map(Some)
    }

    pub fn update_shortcut(&self, shortcut: &str) -> SuperPasteResult<()> {
        self.settings.update_shortcut(shortcut)
    }

    /// Apply a settings patch and enforce the resulting retention immediately.
    /// Fields written before a failure still take effect.
    pub fn update_settings(&self, patch: &SettingsPatch) -> SuperPasteResult<Settings> {
        let result = self.settings.update_settings(patch);

        let retention = self.settings.settings().retention();
        if retention != self.store.retention() {
            self.store.set_retention(retention);
            self.store.sweep()?;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::interface::HotkeyError;
    use chrono::{Duration, TimeZone, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct NoopRegistrar {
        registered: Mutex<Vec<String>>,
    }

    impl HotkeyRegistrar for NoopRegistrar {
        fn register(&self, combo: &str) -> Result<(), HotkeyError> {
            self.registered.lock().push(combo.to_string());
            Ok(())
        }

        fn unregister(&self, combo: &str) -> Result<(), HotkeyError> {
            self.registered.lock().retain(|c| c != combo);
            Ok(())
        }
    }

    fn service() -> (ClipboardService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        let service = ClipboardService::with_parts(
            Arc::new(Database::open_in_memory().unwrap()),
            Arc::new(NoopRegistrar::default()),
            clock.clone(),
            Arc::new(FsImageFileRemover),
        )
        .unwrap();
        (service, clock)
    }

    #[test]
    fn test_ingest_skips_oversized_images() {
        let (service, _clock) = service();
        let mut payload = CapturePayload::image(&[0; 16], "/img/big.png", "/img/big_t.png", None);
        payload.file_size = 11 * 1024 * 1024;

        assert!(service.ingest(&payload).unwrap().is_none());
        assert_eq!(service.store().count().unwrap(), 0);

        // Text is never size-limited
        let mut text = CapturePayload::text("long", None);
        text.file_size = 11 * 1024 * 1024;
        assert!(service.ingest(&text).unwrap().is_some());
    }

    #[test]
    fn test_lowering_max_items_sweeps_immediately() {
        let (service, clock) = service();
        for i in 0..150 {
            service.ingest(&CapturePayload::text(format!("clip {}", i), None)).unwrap();
            clock.advance(Duration::seconds(1));
        }

        service
            .update_settings(&SettingsPatch {
                max_items: Some(100),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(service.store().count().unwrap(), 100);
        let newest = &service.store().list(1).unwrap()[0];
        assert_eq!(newest.text_content.as_deref(), Some("clip 149"));
    }

    #[test]
    fn test_lowering_max_days_sweeps_immediately() {
        let (service, clock) = service();
        service.ingest(&CapturePayload::text("week old", None)).unwrap();
        clock.advance(Duration::days(7));
        service.ingest(&CapturePayload::text("fresh", None)).unwrap();

        service
            .update_settings(&SettingsPatch {
                max_days: Some(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(service.store().count().unwrap(), 1);
        assert_eq!(service.settings().max_days, 3);
    }

    #[test]
    fn test_start_registers_shortcut() {
        let (service, _clock) = service();
        assert_eq!(service.start().unwrap(), crate::models::DEFAULT_SHORTCUT);
        service.update_shortcut("CommandOrControl+Shift+C").unwrap();
        assert_eq!(service.settings().shortcut, "CommandOrControl+Shift+C");
    }
}
