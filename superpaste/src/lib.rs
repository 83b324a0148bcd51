//! SuperPaste Core - clipboard history business logic
//!
//! A deduplicated, recency-ordered history stored in SQLite with capacity and
//! age retention, persisted settings with transactional hotkey rebinding, and
//! the keyboard selection machine that drives the history panel.
//!
//! Clipboard capture, window chrome and paste injection stay with the host,
//! behind the traits in [`interface`].

pub mod capture;
pub mod clock;
pub mod config;
pub mod database;
pub mod interface;
pub mod models;
pub mod panel;
pub mod search;
pub mod selection;
pub mod service;
pub mod settings;
mod store;

pub use interface::*;
pub use panel::PanelController;
pub use service::ClipboardService;
pub use settings::SettingsStore;
pub use store::ClipboardStore;
