//! SuperPaste core interface definition
//!
//! Shared types and the seams to the host application: the clipboard/window
//! action service, the global hotkey registrar, search-input focus control and
//! the image file remover.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of captured clipboard content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    /// Value stored in the `content_type` column
    pub fn database_type(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }

    /// Parse a stored `content_type`. Unknown values read back as text.
    pub fn from_database(value: &str) -> Self {
        match value {
            "image" => ContentType::Image,
            _ => ContentType::Text,
        }
    }
}

/// Change notification emitted by the store after every committed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A capture was persisted. `inserted` is false when an existing row was touched.
    Upserted { item_id: i64, inserted: bool, evicted: usize },
    /// An item was resurfaced by explicit reuse
    Touched { item_id: i64 },
    /// An item was deleted by the user
    Removed { item_id: i64 },
    /// A standalone retention sweep deleted rows
    Swept { evicted: usize },
    /// All items were deleted
    Cleared,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// A persisted clipboard history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardItem {
    pub id: i64,
    pub content_type: ContentType,
    pub content_hash: String,
    pub text_content: Option<String>,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub file_size: i64,
    pub source_app: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ClipboardItem {
    /// The value handed to the clipboard when the item is reused:
    /// the text for text items, the image path for image items.
    pub fn clipboard_content(&self) -> Option<&str> {
        match self.content_type {
            ContentType::Text => self.text_content.as_deref(),
            ContentType::Image => self.image_path.as_deref(),
        }
    }
}

/// A capture event pushed by the clipboard watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePayload {
    pub content_type: ContentType,
    pub content_hash: String,
    pub text_content: Option<String>,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub file_size: i64,
    #[serde(default)]
    pub source_app: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure reported by the host's global shortcut facility
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("shortcut '{0}' could not be registered: {1}")]
    Register(String, String),
    #[error("shortcut '{0}' could not be unregistered: {1}")]
    Unregister(String, String),
}

/// Failure reported by a clipboard/window/file action
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{action} failed: {message}")]
pub struct ActionError {
    pub action: &'static str,
    pub message: String,
}

impl ActionError {
    pub fn new(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            action,
            message: message.into(),
        }
    }
}

/// Error type for SuperPaste operations
#[derive(Debug, Error)]
pub enum SuperPasteError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),
    #[error("Hotkey rollback failed, no shortcut is active: {0}")]
    HotkeyRollback(HotkeyError),
    #[error("Action error: {0}")]
    Action(#[from] ActionError),
    #[error("Item {0} has no content to copy")]
    MissingContent(i64),
}

impl From<crate::database::DatabaseError> for SuperPasteError {
    fn from(e: crate::database::DatabaseError) -> Self {
        SuperPasteError::DatabaseError(e.to_string())
    }
}

pub type SuperPasteResult<T> = Result<T, SuperPasteError>;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATOR INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Clipboard and window commands implemented by the host.
/// Each call reports success or failure only.
pub trait ActionService: Send + Sync {
    fn copy_to_clipboard(&self, content: &str, content_type: ContentType) -> Result<(), ActionError>;

    /// Inject an OS paste into the previously focused application
    fn paste(&self) -> Result<(), ActionError>;

    fn hide_window(&self) -> Result<(), ActionError>;

    fn show_window(&self) -> Result<(), ActionError>;
}

/// Deletes the files owned by an image item
pub trait ImageFileRemover: Send + Sync {
    fn delete_image_files(
        &self,
        image_path: Option<&str>,
        thumbnail_path: Option<&str>,
    ) -> Result<(), ActionError>;
}

/// Global shortcut registration. The trigger callback is bound by the host
/// when it builds the registrar.
pub trait HotkeyRegistrar: Send + Sync {
    fn register(&self, combo: &str) -> Result<(), HotkeyError>;

    fn unregister(&self, combo: &str) -> Result<(), HotkeyError>;
}

/// Imperative focus control over the search input
pub trait FocusControl {
    fn request_focus(&self);

    fn request_blur(&self);

    fn is_focused(&self) -> bool;
}

/// Removes image files from the local filesystem.
/// Missing files count as already deleted.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageFileRemover;

impl ImageFileRemover for FsImageFileRemover {
    fn delete_image_files(
        &self,
        image_path: Option<&str>,
        thumbnail_path: Option<&str>,
    ) -> Result<(), ActionError> {
        let mut failures = Vec::new();
        for path in [image_path, thumbnail_path].into_iter().flatten() {
            if path.is_empty() {
                continue;
            }
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => failures.push(format!("{}: {}", path, e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ActionError::new("delete_image_files", failures.join("; ")))
        }
    }
}
