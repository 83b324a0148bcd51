//! Capture payload helpers for clipboard watcher adapters
//!
//! The watcher owns the OS hook and image encoding; these helpers only build
//! the payload the store ingests, with a SHA-256 content hash as dedup key.

use sha2::{Digest, Sha256};

use crate::interface::{CapturePayload, ContentType};

/// Hex-encoded SHA-256 digest of the raw clipboard bytes
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

impl CapturePayload {
    /// A text capture hashed over its UTF-8 bytes
    pub fn text(text: impl Into<String>, source_app: Option<String>) -> Self {
        let text = text.into();
        Self {
            content_type: ContentType::Text,
            content_hash: content_hash(text.as_bytes()),
            file_size: text.len() as i64,
            text_content: Some(text),
            image_path: None,
            thumbnail_path: None,
            source_app,
        }
    }

    /// An image capture already written to disk by the watcher.
    /// `pixels` are the raw clipboard bytes the hash is computed over.
    pub fn image(
        pixels: &[u8],
        image_path: impl Into<String>,
        thumbnail_path: impl Into<String>,
        source_app: Option<String>,
    ) -> Self {
        Self {
            content_type: ContentType::Image,
            content_hash: content_hash(pixels),
            text_content: None,
            image_path: Some(image_path.into()),
            thumbnail_path: Some(thumbnail_path.into()),
            file_size: pixels.len() as i64,
            source_app,
        }
    }
}
