use crate::error::{FileError, ValidationError};
use std::{path::Path, sync::Arc};

/// Largest image accepted for analysis (10 MiB).
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Media type used when neither the extension nor the content identify an image.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// An image chosen by the user, either through a picker or drag-and-drop.
///
/// The bytes are reference counted so the preview store and the outbound
/// request can share them without copying the image.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedFile {
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk and declares its media type.
    ///
    /// The type comes from the extension when it names a known image format,
    /// otherwise from the leading bytes. Files that match neither are declared
    /// as [`UNKNOWN_MEDIA_TYPE`] and will fail [`SelectedFile::validate`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let media_type = image::ImageFormat::from_path(path)
            .or_else(|_| image::guess_format(&bytes))
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| UNKNOWN_MEDIA_TYPE.to_string());

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self::new(name, media_type, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Checks the declared media type and size against `limit`.
    pub fn validate(&self, limit: u64) -> Result<(), ValidationError> {
        if !is_image_media_type(&self.media_type) {
            return Err(ValidationError::NotAnImage {
                media_type: self.media_type.clone(),
            });
        }
        if self.bytes.is_empty() {
            return Err(ValidationError::Empty);
        }
        if self.size() > limit {
            return Err(ValidationError::TooLarge {
                size: self.size(),
                limit,
            });
        }
        Ok(())
    }
}

fn is_image_media_type(media_type: &str) -> bool {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((kind, subtype)) => kind.eq_ignore_ascii_case("image") && !subtype.is_empty(),
        None => false,
    }
}
