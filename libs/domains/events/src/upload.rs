//! Image upload checks
//!
//! An upload is accepted only when its extension, its declared content type
//! (if any) and its leading bytes all agree on one of the accepted formats.

use crate::error::{EventError, Result};

/// Default ceiling for a single image
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const REJECTED_TYPE: &str = "Only image files are allowed (jpeg, jpg, png, gif)";

/// Accepted raster formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Whether `declared` names this format. Parameters are ignored.
    fn accepts_content_type(&self, ext: &str, declared: &str) -> bool {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let guessed = mime_guess::from_ext(ext).iter().any(|m| m.essence_str() == essence);
        guessed || (*self == Self::Jpeg && matches!(essence.as_str(), "image/jpg" | "image/pjpeg"))
    }

    fn matches_signature(&self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        }
    }
}

/// An `image` part as received, before any checks
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// An image that passed every check, ready for the blob store
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedImage {
    pub format: ImageFormat,
    /// Original extension, lower-cased
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Check an upload's type and size.
pub fn validate_image(image: UploadedImage, max_bytes: usize) -> Result<ValidatedImage> {
    let extension = std::path::Path::new(&image.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| EventError::InvalidUpload(REJECTED_TYPE.to_string()))?;

    let format = ImageFormat::from_extension(&extension)
        .ok_or_else(|| EventError::InvalidUpload(REJECTED_TYPE.to_string()))?;

    if let Some(declared) = image.content_type.as_deref() {
        if !format.accepts_content_type(&extension, declared) {
            return Err(EventError::InvalidUpload(REJECTED_TYPE.to_string()));
        }
    }

    if image.bytes.is_empty() {
        return Err(EventError::InvalidUpload("Image file is empty".to_string()));
    }

    if image.bytes.len() > max_bytes {
        return Err(EventError::InvalidUpload(format!(
            "Image exceeds the {} byte limit",
            max_bytes
        )));
    }

    if !format.matches_signature(&image.bytes) {
        return Err(EventError::InvalidUpload(
            "Image content does not match its file type".to_string(),
        ));
    }

    Ok(ValidatedImage {
        format,
        extension,
        bytes: image.bytes,
    })
}
