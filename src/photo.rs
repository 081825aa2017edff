use base64::Engine;
use thiserror::Error;

use crate::models::{PhotoUpload, MAX_PHOTO_BYTES};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhotoError {
    #[error("photo is empty")]
    Empty,
    #[error("photo is {0} bytes, the limit is 10 MB")]
    TooLarge(usize),
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("malformed data URI: {0}")]
    MalformedDataUri(&'static str),
}

/// A parsed `data:<mime>;base64,<data>` URI. Borrows from the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

/// Work out the MIME type from the magic bytes, falling back to the declared
/// content type when it names an image.
pub fn detect_mime(photo: &PhotoUpload) -> Result<String, PhotoError> {
    if let Ok(format) = image::guess_format(&photo.bytes) {
        return Ok(format.to_mime_type().to_string());
    }
    match photo.content_type.as_deref().map(str::trim) {
        Some(ct) if ct.starts_with("image/") => Ok(ct.to_string()),
        _ => Err(PhotoError::UnknownFormat),
    }
}

pub fn check_size(len: usize) -> Result<(), PhotoError> {
    if len == 0 {
        return Err(PhotoError::Empty);
    }
    if len > MAX_PHOTO_BYTES {
        return Err(PhotoError::TooLarge(len));
    }
    Ok(())
}

pub fn to_data_uri(photo: &PhotoUpload) -> Result<String, PhotoError> {
    check_size(photo.bytes.len())?;
    let mime = detect_mime(photo)?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&photo.bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

pub fn parse_data_uri(uri: &str) -> Result<DataUri<'_>, PhotoError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(PhotoError::MalformedDataUri("missing data: prefix"))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or(PhotoError::MalformedDataUri("missing comma separator"))?;
    let mime_type = meta
        .strip_suffix(";base64")
        .ok_or(PhotoError::MalformedDataUri("payload is not base64"))?;
    if mime_type.is_empty() || !mime_type.contains('/') {
        return Err(PhotoError::MalformedDataUri("missing MIME type"));
    }
    if data.is_empty() {
        return Err(PhotoError::MalformedDataUri("empty payload"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|_| PhotoError::MalformedDataUri("invalid base64 payload"))?;
    Ok(DataUri { mime_type, data })
}
