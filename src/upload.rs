//! Files staged for a request: the receipt photo and the tax certificate.

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Largest file accepted for upload.
pub const MAX_UPLOAD_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
}

impl StagedFile {
    /// Wrap a data URL that came from the server (a profile's saved
    /// certificate, for instance).
    pub fn from_data_url(name: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_url: data_url.into(),
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Read a file from disk and turn it into an embeddable data URL.
pub fn read_data_url(path: &Path) -> std::io::Result<StagedFile> {
    let size = fs::metadata(path)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("el archivo pesa {size} bytes (máximo {MAX_UPLOAD_BYTES})"),
        ));
    }
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archivo".to_string());
    Ok(StagedFile {
        name,
        data_url: encode_data_url(mime_for(path), &bytes),
    })
}
