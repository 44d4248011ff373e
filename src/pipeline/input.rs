//! Input resolution: normalise a user-supplied path or URL to a local file,
//! and read a RAW file fully into memory.
//!
//! imagepipe and rawloader open files by path, so a URL is downloaded into a
//! `TempDir` that lives as long as the returned [`ResolvedInput`]. DNG is a
//! TIFF dialect; the header check catches obviously wrong inputs before the
//! decoder sees them.

use crate::error::Dng2PngError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Little-endian and big-endian TIFF headers.
const TIFF_MAGIC: [[u8; 4]; 2] = [*b"II*\0", *b"MM\0*"];

/// The resolved input: a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the file lives in a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the RAW file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// True when the first four bytes are a TIFF header.
pub fn has_tiff_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && TIFF_MAGIC.iter().any(|m| &bytes[..4] == m)
}

/// Resolve the input string to a local RAW file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Dng2PngError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if input.trim().is_empty() {
        Err(Dng2PngError::InvalidInput {
            input: input.to_string(),
        })
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and TIFF magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Dng2PngError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Dng2PngError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && !has_tiff_magic(&magic) {
                return Err(Dng2PngError::NotARawFile { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Dng2PngError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Dng2PngError::FileNotFound { path });
        }
    }

    debug!("Resolved local RAW file: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Dng2PngError> {
    info!("Downloading RAW file from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Dng2PngError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Dng2PngError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Dng2PngError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Dng2PngError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);

    let temp_dir = TempDir::new().map_err(|e| Dng2PngError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Dng2PngError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if bytes.len() >= 4 && !has_tiff_magic(&bytes) {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(Dng2PngError::NotARawFile {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Dng2PngError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a filename.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.dng".to_string()
}

/// Read the whole RAW file into memory.
pub async fn read_input(path: &Path) -> Result<Vec<u8>, Dng2PngError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Dng2PngError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => Dng2PngError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Dng2PngError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
    })?;

    if bytes.is_empty() {
        return Err(Dng2PngError::EmptyInput {
            path: path.to_path_buf(),
        });
    }

    debug!(
        "Read RAW file {} ({:.2} MB)",
        path.display(),
        bytes.len() as f64 / 1024.0 / 1024.0
    );
    Ok(bytes)
}
