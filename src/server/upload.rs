//! Upload Receiver: validate and store one multipart RAW upload.
//!
//! The type check runs on the part headers, before a single byte is
//! written. The body is streamed to disk chunk by chunk and the running
//! total is compared to the limit, so an oversized upload is cut off early
//! and its partial file removed.
//!
//! The stored file is owned by a [`TempPath`] guard, so it is deleted even
//! when the request future is dropped mid-upload or mid-conversion.

use super::cleanup::remove_if_exists;
use crate::config::ServerConfig;
use crate::error::UploadError;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// A stored upload, owned by the request that received it.
///
/// Dropping it deletes the file; [`UploadedFile::remove`] does the same
/// without blocking.
#[derive(Debug)]
pub struct UploadedFile {
    /// Where the bytes were written.
    pub path: PathBuf,
    /// `field-<millis>-<random>`, shared by the input and its PNG.
    pub stem: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size: u64,
    guard: TempPath,
}

impl UploadedFile {
    /// Delete the stored file now.
    pub async fn remove(self) {
        remove_if_exists(&self.path).await;
        // Already gone; stop the guard from deleting again.
        let _ = self.guard.keep();
    }
}

/// Read the configured field from `multipart` and store it in the scratch
/// directory. Other fields are skipped.
pub async fn receive_upload(
    multipart: &mut Multipart,
    config: &ServerConfig,
) -> Result<UploadedFile, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, config))?
    {
        if field.name() != Some(config.field_name.as_str()) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        let type_ok = config.accepts_filename(&original_name)
            || content_type
                .as_deref()
                .is_some_and(|ct| config.accepts_mime(ct));
        if !type_ok {
            debug!(
                "Rejected upload '{}' ({:?})",
                original_name, content_type
            );
            return Err(UploadError::UnsupportedType {
                filename: original_name,
            });
        }

        tokio::fs::create_dir_all(&config.upload_dir).await?;
        let stem = unique_stem(&config.field_name);
        let path = config
            .upload_dir
            .join(format!("{}.{}", stem, stored_extension(&original_name)));

        let guard = TempPath::from_path(path.clone());
        return match store_field(field, &path, config).await {
            Ok(0) => {
                remove_if_exists(&path).await;
                let _ = guard.keep();
                Err(UploadError::EmptyFile)
            }
            Ok(size) => {
                info!(
                    "Stored upload '{}' ({} bytes) at {}",
                    original_name,
                    size,
                    path.display()
                );
                Ok(UploadedFile {
                    path,
                    stem,
                    original_name,
                    content_type,
                    size,
                    guard,
                })
            }
            Err(e) => {
                remove_if_exists(&path).await;
                let _ = guard.keep();
                Err(e)
            }
        };
    }

    Err(UploadError::MissingFile)
}

/// Stream a field to `path`, aborting once the total exceeds the limit.
async fn store_field(
    mut field: Field<'_>,
    path: &Path,
    config: &ServerConfig,
) -> Result<u64, UploadError> {
    let limit = config.max_upload_bytes;
    let mut file = tokio::fs::File::create(path).await?;
    let mut total: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, config))?
    {
        total += chunk.len() as u64;
        if total > limit {
            debug!("Upload exceeded {} bytes; aborting", limit);
            return Err(UploadError::TooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(total)
}

fn multipart_error(e: MultipartError, config: &ServerConfig) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            limit: config.max_upload_bytes,
        }
    } else {
        UploadError::Malformed(e.body_text())
    }
}

/// `<field>-<unix millis>-<random>`; unique enough that concurrent
/// requests never share a path.
pub fn unique_stem(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, millis, &random[..12])
}

/// Lower-cased extension of the original name, or `dng` when it has none
/// or it is not a plain alphanumeric suffix. `png` is reserved for outputs,
/// which share the stem.
fn stored_extension(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| e != "png")
        .unwrap_or_else(|| "dng".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_are_unique_and_prefixed() {
        let a = unique_stem("dngFile");
        let b = unique_stem("dngFile");
        assert!(a.starts_with("dngFile-"));
        assert_ne!(a, b);
        assert!(!a.contains('/'));
    }

    #[test]
    fn extension_is_sanitised() {
        assert_eq!(stored_extension("IMG_01.DNG"), "dng");
        assert_eq!(stored_extension("raw"), "dng");
        assert_eq!(stored_extension("weird.d n g"), "dng");
        assert_eq!(stored_extension("shot.tif"), "tif");
        assert_eq!(stored_extension("preview.PNG"), "dng");
    }

    fn stored(dir: &Path) -> UploadedFile {
        let path = dir.join("dngFile-1-abc.dng");
        std::fs::write(&path, b"raw").unwrap();
        UploadedFile {
            guard: TempPath::from_path(path.clone()),
            path,
            stem: "dngFile-1-abc".to_string(),
            original_name: "a.dng".to_string(),
            content_type: None,
            size: 3,
        }
    }

    #[test]
    fn dropping_an_upload_deletes_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored(dir.path());
        let path = upload.path.clone();

        drop(upload);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn remove_deletes_once() {
        let dir = tempfile::tempdir().unwrap();
        let upload = stored(dir.path());
        let path = upload.path.clone();

        upload.remove().await;
        assert!(!path.exists());
        // A new file at the same path is no longer owned by the guard.
        std::fs::write(&path, b"next").unwrap();
        assert!(path.exists());
    }
}
