//! Route handlers: convert, download, inspect and the HTML pages.

use super::errors::ApiError;
use super::pages;
use super::upload::{receive_upload, UploadedFile};
use super::AppState;
use crate::convert::inspect as inspect_raw;
use crate::error::{Dng2PngError, UploadError};
use crate::output::RawMetadata;
use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use futures::{ready, Stream};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Body of a successful `POST /convert`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub message: String,
    /// Name to pass to `GET /download/{filename}`.
    pub filename: String,
}

pub async fn index_page() -> Html<&'static str> {
    Html(pages::mode_selector())
}

pub async fn api_mode_page(State(state): State<AppState>) -> Html<String> {
    Html(pages::api_mode(&state.config.field_name))
}

pub async fn wasm_mode_page() -> Html<&'static str> {
    Html(pages::wasm_mode())
}

/// Store the upload, convert it, delete the input, and report the PNG name.
///
/// The PNG stays in the scratch directory until it is downloaded or its
/// expiry fires. Conversion and cleanup run in their own task, so a client
/// that disconnects mid-request neither interrupts them nor leaks the input.
pub async fn convert(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Not a multipart request: {}", e);
        UploadError::MissingFile
    })?;
    let upload = receive_upload(&mut multipart, &state.config).await?;

    tokio::spawn(convert_upload(state, upload))
        .await
        .map_err(|e| {
            ApiError::Conversion(Dng2PngError::Internal(format!("conversion task: {e}")))
        })?
}

async fn convert_upload(
    state: AppState,
    upload: UploadedFile,
) -> Result<Json<ConvertResponse>, ApiError> {
    let filename = format!("{}.png", upload.stem);
    let output_path = state.config.upload_dir.join(&filename);

    let result = state
        .converter
        .convert_file(&upload.path, &output_path)
        .await;
    let original_name = upload.original_name.clone();
    upload.remove().await;

    match result {
        Ok(report) => {
            info!(
                "Converted '{}' → {} ({} bytes, attempts: {})",
                original_name,
                filename,
                report.output_bytes,
                report.attempts.len()
            );
            state
                .cleanup
                .schedule(output_path, state.config.output_ttl);
            Ok(Json(ConvertResponse {
                message: "Conversion completed successfully.".to_string(),
                filename,
            }))
        }
        Err(e) => {
            state.cleanup.remove_now(&output_path).await;
            Err(ApiError::Conversion(e))
        }
    }
}

/// Stream a generated PNG as an attachment.
///
/// The grace removal is armed only once the whole file has been handed to
/// the connection. An interrupted transfer leaves the expiry task in charge,
/// so the client can retry.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if !is_servable_name(&filename) {
        return Err(ApiError::NotFound);
    }
    let path = state.config.upload_dir.join(&filename);

    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(e) => return Err(ApiError::Upload(UploadError::Storage(e))),
    };
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::Upload(UploadError::Storage(e)))?
        .len();
    debug!("Serving {} ({} bytes)", filename, len);

    let cleanup = state.cleanup.clone();
    let grace = state.config.download_grace;
    let body = CompletionStream::new(ReaderStream::new(file), len, move || {
        debug!("Download of {} complete", path.display());
        cleanup.schedule(path, grace);
    });

    let headers = [
        (header::CONTENT_TYPE, "image/png".to_string()),
        (header::CONTENT_LENGTH, len.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, Body::from_stream(body)).into_response())
}

/// Read RAW metadata from an upload without converting it.
pub async fn inspect(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RawMetadata>, ApiError> {
    let mut multipart = multipart.map_err(|_| UploadError::MissingFile)?;
    let upload = receive_upload(&mut multipart, &state.config).await?;

    let result = inspect_raw(&upload.path).await;
    upload.remove().await;

    result.map(Json).map_err(ApiError::Inspect)
}

/// Byte stream that runs `on_complete` once `expected` bytes have been
/// yielded or the inner stream ends cleanly.
///
/// With a `Content-Length` the connection stops polling after the last
/// byte, so end-of-stream alone is not a reliable signal. Dropping the
/// stream early, or an I/O error, never runs the callback.
struct CompletionStream<S, F> {
    inner: S,
    remaining: u64,
    on_complete: Option<F>,
}

impl<S, F> CompletionStream<S, F> {
    fn new(inner: S, expected: u64, on_complete: F) -> Self {
        Self {
            inner,
            remaining: expected,
            on_complete: Some(on_complete),
        }
    }
}

impl<S, F> CompletionStream<S, F>
where
    F: FnOnce(),
{
    fn complete(&mut self) {
        if let Some(f) = self.on_complete.take() {
            f();
        }
    }
}

impl<S, F> Stream for CompletionStream<S, F>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    F: FnOnce() + Unpin,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
                if this.remaining == 0 {
                    this.complete();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                // A failed read must not count as delivered.
                this.on_complete = None;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.complete();
                Poll::Ready(None)
            }
        }
    }
}

/// A plain `*.png` file name: no separators, no parent references.
fn is_servable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && name.to_ascii_lowercase().ends_with(".png")
}
