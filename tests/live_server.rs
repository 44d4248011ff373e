//! Tests against a real listening socket, where a client can hang up in the
//! middle of a request or a download.

use dng2png::{
    AppState, ContainerDecoder, ConversionConfig, Converter, DecodeOutcome, DecodePreset,
    RawDecoder, RawInput, ServerConfig,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BOUNDARY: &str = "dng2pngTestBoundary";

/// Takes long enough that the client gives up first.
struct SlowDecoder(Duration);

impl RawDecoder for SlowDecoder {
    fn decode(&self, _input: RawInput<'_>, _preset: &DecodePreset) -> DecodeOutcome {
        std::thread::sleep(self.0);
        DecodeOutcome::from_image(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            4,
            4,
            Rgb([10, 20, 30]),
        )))
    }
}

struct NoFallback;

impl ContainerDecoder for NoFallback {
    fn decode(&self, _bytes: &[u8]) -> Result<DynamicImage, String> {
        Err("no fallback".to_string())
    }
}

async fn spawn_server(dir: &Path, decoder: Arc<dyn RawDecoder>) -> SocketAddr {
    let config = ServerConfig::builder()
        .upload_dir(dir)
        .download_grace(Duration::ZERO)
        .output_ttl(Duration::from_secs(3600))
        .build()
        .unwrap();
    let converter =
        Converter::with_decoders(ConversionConfig::default(), decoder, Arc::new(NoFallback));
    let app = dng2png::router(AppState::new(config, converter));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn multipart_body(file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"dngFile\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn files_with_extension(dir: &Path, ext: &str) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == ext))
        .count()
}

#[tokio::test]
async fn abandoned_convert_still_finishes_and_removes_input() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path(), Arc::new(SlowDecoder(Duration::from_millis(800)))).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let result = client
        .post(format!("http://{addr}/convert"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body("slow.dng", &[9u8; 2048]))
        .send()
        .await;
    assert!(result.is_err(), "client should time out before the decoder returns");

    // The conversion keeps running without the client: the input goes away
    // and the PNG is left for its expiry.
    let mut settled = false;
    for _ in 0..100 {
        if files_with_extension(dir.path(), "dng") == 0
            && files_with_extension(dir.path(), "png") == 1
        {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(settled, "expected only the converted PNG to remain");
}

#[tokio::test]
async fn interrupted_download_keeps_the_file() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path(), Arc::new(SlowDecoder(Duration::ZERO))).await;

    // Far larger than the loopback socket buffers, so the transfer cannot
    // finish on its own once the client stops reading.
    let size = 64 * 1024 * 1024;
    let name = "dngFile-1-large.png";
    let path = dir.path().join(name);
    std::fs::write(&path, vec![0u8; size]).unwrap();

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/download/{name}");

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    drop(response);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(path.exists(), "an unfinished download must not arm the removal");

    // A complete transfer does.
    let bytes = client.get(&url).send().await.unwrap().bytes().await.unwrap();
    assert_eq!(bytes.len(), size);

    let mut gone = false;
    for _ in 0..100 {
        if !path.exists() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gone, "completed download should be removed after the grace delay");
}
