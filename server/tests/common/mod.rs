//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, StatusCode},
};
use moonbase_server::config::Config;
use moonbase_server::raster::{RasterError, RasterFetcher, TiffRasterDecoder};
use moonbase_server::server::{AppState, app_router};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;
use tower::util::ServiceExt;

const MODEL_PIXEL_SCALE_TAG: u16 = 33550;
const MODEL_TIEPOINT_TAG: u16 = 33922;

/// In-memory raster store keyed by URL
pub struct StaticFetcher {
    rasters: HashMap<String, Bytes>,
}

impl StaticFetcher {
    pub fn new(entries: Vec<(&str, Vec<u8>)>) -> Self {
        Self {
            rasters: entries
                .into_iter()
                .map(|(url, bytes)| (url.to_string(), Bytes::from(bytes)))
                .collect(),
        }
    }
}

#[async_trait]
impl RasterFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, RasterError> {
        self.rasters
            .get(url)
            .cloned()
            .ok_or_else(|| RasterError::Fetch {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

/// Create a test application router backed by an in-memory fetcher
pub fn create_test_app_with_state(entries: Vec<(&str, Vec<u8>)>) -> (Router, AppState) {
    let state = AppState::with_components(
        Config::default(),
        Arc::new(StaticFetcher::new(entries)),
        Arc::new(TiffRasterDecoder::new()),
    );
    (app_router(&state), state)
}

/// Create a test application router with no rasters available
pub fn create_test_app() -> Router {
    create_test_app_with_state(Vec::new()).0
}

/// Encode an 8-bit grayscale TIFF
pub fn gray_tiff(width: u32, height: u32, data: &[u8]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
    encoder
        .write_image::<colortype::Gray8>(width, height, data)
        .unwrap();
    cursor.into_inner()
}

/// Encode an 8-bit RGB GeoTIFF anchored at `origin` (lon, lat of the top-left corner)
pub fn georeferenced_rgb_tiff(
    width: u32,
    height: u32,
    data: &[u8],
    origin: (f64, f64),
    pixel_size: f64,
) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
    let mut image = encoder.new_image::<colortype::RGB8>(width, height).unwrap();
    let scale = [pixel_size, pixel_size, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, origin.0, origin.1, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE_TAG), &scale[..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT_TAG), &tiepoint[..])
        .unwrap();
    image.write_data(data).unwrap();
    cursor.into_inner()
}

/// Send a request and decode the JSON body (Null for empty bodies)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll a slot until it leaves the loading state
pub async fn wait_for_slot(app: &Router, slot: &str) -> serde_json::Value {
    for _ in 0..200 {
        let (status, json) = send(app, "GET", &format!("/api/overlay/{}", slot), None).await;
        if status == StatusCode::OK && json["status"]["state"] != "loading" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("slot '{}' never settled", slot);
}

/// Serve a router on an ephemeral local port, returning its base URL
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
