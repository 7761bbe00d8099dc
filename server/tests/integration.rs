//! Integration Tests for Moonbase Server
//!
//! These tests drive the HTTP API end to end: display requests run the full
//! fetch / decode / composite / register pipeline and land on the map.

use axum::{Router, http::StatusCode, routing::get};
use serde_json::json;

mod common;
use common::*;

const CRATER_URL: &str = "http://rasters.test/crater.tif";
const DEM_URL: &str = "http://rasters.test/dem.tif";
const GARBAGE_URL: &str = "http://rasters.test/garbage.tif";

fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (CRATER_URL, gray_tiff(2, 2, &[0, 64, 128, 255])),
        (
            DEM_URL,
            georeferenced_rgb_tiff(2, 1, &[100, 50, 10, 150, 60, 20], (10.0, 5.0), 0.5),
        ),
        (GARBAGE_URL, b"definitely not a tiff".to_vec()),
    ]
}

// ============================================================================
// HTTP Route Integration Tests
// ============================================================================

mod http_routes {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let app = create_test_app();

        let (status, json) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_slot_returns_404() {
        let app = create_test_app();

        let (status, json) = send(&app, "GET", "/api/overlay/nothing-here", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_display_rejects_invalid_requests() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            "PUT",
            "/api/overlay/slot",
            Some(json!({ "url": "ftp://rasters.test/a.tif" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_request");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/overlay/slot",
            Some(json!({ "url": CRATER_URL, "bounds": [5.0, 5.0, 1.0, 1.0] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "PUT",
            "/api/overlay/bad%20slot",
            Some(json!({ "url": CRATER_URL })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Rejected requests never create a slot
        let (_, slots) = send(&app, "GET", "/api/overlay", None).await;
        assert_eq!(slots, json!([]));
    }

    #[tokio::test]
    async fn test_map_view_get_and_put() {
        let app = create_test_app();

        let (status, view) = send(&app, "GET", "/api/map/view", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["zoom"], 3);

        let (status, view) = send(
            &app,
            "PUT",
            "/api/map/view",
            Some(json!({ "center": { "lat": -89.0, "lng": 45.0 }, "zoom": 99 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["center"]["lat"], -89.0);
        assert_eq!(view["zoom"], 18);

        let (status, json) = send(
            &app,
            "PUT",
            "/api/map/view",
            Some(json!({ "center": { "lat": 120.0, "lng": 0.0 }, "zoom": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_request");
    }
}

// ============================================================================
// Overlay Pipeline Integration Tests
// ============================================================================

mod overlay_pipeline {
    use super::*;

    #[tokio::test]
    async fn test_display_grayscale_uses_viewport_estimate() {
        let (app, _) = create_test_app_with_state(fixtures());

        let (status, accepted) = send(
            &app,
            "PUT",
            "/api/overlay/crater",
            Some(json!({ "url": CRATER_URL, "opacity": 0.6, "z_index": 4 })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(accepted["slot"], "crater");
        assert_eq!(accepted["status"], "loading");

        let slot = wait_for_slot(&app, "crater").await;
        assert_eq!(slot["status"]["state"], "ready");
        assert_eq!(slot["status"]["seq"], accepted["seq"]);

        let (_, layers) = send(&app, "GET", "/api/map/layers", None).await;
        let layers = layers.as_array().unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0]["opacity"], 0.6);
        assert_eq!(layers[0]["z_index"], 4);
        assert!(
            layers[0]["image_url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
        // Zoom 3 at (0, 0): 22.5 degrees on each side for a square bitmap
        assert_eq!(layers[0]["bounds"], json!([[-11.25, -11.25], [11.25, 11.25]]));

        // Estimated placement does not move the map
        let (_, view) = send(&app, "GET", "/api/map/view", None).await;
        assert_eq!(view["zoom"], 3);
    }

    #[tokio::test]
    async fn test_display_geotiff_fits_viewport() {
        let (app, _) = create_test_app_with_state(fixtures());

        send(
            &app,
            "PUT",
            "/api/overlay/dem",
            Some(json!({ "url": DEM_URL })),
        )
        .await;
        let slot = wait_for_slot(&app, "dem").await;
        assert_eq!(slot["status"]["state"], "ready");

        let (_, layers) = send(&app, "GET", "/api/map/layers", None).await;
        assert_eq!(layers[0]["bounds"], json!([[4.5, 10.0], [5.0, 11.0]]));

        let (_, view) = send(&app, "GET", "/api/map/view", None).await;
        assert_eq!(view["center"], json!({ "lat": 4.75, "lng": 10.5 }));
        assert_eq!(view["zoom"], 10);
    }

    #[tokio::test]
    async fn test_redisplay_replaces_overlay() {
        let (app, state) = create_test_app_with_state(fixtures());

        send(&app, "PUT", "/api/overlay/user-map", Some(json!({ "url": CRATER_URL }))).await;
        wait_for_slot(&app, "user-map").await;
        send(&app, "PUT", "/api/overlay/user-map", Some(json!({ "url": DEM_URL }))).await;
        let slot = wait_for_slot(&app, "user-map").await;

        assert_eq!(slot["status"]["state"], "ready");
        assert_eq!(state.map.layer_count().await, 1);
        assert_eq!(
            slot["overlay"]["bounds"]["north_east"],
            json!({ "lat": 5.0, "lng": 11.0 })
        );
    }

    #[tokio::test]
    async fn test_failures_keep_previous_overlay() {
        let (app, state) = create_test_app_with_state(fixtures());

        send(&app, "PUT", "/api/overlay/slot", Some(json!({ "url": CRATER_URL }))).await;
        let ready = wait_for_slot(&app, "slot").await;

        send(&app, "PUT", "/api/overlay/slot", Some(json!({ "url": GARBAGE_URL }))).await;
        let failed = wait_for_slot(&app, "slot").await;
        assert_eq!(failed["status"]["state"], "failed");
        assert_eq!(failed["status"]["code"], "decode_error");
        assert_eq!(failed["overlay"], ready["overlay"]);

        send(
            &app,
            "PUT",
            "/api/overlay/slot",
            Some(json!({ "url": "http://rasters.test/missing.tif" })),
        )
        .await;
        let failed = wait_for_slot(&app, "slot").await;
        assert_eq!(failed["status"]["code"], "fetch_error");
        assert_eq!(state.map.layer_count().await, 1);

        // Dismissing the error restores the ready state
        let (status, _) = send(&app, "DELETE", "/api/overlay/slot/error", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, slot) = send(&app, "GET", "/api/overlay/slot", None).await;
        assert_eq!(slot["status"]["state"], "ready");
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let (app, state) = create_test_app_with_state(fixtures());

        send(&app, "PUT", "/api/overlay/slot", Some(json!({ "url": CRATER_URL }))).await;
        wait_for_slot(&app, "slot").await;

        let (status, _) = send(&app, "DELETE", "/api/overlay/slot", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/api/overlay/slot", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/api/overlay/never-used", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert_eq!(state.map.layer_count().await, 0);
        let (status, _) = send(&app, "GET", "/api/overlay/slot", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, slots) = send(&app, "GET", "/api/overlay", None).await;
        assert_eq!(slots, json!([]));
    }

    #[tokio::test]
    async fn test_slots_listed_in_order() {
        let (app, _) = create_test_app_with_state(fixtures());

        send(&app, "PUT", "/api/overlay/b", Some(json!({ "url": CRATER_URL }))).await;
        send(&app, "PUT", "/api/overlay/a", Some(json!({ "url": DEM_URL }))).await;
        wait_for_slot(&app, "a").await;
        wait_for_slot(&app, "b").await;

        let (_, slots) = send(&app, "GET", "/api/overlay", None).await;
        let names: Vec<_> = slots
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["slot"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

// ============================================================================
// GeoServer / HTTP Fetch Integration Tests
// ============================================================================

mod geoserver {
    use super::*;
    use moonbase_server::config::Config;
    use moonbase_server::server::{AppState, app_router};

    fn dem_bytes() -> Vec<u8> {
        georeferenced_rgb_tiff(2, 1, &[100, 50, 10, 150, 60, 20], (10.0, 5.0), 0.5)
    }

    #[tokio::test]
    async fn test_wms_layer_display_over_http() {
        let geoserver = Router::new().route(
            "/geoserver/lunar/wms",
            get(|| async { dem_bytes() }),
        );
        let base = serve(geoserver).await;

        let mut config = Config::default();
        config.geoserver.url = format!("{}/geoserver", base);
        let state = AppState::from_config(config).unwrap();
        let app = app_router(&state);

        let (status, _) = send(
            &app,
            "PUT",
            "/api/overlay/wms-slot/wms",
            Some(json!({
                "layer": "south_pole_dem",
                "opacity_percent": 50.0,
                "bbox": [-10.0, -20.0, 10.0, 20.0]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let slot = wait_for_slot(&app, "wms-slot").await;
        assert_eq!(slot["status"]["state"], "ready");
        assert_eq!(slot["overlay"]["opacity"], 0.5);
        // The requested bbox wins over the GeoTIFF's own tags
        assert_eq!(
            slot["overlay"]["bounds"]["south_west"],
            json!({ "lat": -20.0, "lng": -10.0 })
        );
    }

    #[tokio::test]
    async fn test_wms_layer_requires_name() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            "PUT",
            "/api/overlay/slot/wms",
            Some(json!({ "layer": "" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_request");
    }
}
