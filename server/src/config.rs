//! Server configuration
//!
//! Configuration is loaded from environment variables. Every value has a default
//! so the service starts without any environment set.

use std::env;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Raster pipeline configuration
    pub raster: RasterConfig,

    /// Initial map view configuration
    pub map: MapConfig,

    /// GeoServer configuration for published user layers
    pub geoserver: GeoServerConfig,
}

/// Raster fetch / compositing configuration
#[derive(Debug, Clone)]
pub struct RasterConfig {
    /// Timeout for a single raster fetch
    pub fetch_timeout: Duration,
    /// Maximum accepted raster size in bytes
    pub max_fetch_size: usize,
    /// Whether gamma color correction is applied to composited bitmaps
    pub color_correction: bool,
    /// Gamma exponent used for color correction
    pub gamma: f64,
    /// Latitude span (degrees) of a heuristic overlay at zoom 0
    pub heuristic_base_span: f64,
}

/// Initial map view configuration
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Viewport size in pixels, used when fitting bounds
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// GeoServer configuration
#[derive(Debug, Clone)]
pub struct GeoServerConfig {
    /// Base URL, e.g. `http://geoserver:8080/geoserver`
    pub url: String,
    /// Workspace user layers are published into
    pub workspace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            raster: RasterConfig::default(),
            map: MapConfig::default(),
            geoserver: GeoServerConfig::default(),
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
            max_fetch_size: 256 * 1024 * 1024, // 256 MB
            color_correction: true,
            gamma: 0.8,
            heuristic_base_span: 180.0,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 0.0,
            center_lng: 0.0,
            zoom: 3,
            min_zoom: 0,
            max_zoom: 18,
            viewport_width: 1024,
            viewport_height: 768,
        }
    }
}

impl Default for GeoServerConfig {
    fn default() -> Self {
        Self {
            url: "http://geoserver:8080/geoserver".to_string(),
            workspace: "lunar".to_string(),
        }
    }
}

impl RasterConfig {
    /// Gamma to apply, or `None` when color correction is disabled
    pub fn effective_gamma(&self) -> Option<f64> {
        self.color_correction.then_some(self.gamma)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Raster config
        if let Ok(val) = env::var("FETCH_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.raster.fetch_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("FETCH_MAX_SIZE_MB")
            && let Ok(mb) = val.parse::<usize>()
        {
            config.raster.max_fetch_size = mb * 1024 * 1024;
        }
        if let Ok(val) = env::var("OVERLAY_COLOR_CORRECTION") {
            config.raster.color_correction = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("OVERLAY_GAMMA")
            && let Ok(g) = val.parse::<f64>()
            && g.is_finite()
            && g > 0.0
        {
            config.raster.gamma = g;
        }
        if let Ok(val) = env::var("OVERLAY_HEURISTIC_BASE_SPAN_DEG")
            && let Ok(span) = val.parse::<f64>()
            && span > 0.0
        {
            config.raster.heuristic_base_span = span;
        }

        // Map config
        if let Ok(val) = env::var("MAP_CENTER_LAT")
            && let Ok(lat) = val.parse()
        {
            config.map.center_lat = lat;
        }
        if let Ok(val) = env::var("MAP_CENTER_LNG")
            && let Ok(lng) = val.parse()
        {
            config.map.center_lng = lng;
        }
        if let Ok(val) = env::var("MAP_ZOOM")
            && let Ok(zoom) = val.parse()
        {
            config.map.zoom = zoom;
        }
        if let Ok(val) = env::var("MAP_VIEWPORT_WIDTH")
            && let Ok(w) = val.parse()
        {
            config.map.viewport_width = w;
        }
        if let Ok(val) = env::var("MAP_VIEWPORT_HEIGHT")
            && let Ok(h) = val.parse()
        {
            config.map.viewport_height = h;
        }

        // GeoServer config
        if let Ok(url) = env::var("GEOSERVER_URL")
            && !url.is_empty()
        {
            config.geoserver.url = url;
        }
        if let Ok(ws) = env::var("GEOSERVER_WORKSPACE")
            && !ws.is_empty()
        {
            config.geoserver.workspace = ws;
        }

        config
    }
}
