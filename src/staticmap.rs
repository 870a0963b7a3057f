//! Yandex Static Maps: request building, download and saving.

use crate::config::Config;
use crate::geo::GeoPoint;
use crate::location::LocationError;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use url::Url;

pub const STATIC_MAP_URL: &str = "https://static-maps.yandex.ru/1.x/";

/// Image size the API serves by default, `width,height` in pixels.
pub const DEFAULT_SIZE: (u32, u32) = (650, 450);

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 17;

/// Red marker with a dot.
pub const MARKER_RED: &str = "pm2rdm";
/// Green marker with a dot.
pub const MARKER_GREEN: &str = "pm2gnm";

const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapLayer {
    #[default]
    Map,
    Satellite,
    Hybrid,
}

impl fmt::Display for MapLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Map => write!(f, "map"),
            Self::Satellite => write!(f, "sat"),
            Self::Hybrid => write!(f, "sat,skl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub point: GeoPoint,
    pub style: String,
}

impl Marker {
    pub fn new(point: GeoPoint, style: impl Into<String>) -> Self {
        Self { point, style: style.into() }
    }
}

/// A static map request. Coordinates are written longitude first.
#[derive(Debug, Clone)]
pub struct StaticMap {
    layer: MapLayer,
    center: Option<GeoPoint>,
    zoom: Option<u8>,
    size: (u32, u32),
    lang: String,
    markers: Vec<Marker>,
    polyline: Vec<GeoPoint>,
}

impl StaticMap {
    pub fn new(lang: impl Into<String>) -> Self {
        Self {
            layer: MapLayer::default(),
            center: None,
            zoom: None,
            size: DEFAULT_SIZE,
            lang: lang.into(),
            markers: Vec::new(),
            polyline: Vec::new(),
        }
    }

    pub fn layer(mut self, layer: MapLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn center(mut self, point: GeoPoint) -> Self {
        self.center = Some(point);
        self
    }

    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom.clamp(MIN_ZOOM, MAX_ZOOM));
        self
    }

    pub fn marker(mut self, point: GeoPoint, style: &str) -> Self {
        self.markers.push(Marker::new(point, style));
        self
    }

    pub fn polyline(mut self, points: &[GeoPoint]) -> Self {
        self.polyline = points.to_vec();
        self
    }

    /// `lon,lat,style` per marker joined by `~`.
    fn markers_param(&self) -> Option<String> {
        if self.markers.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.markers.iter().map(|m| format!("{},{}", m.point, m.style)).collect();
        Some(parts.join("~"))
    }

    fn polyline_param(&self) -> Option<String> {
        if self.polyline.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .polyline
            .iter()
            .map(|p| format!("{:.6},{:.6}", p.lon(), p.lat()))
            .collect();
        Some(parts.join(","))
    }

    /// Full request URL, API key included.
    pub fn url(&self, api_key: &str) -> Result<Url, url::ParseError> {
        let mut params: Vec<(&str, String)> = vec![("apikey", api_key.to_string()), ("l", self.layer.to_string())];
        if let Some(center) = self.center {
            params.push(("ll", center.to_string()));
        }
        if let Some(pt) = self.markers_param() {
            params.push(("pt", pt));
        }
        if let Some(pl) = self.polyline_param() {
            params.push(("pl", pl));
        }
        if let Some(z) = self.zoom {
            params.push(("z", z.to_string()));
        }
        params.push(("size", format!("{},{}", self.size.0, self.size.1)));
        params.push(("lang", self.lang.clone()));

        Url::parse_with_params(STATIC_MAP_URL, &params)
    }

    /// Download the rendered image.
    pub fn fetch(&self, api_key: &str, config: &Config) -> Result<Vec<u8>, LocationError> {
        let url = self.url(api_key).map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
        log::debug!(
            "GET {} markers={} polyline={} zoom={:?}",
            STATIC_MAP_URL,
            self.markers.len(),
            self.polyline.len(),
            self.zoom,
        );

        let agent = crate::location::providers::build_agent(config);
        let response = agent.request_url("GET", &url).call()?;

        let bytes = read_image(response.into_reader(), MAX_IMAGE_BYTES)?;
        log::info!("static map: {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Read a whole image body, rejecting empty bodies and bodies over `limit`.
fn read_image<R: Read>(reader: R, limit: u64) -> Result<Vec<u8>, LocationError> {
    let mut bytes = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| LocationError::Network(e.to_string()))?;
    if bytes.is_empty() {
        return Err(LocationError::InvalidResponse("empty image".into()));
    }
    if bytes.len() as u64 > limit {
        return Err(LocationError::InvalidResponse(format!("image too large (over {} bytes)", limit)));
    }
    Ok(bytes)
}

/// Write image bytes to `path`, creating parent directories.
pub fn save_image(bytes: &[u8], path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn pt(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).unwrap()
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_markers_url() {
        let map = StaticMap::new("ru_RU")
            .marker(pt(37.554191, 55.715551), MARKER_RED)
            .marker(pt(37.440262, 55.818015), MARKER_RED)
            .zoom(11);
        let url = map.url("secret").unwrap();
        assert!(url.as_str().starts_with(STATIC_MAP_URL));

        let q = params(&url);
        assert_eq!(q["apikey"], "secret");
        assert_eq!(q["l"], "map");
        assert_eq!(q["pt"], "37.554191,55.715551,pm2rdm~37.440262,55.818015,pm2rdm");
        assert_eq!(q["z"], "11");
        assert_eq!(q["size"], "650,450");
        assert_eq!(q["lang"], "ru_RU");
        assert!(!q.contains_key("ll"));
        assert!(!q.contains_key("pl"));
    }

    #[test]
    fn test_polyline_url() {
        let map = StaticMap::new("ru_RU")
            .polyline(&[pt(37.617635, 55.752121), pt(37.63051, 55.743749)])
            .marker(pt(37.63051, 55.743749), MARKER_RED)
            .zoom(13);
        let q = params(&map.url("k").unwrap());
        assert_eq!(q["pl"], "37.617635,55.752121,37.630510,55.743749");
        assert_eq!(q["pt"], "37.63051,55.743749,pm2rdm");
    }

    #[test]
    fn test_center_layer_and_zoom_clamp() {
        let map = StaticMap::new("en_US").center(pt(30.335, 59.9343)).layer(MapLayer::Satellite).zoom(40);
        let q = params(&map.url("k").unwrap());
        assert_eq!(q["ll"], "30.335,59.9343");
        assert_eq!(q["l"], "sat");
        assert_eq!(q["z"], "17");
        assert_eq!(MapLayer::Hybrid.to_string(), "sat,skl");
    }

    #[test]
    fn test_read_image_limits() {
        assert_eq!(read_image(&b"PNGDATA"[..], 7).unwrap(), b"PNGDATA".to_vec());
        assert!(matches!(read_image(&b"PNGDATA+"[..], 7), Err(LocationError::InvalidResponse(ref m)) if m.contains("too large")));
        assert!(matches!(read_image(&b""[..], 7), Err(LocationError::InvalidResponse(ref m)) if m == "empty image"));
    }

    #[test]
    fn test_save_image_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("maps").join("out.png");
        save_image(&[0x89, b'P', b'N', b'G'], &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }
}
