//! Location providers: Yandex Geocoder, Yandex organization search and the
//! OpenStreetMap Overpass API.
//!
//! Provider JSON is deserialized into private structs and converted to
//! [`GeoPoint`] / [`NamedPoint`] here; nothing past this module sees the
//! response shape.

use super::types::{District, Geocoder, LocationError, LocationSource, PlaceSearch};
use crate::config::Config;
use crate::geo::{GeoPoint, NamedPoint};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;

pub const GEOCODER_URL: &str = "https://geocode-maps.yandex.ru/1.x/";
pub const SEARCH_URL: &str = "https://search-maps.yandex.ru/v1/";
pub const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

const USER_AGENT: &str = concat!("geotasks/", env!("CARGO_PKG_VERSION"));

/// Label for candidates the provider returned without a name.
pub const UNNAMED_PLACE: &str = "Unnamed place";

/// Search window (degrees) around the reference point for organization search.
const SEARCH_SPAN: &str = "0.02,0.02";
const SEARCH_RESULTS: u32 = 10;
const GEOCODE_RESULTS: u32 = 1;

/// Default Overpass search radius in meters.
pub const DEFAULT_OVERPASS_RADIUS_M: u32 = 2000;

pub(crate) fn build_agent(config: &Config) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .build()
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

// ─── Yandex Geocoder ────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeocoderEnvelope {
    response: GeocoderResponse,
}

#[derive(Deserialize, Debug)]
struct GeocoderResponse {
    #[serde(rename = "GeoObjectCollection")]
    collection: GeoObjectCollection,
}

#[derive(Deserialize, Debug)]
struct GeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    members: Vec<FeatureMember>,
}

#[derive(Deserialize, Debug)]
struct FeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: GeoObject,
}

#[derive(Deserialize, Debug)]
struct GeoObject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "Point", default)]
    point: Option<PointPos>,
    #[serde(rename = "metaDataProperty", default)]
    meta: Option<MetaDataProperty>,
}

#[derive(Deserialize, Debug)]
struct PointPos {
    pos: String,
}

#[derive(Deserialize, Debug)]
struct MetaDataProperty {
    #[serde(rename = "GeocoderMetaData", default)]
    geocoder: Option<GeocoderMetaData>,
}

#[derive(Deserialize, Debug)]
struct GeocoderMetaData {
    #[serde(default)]
    kind: Option<String>,
}

impl GeoObject {
    fn kind(&self) -> Option<&str> {
        self.meta.as_ref()?.geocoder.as_ref()?.kind.as_deref()
    }
}

/// First feature's coordinates. No features means the address is unknown.
fn parse_geocode(address: &str, body: GeocoderEnvelope) -> Result<GeoPoint, LocationError> {
    let first = body
        .response
        .collection
        .members
        .into_iter()
        .next()
        .ok_or_else(|| LocationError::NotFound(address.to_string()))?;

    let pos = first
        .geo_object
        .point
        .ok_or_else(|| LocationError::InvalidResponse("feature has no Point".into()))?;

    Ok(GeoPoint::parse_pos(&pos.pos)?)
}

/// First feature whose geocoder kind is `district`.
fn parse_district(body: GeocoderEnvelope) -> Option<District> {
    body.response
        .collection
        .members
        .into_iter()
        .map(|m| m.geo_object)
        .find(|obj| obj.kind() == Some("district"))
        .map(|obj| District {
            name: obj.name.unwrap_or_default(),
            description: obj.description.filter(|d| !d.is_empty()),
        })
}

/// Query parameters besides the key. Forward lookups ask for one feature,
/// district lookups get the full list.
fn geocoder_params(geocode: &str, kind: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("geocode", geocode.to_string()), ("format", "json".to_string())];
    match kind {
        Some(kind) => params.push(("kind", kind.to_string())),
        None => params.push(("results", GEOCODE_RESULTS.to_string())),
    }
    params
}

/// Yandex Geocoder HTTP client.
pub struct YandexGeocoder {
    agent: ureq::Agent,
    api_key: String,
}

impl YandexGeocoder {
    pub fn new(api_key: impl Into<String>, config: &Config) -> Self {
        Self {
            agent: build_agent(config),
            api_key: api_key.into(),
        }
    }

    fn request(&self, geocode: &str, kind: Option<&str>) -> Result<GeocoderEnvelope, LocationError> {
        log::debug!("GET {} geocode='{}' kind={:?}", GEOCODER_URL, geocode, kind);

        let mut request = self.agent.get(GEOCODER_URL).query("apikey", &self.api_key);
        for (name, value) in geocoder_params(geocode, kind) {
            request = request.query(name, &value);
        }

        let response = request.call()?;
        response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))
    }
}

impl Geocoder for YandexGeocoder {
    fn geocode(&self, address: &str) -> Result<GeoPoint, LocationError> {
        let start = Instant::now();
        let point = parse_geocode(address, self.request(address, None)?)?;
        log::info!("geocode '{}' -> {} ({:.1}ms)", address, point, elapsed_ms(start));
        Ok(point)
    }

    fn district(&self, point: GeoPoint) -> Result<Option<District>, LocationError> {
        let start = Instant::now();
        let district = parse_district(self.request(&point.to_string(), Some("district"))?);
        log::info!(
            "district at {} -> {} ({:.1}ms)",
            point,
            district.as_ref().map_or("none", |d| d.name.as_str()),
            elapsed_ms(start),
        );
        Ok(district)
    }
}

// ─── Yandex organization search ─────────────────────────────────

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<SearchFeature>,
}

#[derive(Deserialize, Debug)]
struct SearchFeature {
    #[serde(default)]
    geometry: Option<SearchGeometry>,
    #[serde(default)]
    properties: SearchProperties,
}

#[derive(Deserialize, Debug)]
struct SearchGeometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

#[derive(Deserialize, Debug, Default)]
struct SearchProperties {
    #[serde(rename = "CompanyMetaData", default)]
    company: Option<CompanyMetaData>,
}

#[derive(Deserialize, Debug)]
struct CompanyMetaData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

fn parse_search(body: SearchResponse) -> Result<Vec<NamedPoint>, LocationError> {
    body.features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| -> Result<NamedPoint, LocationError> {
            let coords = feature.geometry.map(|g| g.coordinates).unwrap_or_default();
            let (name, address) = match feature.properties.company {
                Some(c) => (c.name, c.address),
                None => (None, None),
            };
            let mut candidate = NamedPoint::from_raw(
                index,
                name.unwrap_or_else(|| UNNAMED_PLACE.to_string()),
                coords.first().copied(),
                coords.get(1).copied(),
            )?;
            candidate.address = address;
            Ok(candidate)
        })
        .collect()
}

/// Yandex "search by organizations" HTTP client.
pub struct YandexSearch {
    agent: ureq::Agent,
    api_key: String,
    lang: String,
}

impl YandexSearch {
    pub fn new(api_key: impl Into<String>, config: &Config) -> Self {
        Self {
            agent: build_agent(config),
            api_key: api_key.into(),
            lang: config.lang.clone(),
        }
    }
}

impl PlaceSearch for YandexSearch {
    fn search(&self, reference: GeoPoint, query: &str) -> Result<Vec<NamedPoint>, LocationError> {
        let start = Instant::now();
        log::debug!("GET {} text='{}' ll={}", SEARCH_URL, query, reference);

        let response = self
            .agent
            .get(SEARCH_URL)
            .query("apikey", &self.api_key)
            .query("text", query)
            .query("ll", &reference.to_string())
            .query("type", "biz")
            .query("lang", &self.lang)
            .query("results", &SEARCH_RESULTS.to_string())
            .query("spn", SEARCH_SPAN)
            .call()?;

        let body: SearchResponse = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
        let candidates = parse_search(body)?;

        log::info!("search '{}' near {} -> {} results ({:.1}ms)", query, reference, candidates.len(), elapsed_ms(start));
        Ok(candidates)
    }

    fn source(&self) -> LocationSource {
        LocationSource::YandexSearch
    }
}

// ─── OpenStreetMap Overpass ─────────────────────────────────────

#[derive(Deserialize, Debug)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize, Debug)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

/// Overpass QL for every node, way and relation tagged `amenity=<amenity>`
/// within `radius_m` of `reference`. Ways and relations report their centre.
fn overpass_query(reference: GeoPoint, amenity: &str, radius_m: u32) -> String {
    let around = format!("around:{},{},{}", radius_m, reference.lat(), reference.lon());
    let amenity = amenity.replace('"', "");
    format!(
        "[out:json][timeout:25];\n(\n  node[\"amenity\"=\"{a}\"]({r});\n  way[\"amenity\"=\"{a}\"]({r});\n  relation[\"amenity\"=\"{a}\"]({r});\n);\nout center;",
        a = amenity,
        r = around,
    )
}

fn parse_overpass(body: OverpassResponse) -> Result<Vec<NamedPoint>, LocationError> {
    body.elements
        .into_iter()
        .enumerate()
        .filter(|(_, e)| matches!(e.kind.as_str(), "node" | "way" | "relation"))
        .map(|(index, mut element)| -> Result<NamedPoint, LocationError> {
            let (lon, lat) = match (&element.center, element.lon, element.lat) {
                (_, Some(lon), Some(lat)) => (Some(lon), Some(lat)),
                (Some(c), _, _) => (Some(c.lon), Some(c.lat)),
                _ => (element.lon, element.lat),
            };
            let name = element.tags.remove("name").unwrap_or_else(|| UNNAMED_PLACE.to_string());
            let mut candidate = NamedPoint::from_raw(index, name, lon, lat)?;
            candidate.address = overpass_address(&element.tags);
            Ok(candidate)
        })
        .collect()
}

fn overpass_address(tags: &HashMap<String, String>) -> Option<String> {
    let street = tags.get("addr:street")?;
    Some(match tags.get("addr:housenumber") {
        Some(number) => format!("{}, {}", street, number),
        None => street.clone(),
    })
}

/// Overpass API client. The search query is an `amenity` tag value.
pub struct OverpassSearch {
    agent: ureq::Agent,
    radius_m: u32,
}

impl OverpassSearch {
    pub fn new(config: &Config, radius_m: u32) -> Self {
        Self {
            agent: build_agent(config),
            radius_m,
        }
    }
}

impl PlaceSearch for OverpassSearch {
    fn search(&self, reference: GeoPoint, query: &str) -> Result<Vec<NamedPoint>, LocationError> {
        let start = Instant::now();
        let ql = overpass_query(reference, query, self.radius_m);
        log::debug!("POST {}\n{}", OVERPASS_URL, ql);

        let response = self.agent.post(OVERPASS_URL).send_form(&[("data", ql.as_str())])?;
        let body: OverpassResponse = response
            .into_json()
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;
        let candidates = parse_overpass(body)?;

        log::info!(
            "overpass amenity={} within {}m of {} -> {} results ({:.1}ms)",
            query, self.radius_m, reference, candidates.len(), elapsed_ms(start),
        );
        Ok(candidates)
    }

    fn source(&self) -> LocationSource {
        LocationSource::Overpass
    }
}
