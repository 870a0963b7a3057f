//! Task orchestration: collaborators in, typed reports out.
//!
//! Each task turns addresses into points through a [`Geocoder`], hands the
//! points to the distance/selection core and returns a serializable report.
//! Printing is left to the caller.

use crate::config::ConfigError;
use crate::geo::{self, GeoError, GeoPoint, NamedPoint};
use crate::location::{District, Geocoder, LocationError, LocationSource, PlaceSearch};
use crate::selector;
use crate::staticmap::{self, StaticMap, MARKER_GREEN, MARKER_RED};
use serde::Serialize;
use thiserror::Error;

pub const MARKERS_ZOOM: u8 = 11;
pub const PATH_ZOOM: u8 = 13;
pub const NEAREST_ZOOM: u8 = 15;
pub const DEFAULT_SNAPSHOT_ZOOM: u8 = 16;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Input(String),
}

/// An address together with the point it geocoded to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    pub query: String,
    pub point: GeoPoint,
}

fn locate(geocoder: &dyn Geocoder, query: &str) -> Result<Located, TaskError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(TaskError::Input("Address is empty".into()));
    }
    let point = geocoder.geocode(query)?;
    Ok(Located { query: query.to_string(), point })
}

// ─── Distance between two addresses ─────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DistanceReport {
    pub from: Located,
    pub to: Located,
    pub distance_m: f64,
}

pub fn distance_between(geocoder: &dyn Geocoder, from: &str, to: &str) -> Result<DistanceReport, TaskError> {
    let from = locate(geocoder, from)?;
    let to = locate(geocoder, to)?;
    let distance_m = geo::distance(from.point, to.point);
    Ok(DistanceReport { from, to, distance_m })
}

// ─── Southernmost city ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SouthernmostReport {
    pub southernmost: NamedPoint,
    pub resolved: Vec<NamedPoint>,
    /// Names the geocoder did not know.
    pub unresolved: Vec<String>,
}

/// Split `"Moscow, Kazan , ,Sochi"` into trimmed, non-empty names.
pub fn split_city_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Geocode each city and pick the one with the lowest latitude.
///
/// Unknown cities are recorded and skipped; any other failure aborts.
pub fn southernmost_city(geocoder: &dyn Geocoder, cities: &[String]) -> Result<SouthernmostReport, TaskError> {
    if cities.is_empty() {
        return Err(TaskError::Input("No valid cities entered".into()));
    }

    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for city in cities {
        match geocoder.geocode(city) {
            Ok(point) => resolved.push(NamedPoint::new(city.clone(), point)),
            Err(LocationError::NotFound(_)) => {
                log::warn!("City not found: {}", city);
                unresolved.push(city.clone());
            }
            Err(e) => return Err(e.into()),
        }
    }

    let southernmost = selector::southernmost(&resolved)?
        .cloned()
        .ok_or(GeoError::EmptyCandidateSet)?;

    Ok(SouthernmostReport { southernmost, resolved, unresolved })
}

// ─── Nearest place ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct NearestPlaceReport {
    pub origin: Located,
    pub place: NamedPoint,
    pub distance_m: f64,
    pub candidates: usize,
    pub source: LocationSource,
}

/// Geocode `address`, search around it and keep the closest result.
///
/// An empty search result is [`GeoError::EmptyCandidateSet`].
pub fn nearest_place(
    geocoder: &dyn Geocoder,
    search: &dyn PlaceSearch,
    address: &str,
    query: &str,
) -> Result<NearestPlaceReport, TaskError> {
    let origin = locate(geocoder, address)?;
    let candidates = search.search(origin.point, query)?;

    let nearest = selector::nearest(origin.point, &candidates)?.ok_or(GeoError::EmptyCandidateSet)?;
    let place = nearest.candidate.clone();
    let distance_m = nearest.distance_m;

    Ok(NearestPlaceReport {
        origin,
        place,
        distance_m,
        candidates: candidates.len(),
        source: search.source(),
    })
}

/// Origin in red, destination in green, centred on the origin.
pub fn nearest_place_map(report: &NearestPlaceReport, lang: &str) -> StaticMap {
    StaticMap::new(lang)
        .center(report.origin.point)
        .zoom(NEAREST_ZOOM)
        .marker(report.origin.point, MARKER_RED)
        .marker(report.place.point, MARKER_GREEN)
}

// ─── District ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DistrictReport {
    pub location: Located,
    pub district: Option<District>,
}

pub fn find_district(geocoder: &dyn Geocoder, address: &str) -> Result<DistrictReport, TaskError> {
    let location = locate(geocoder, address)?;
    let district = geocoder.district(location.point)?;
    Ok(DistrictReport { location, district })
}

// ─── Path ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub waypoints: Vec<GeoPoint>,
    pub legs_m: Vec<f64>,
    pub total_m: f64,
    pub middle: GeoPoint,
}

pub fn path_report(waypoints: &[GeoPoint]) -> Result<PathReport, TaskError> {
    let middle = geo::middle_point(waypoints).ok_or_else(|| TaskError::Input("Path has no waypoints".into()))?;
    let legs_m: Vec<f64> = waypoints.windows(2).map(|w| geo::distance(w[0], w[1])).collect();
    Ok(PathReport {
        waypoints: waypoints.to_vec(),
        legs_m,
        total_m: geo::path_length(waypoints),
        middle,
    })
}

/// Polyline through every waypoint with a marker on the middle one.
pub fn path_map(report: &PathReport, lang: &str) -> StaticMap {
    StaticMap::new(lang)
        .polyline(&report.waypoints)
        .marker(report.middle, MARKER_RED)
        .zoom(PATH_ZOOM)
}

// ─── Markers and snapshots ──────────────────────────────────────

pub fn markers_map(points: &[NamedPoint], lang: &str) -> StaticMap {
    points
        .iter()
        .fold(StaticMap::new(lang), |map, p| map.marker(p.point, MARKER_RED))
        .zoom(MARKERS_ZOOM)
}

/// Requested zoom if within the static map range, otherwise the default.
pub fn snapshot_zoom(requested: Option<i64>) -> u8 {
    let Some(z) = requested else {
        return DEFAULT_SNAPSHOT_ZOOM;
    };
    match u8::try_from(z) {
        Ok(zoom) if (staticmap::MIN_ZOOM..=staticmap::MAX_ZOOM).contains(&zoom) => zoom,
        _ => {
            log::warn!(
                "Invalid zoom level {} ({}-{}). Using default zoom level of {}.",
                z, staticmap::MIN_ZOOM, staticmap::MAX_ZOOM, DEFAULT_SNAPSHOT_ZOOM,
            );
            DEFAULT_SNAPSHOT_ZOOM
        }
    }
}

pub fn snapshot_map(point: GeoPoint, zoom: u8, lang: &str) -> StaticMap {
    StaticMap::new(lang).center(point).zoom(zoom)
}

pub fn snapshot_filename(point: GeoPoint) -> String {
    format!("snapshot_{}_{}.png", point.lon(), point.lat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::METERS_PER_DEGREE;
    use crate::location::BuiltinGeocoder;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeGeocoder {
        known: HashMap<&'static str, GeoPoint>,
        district: Option<District>,
        fail_with_network: bool,
    }

    impl FakeGeocoder {
        fn new(entries: &[(&'static str, f64, f64)]) -> Self {
            Self {
                known: entries.iter().map(|(k, lon, lat)| (*k, GeoPoint::new(*lon, *lat).unwrap())).collect(),
                district: None,
                fail_with_network: false,
            }
        }
    }

    impl Geocoder for FakeGeocoder {
        fn geocode(&self, address: &str) -> Result<GeoPoint, LocationError> {
            if self.fail_with_network {
                return Err(LocationError::Network("connection refused".into()));
            }
            self.known
                .get(address)
                .copied()
                .ok_or_else(|| LocationError::NotFound(address.to_string()))
        }

        fn district(&self, _point: GeoPoint) -> Result<Option<District>, LocationError> {
            Ok(self.district.clone())
        }
    }

    struct FakeSearch {
        results: Vec<NamedPoint>,
        seen: RefCell<Vec<(GeoPoint, String)>>,
    }

    impl PlaceSearch for FakeSearch {
        fn search(&self, reference: GeoPoint, query: &str) -> Result<Vec<NamedPoint>, LocationError> {
            self.seen.borrow_mut().push((reference, query.to_string()));
            Ok(self.results.clone())
        }

        fn source(&self) -> LocationSource {
            LocationSource::YandexSearch
        }
    }

    fn north_of(origin: GeoPoint, meters: f64, name: &str) -> NamedPoint {
        NamedPoint::new(name, GeoPoint::new(origin.lon(), origin.lat() + meters / METERS_PER_DEGREE).unwrap())
    }

    #[test]
    fn test_distance_between() {
        let geocoder = FakeGeocoder::new(&[("home", 37.6173, 55.7558), ("university", 30.3350, 59.9343)]);
        let report = distance_between(&geocoder, "home", " university ").unwrap();
        assert_eq!(report.to.query, "university");
        assert_relative_eq!(report.distance_m, 632_612.91, max_relative = 1e-6);
    }

    #[test]
    fn test_distance_between_unknown_address() {
        let geocoder = FakeGeocoder::new(&[("home", 37.6, 55.7)]);
        let err = distance_between(&geocoder, "home", "nowhere").unwrap_err();
        assert!(matches!(err, TaskError::Location(LocationError::NotFound(ref q)) if q == "nowhere"));
    }

    #[test]
    fn test_empty_address_rejected() {
        let geocoder = FakeGeocoder::new(&[]);
        assert!(matches!(distance_between(&geocoder, "  ", "x"), Err(TaskError::Input(_))));
    }

    #[test]
    fn test_split_city_list() {
        assert_eq!(split_city_list("Moscow, Kazan , ,Sochi"), vec!["Moscow", "Kazan", "Sochi"]);
        assert!(split_city_list(" , ").is_empty());
    }

    #[test]
    fn test_southernmost_city() {
        let geocoder = FakeGeocoder::new(&[
            ("Moscow", 37.6173, 55.7558),
            ("Saint Petersburg", 30.3350, 59.9343),
            ("Vladivostok", 131.8735, 43.1056),
        ]);
        let cities = split_city_list("Moscow, Atlantis, Saint Petersburg, Vladivostok");
        let report = southernmost_city(&geocoder, &cities).unwrap();
        assert_eq!(report.southernmost.name, "Vladivostok");
        assert_eq!(report.resolved.len(), 3);
        assert_eq!(report.unresolved, vec!["Atlantis"]);
    }

    #[test]
    fn test_southernmost_offline_builtin() {
        let cities = split_city_list("Moscow, Sochi, Kaliningrad");
        let report = southernmost_city(&BuiltinGeocoder, &cities).unwrap();
        assert_eq!(report.southernmost.name, "Sochi");
    }

    #[test]
    fn test_southernmost_none_resolved() {
        let geocoder = FakeGeocoder::new(&[]);
        let err = southernmost_city(&geocoder, &["Atlantis".to_string()]).unwrap_err();
        assert!(matches!(err, TaskError::Geo(GeoError::EmptyCandidateSet)));
        assert!(matches!(southernmost_city(&geocoder, &[]), Err(TaskError::Input(_))));
    }

    #[test]
    fn test_southernmost_network_error_propagates() {
        let mut geocoder = FakeGeocoder::new(&[("Moscow", 37.6, 55.7)]);
        geocoder.fail_with_network = true;
        let err = southernmost_city(&geocoder, &["Moscow".to_string()]).unwrap_err();
        assert!(matches!(err, TaskError::Location(LocationError::Network(_))));
    }

    #[test]
    fn test_nearest_place() {
        let geocoder = FakeGeocoder::new(&[("Arbat 1", 37.6, 55.75)]);
        let origin = GeoPoint::new(37.6, 55.75).unwrap();
        let search = FakeSearch {
            results: vec![
                north_of(origin, 50.0, "Apteka A").with_address("Arbat 3"),
                north_of(origin, 200.0, "Apteka B"),
                north_of(origin, 10.0, "Apteka C").with_address("Arbat 1a"),
            ],
            seen: RefCell::new(Vec::new()),
        };
        let report = nearest_place(&geocoder, &search, "Arbat 1", "аптека").unwrap();
        assert_eq!(report.place.name, "Apteka C");
        assert_eq!(report.place.address.as_deref(), Some("Arbat 1a"));
        assert_relative_eq!(report.distance_m, 10.0, max_relative = 1e-6);
        assert_eq!(report.candidates, 3);
        assert_eq!(report.source, LocationSource::YandexSearch);
        assert_eq!(search.seen.borrow().as_slice(), &[(origin, "аптека".to_string())]);
    }

    #[test]
    fn test_nearest_place_nothing_found() {
        let geocoder = FakeGeocoder::new(&[("Arbat 1", 37.6, 55.75)]);
        let search = FakeSearch { results: vec![], seen: RefCell::new(Vec::new()) };
        let err = nearest_place(&geocoder, &search, "Arbat 1", "аптека").unwrap_err();
        assert!(matches!(err, TaskError::Geo(GeoError::EmptyCandidateSet)));
    }

    #[test]
    fn test_nearest_place_map() {
        let geocoder = FakeGeocoder::new(&[("Arbat 1", 37.6, 55.75)]);
        let origin = GeoPoint::new(37.6, 55.75).unwrap();
        let search = FakeSearch { results: vec![north_of(origin, 100.0, "A")], seen: RefCell::new(Vec::new()) };
        let report = nearest_place(&geocoder, &search, "Arbat 1", "pharmacy").unwrap();
        let url = nearest_place_map(&report, "ru_RU").url("k").unwrap();
        let q: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(q["ll"], "37.6,55.75");
        assert_eq!(q["z"], "15");
        assert!(q["pt"].starts_with("37.6,55.75,pm2rdm~37.6,"));
        assert!(q["pt"].ends_with(",pm2gnm"));
    }

    #[test]
    fn test_find_district() {
        let mut geocoder = FakeGeocoder::new(&[("Tverskaya 7", 37.61, 55.76)]);
        geocoder.district = Some(District { name: "Tverskoy".into(), description: Some("Moscow".into()) });
        let report = find_district(&geocoder, "Tverskaya 7").unwrap();
        assert_eq!(report.district.unwrap().name, "Tverskoy");
        assert_eq!(report.location.point, GeoPoint::new(37.61, 55.76).unwrap());
    }

    #[test]
    fn test_path_report() {
        let route = crate::location::builtin::moscow_route();
        let report = path_report(&route).unwrap();
        assert_eq!(report.legs_m.len(), 3);
        assert_relative_eq!(report.total_m, report.legs_m.iter().sum::<f64>(), max_relative = 1e-12);
        assert_relative_eq!(report.total_m, 9_739.446, max_relative = 1e-6);
        assert_eq!(report.middle, route[2]);
        assert!(matches!(path_report(&[]), Err(TaskError::Input(_))));
    }

    #[test]
    fn test_path_map() {
        let route = crate::location::builtin::moscow_route();
        let report = path_report(&route).unwrap();
        let q: HashMap<String, String> = path_map(&report, "ru_RU").url("k").unwrap().query_pairs().into_owned().collect();
        assert_eq!(q["z"], "13");
        assert_eq!(q["pt"], "37.545517,55.747012,pm2rdm");
        assert!(q["pl"].starts_with("37.617635,55.752121,37.630510,55.743749"));
    }

    #[test]
    fn test_markers_map() {
        let stadiums = crate::location::builtin::moscow_stadiums();
        let q: HashMap<String, String> = markers_map(&stadiums, "ru_RU").url("k").unwrap().query_pairs().into_owned().collect();
        assert_eq!(q["z"], "11");
        assert_eq!(q["pt"].matches("pm2rdm").count(), 3);
    }

    #[test]
    fn test_snapshot_zoom() {
        assert_eq!(snapshot_zoom(None), 16);
        assert_eq!(snapshot_zoom(Some(5)), 5);
        assert_eq!(snapshot_zoom(Some(0)), 16);
        assert_eq!(snapshot_zoom(Some(17)), 17);
        assert_eq!(snapshot_zoom(Some(18)), 16);
        assert_eq!(snapshot_zoom(Some(300)), 16);
        assert_eq!(snapshot_zoom(Some(-3)), 16);
        assert_eq!(snapshot_zoom(Some(i64::MAX)), 16);
    }

    #[test]
    fn test_snapshot_filename() {
        let point = GeoPoint::new(37.6173, 55.7558).unwrap();
        assert_eq!(snapshot_filename(point), "snapshot_37.6173_55.7558.png");
    }
}
