//! Planar distance metric over (longitude, latitude) points.
//!
//! Uses a local flat-Earth approximation: one degree is 111 km, and degrees
//! of longitude shrink by the cosine of the mean latitude. Accurate to well
//! under 1% at city scale, degrading to several percent across a continent.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Meters in one degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Errors raised by the distance and selection core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Invalid coordinate: lon={lon}, lat={lat} (lon -180..180, lat -90..90)")]
    InvalidCoordinate { lon: f64, lat: f64 },

    #[error("Invalid candidate #{index}: {reason}")]
    InvalidCandidate { index: usize, reason: String },

    #[error("No candidates to choose from")]
    EmptyCandidateSet,
}

/// A point on the globe, longitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct GeoPoint {
    lon: f64,
    lat: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    lon: f64,
    lat: f64,
}

impl TryFrom<RawPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lon, raw.lat)
    }
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range components.
    pub fn new(lon: f64, lat: f64) -> Result<Self, GeoError> {
        let valid = lon.is_finite()
            && lat.is_finite()
            && (-180.0..=180.0).contains(&lon)
            && (-90.0..=90.0).contains(&lat);
        if !valid {
            return Err(GeoError::InvalidCoordinate { lon, lat });
        }
        Ok(Self { lon, lat })
    }

    /// For compile-time tables whose values are known to be in range.
    pub(crate) const fn new_unchecked(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Parse `"lon,lat"` (the order used on map URLs).
    pub fn parse_lon_lat(s: &str) -> Result<Self, GeoError> {
        Self::parse_pair(s, ',')
    }

    /// Parse `"lon lat"`, the geocoder's `Point.pos` format.
    pub fn parse_pos(s: &str) -> Result<Self, GeoError> {
        Self::parse_pair(s, ' ')
    }

    fn parse_pair(s: &str, sep: char) -> Result<Self, GeoError> {
        let mut parts = s.trim().split(sep).filter(|p| !p.trim().is_empty());
        let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(GeoError::InvalidCoordinate { lon: f64::NAN, lat: f64::NAN });
        };
        let lon: f64 = lon.trim().parse().unwrap_or(f64::NAN);
        let lat: f64 = lat.trim().parse().unwrap_or(f64::NAN);
        Self::new(lon, lat)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lon, self.lat)
    }
}

/// A point with something to call it by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPoint {
    pub name: String,
    pub point: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl NamedPoint {
    pub fn new(name: impl Into<String>, point: GeoPoint) -> Self {
        Self { name: name.into(), point, address: None }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Build a candidate from loosely-typed provider fields.
    ///
    /// A missing coordinate is an error, never a zero.
    pub fn from_raw(
        index: usize,
        name: impl Into<String>,
        lon: Option<f64>,
        lat: Option<f64>,
    ) -> Result<Self, GeoError> {
        let (lon, lat) = match (lon, lat) {
            (Some(lon), Some(lat)) => (lon, lat),
            _ => {
                return Err(GeoError::InvalidCandidate {
                    index,
                    reason: "missing coordinate".into(),
                })
            }
        };
        let point = GeoPoint::new(lon, lat).map_err(|e| GeoError::InvalidCandidate {
            index,
            reason: e.to_string(),
        })?;
        Ok(Self::new(name, point))
    }
}

/// Approximate straight-line distance in meters.
///
/// Symmetric: only absolute differences and the mean latitude are used.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let mean_lat_rad = ((a.lat + b.lat) / 2.0).to_radians();
    let lat_factor = mean_lat_rad.cos();

    let dx = (a.lon - b.lon).abs() * METERS_PER_DEGREE * lat_factor;
    let dy = (a.lat - b.lat).abs() * METERS_PER_DEGREE;

    (dx * dx + dy * dy).sqrt()
}

/// Total length of a path, summed leg by leg.
pub fn path_length(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// The waypoint at index `len / 2`.
pub fn middle_point(points: &[GeoPoint]) -> Option<GeoPoint> {
    points.get(points.len() / 2).copied()
}
