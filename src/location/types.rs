//! Core types for the location subsystem.

use crate::geo::{GeoError, GeoPoint, NamedPoint};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which search provider produced a candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationSource {
    YandexSearch,
    Overpass,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YandexSearch => write!(f, "Yandex Search"),
            Self::Overpass => write!(f, "OpenStreetMap"),
        }
    }
}

/// An administrative district found by reverse geocoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct District {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Address → coordinates, plus reverse lookup of the enclosing district.
pub trait Geocoder {
    fn geocode(&self, address: &str) -> Result<GeoPoint, LocationError>;

    fn district(&self, point: GeoPoint) -> Result<Option<District>, LocationError>;
}

/// Reference point + text query → nearby candidates, possibly none.
pub trait PlaceSearch {
    fn search(&self, reference: GeoPoint, query: &str) -> Result<Vec<NamedPoint>, LocationError>;

    fn source(&self) -> LocationSource;
}

/// Location collaborator errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Location not found: '{0}'")]
    NotFound(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Geo(#[from] GeoError),
}

impl From<ureq::Error> for LocationError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, response) => Self::Status {
                code,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => Self::Network(t.to_string()),
        }
    }
}
