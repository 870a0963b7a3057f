//! Location subsystem: geocoding, place search and the built-in dataset.
//!
//! Network collaborators sit behind the [`Geocoder`] and [`PlaceSearch`]
//! traits so the tasks can be driven by any implementation.

pub mod builtin;
pub mod providers;
pub mod types;

pub use builtin::BuiltinGeocoder;
pub use providers::{OverpassSearch, YandexGeocoder, YandexSearch, DEFAULT_OVERPASS_RADIUS_M, UNNAMED_PLACE};
pub use types::{District, Geocoder, LocationError, LocationSource, PlaceSearch};
