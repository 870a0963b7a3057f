//! Geographic helper tasks over a flat-Earth distance metric.
//!
//! The core is [`geo::distance`] and the extremum scans in [`selector`];
//! everything else wires geocoding, place search and static maps around it.

pub mod config;
pub mod game;
pub mod geo;
pub mod location;
pub mod selector;
pub mod staticmap;
pub mod tasks;

pub use config::Config;
pub use geo::{distance, GeoError, GeoPoint, NamedPoint};
pub use selector::{nearest, select_extremum, southernmost};
