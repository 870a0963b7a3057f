//! Extremum scans over candidate points.
//!
//! All selections are a single left-to-right pass keeping the running
//! minimum. The running best is replaced only on a strictly smaller key, so
//! the earliest candidate wins ties.

use crate::geo::{self, GeoError, GeoPoint, NamedPoint};
use serde::Serialize;

/// Return the candidate with the smallest key, or `None` for an empty slice.
///
/// A NaN key is reported as [`GeoError::InvalidCandidate`] instead of being
/// silently skipped.
pub fn select_extremum<F>(candidates: &[NamedPoint], mut key_fn: F) -> Result<Option<&NamedPoint>, GeoError>
where
    F: FnMut(&NamedPoint) -> f64,
{
    Ok(scan(candidates, &mut key_fn)?.map(|(c, _)| c))
}

fn scan<'a, F>(candidates: &'a [NamedPoint], key_fn: &mut F) -> Result<Option<(&'a NamedPoint, f64)>, GeoError>
where
    F: FnMut(&NamedPoint) -> f64,
{
    let mut best: Option<(&NamedPoint, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let key = key_fn(candidate);
        if key.is_nan() {
            return Err(GeoError::InvalidCandidate {
                index,
                reason: format!("key for '{}' is not a number", candidate.name),
            });
        }
        match best {
            Some((_, best_key)) if key >= best_key => {}
            _ => best = Some((candidate, key)),
        }
    }
    Ok(best)
}

/// The nearest candidate together with its distance from the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Nearest<'a> {
    pub candidate: &'a NamedPoint,
    pub distance_m: f64,
}

/// Nearest candidate to `reference` by [`geo::distance`].
pub fn nearest(reference: GeoPoint, candidates: &[NamedPoint]) -> Result<Option<Nearest<'_>>, GeoError> {
    let best = scan(candidates, &mut |c: &NamedPoint| geo::distance(reference, c.point))?;
    Ok(best.map(|(candidate, distance_m)| Nearest { candidate, distance_m }))
}

/// Candidate with the minimum latitude.
pub fn southernmost(candidates: &[NamedPoint]) -> Result<Option<&NamedPoint>, GeoError> {
    select_extremum(candidates, |c| c.point.lat())
}
