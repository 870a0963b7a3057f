//! Built-in offline dataset: Russian cities, Moscow stadiums and a sample
//! walking route. Lookup is case-insensitive with aliases and fuzzy matching.

use super::types::{District, Geocoder, LocationError};
use crate::geo::{GeoPoint, NamedPoint};

struct BuiltinCity {
    display: &'static str,
    names: &'static [&'static str], // lowercase aliases
    point: GeoPoint,
}

const BUILTIN_CITIES: &[BuiltinCity] = &[
    BuiltinCity {
        display: "Moscow",
        names: &["moscow", "moskva", "москва"],
        point: GeoPoint::new_unchecked(37.6173, 55.7558),
    },
    BuiltinCity {
        display: "Saint Petersburg",
        names: &["saint petersburg", "st petersburg", "petersburg", "санкт-петербург", "питер"],
        point: GeoPoint::new_unchecked(30.3350, 59.9343),
    },
    BuiltinCity {
        display: "Kazan",
        names: &["kazan", "казань"],
        point: GeoPoint::new_unchecked(49.1233, 55.7887),
    },
    BuiltinCity {
        display: "Nizhny Novgorod",
        names: &["nizhny novgorod", "нижний новгород"],
        point: GeoPoint::new_unchecked(44.0021, 56.3269),
    },
    BuiltinCity {
        display: "Yekaterinburg",
        names: &["yekaterinburg", "ekaterinburg", "екатеринбург"],
        point: GeoPoint::new_unchecked(60.6122, 56.8519),
    },
    BuiltinCity {
        display: "Novosibirsk",
        names: &["novosibirsk", "новосибирск"],
        point: GeoPoint::new_unchecked(82.9346, 55.0084),
    },
    BuiltinCity {
        display: "Vladivostok",
        names: &["vladivostok", "владивосток"],
        point: GeoPoint::new_unchecked(131.8735, 43.1056),
    },
    BuiltinCity {
        display: "Sochi",
        names: &["sochi", "сочи"],
        point: GeoPoint::new_unchecked(39.7303, 43.6028),
    },
    BuiltinCity {
        display: "Kaliningrad",
        names: &["kaliningrad", "калининград"],
        point: GeoPoint::new_unchecked(20.5070, 54.7065),
    },
    BuiltinCity {
        display: "Krasnoyarsk",
        names: &["krasnoyarsk", "красноярск"],
        point: GeoPoint::new_unchecked(92.8672, 56.0090),
    },
];

const MOSCOW_STADIUMS: &[(&str, GeoPoint)] = &[
    ("Luzhniki", GeoPoint::new_unchecked(37.554191, 55.715551)),
    ("Spartak", GeoPoint::new_unchecked(37.440262, 55.818015)),
    ("Dynamo", GeoPoint::new_unchecked(37.559809, 55.791540)),
];

const MOSCOW_ROUTE: &[GeoPoint] = &[
    GeoPoint::new_unchecked(37.617635, 55.752121), // Red Square
    GeoPoint::new_unchecked(37.630510, 55.743749), // Zaryadye Park
    GeoPoint::new_unchecked(37.545517, 55.747012), // Moscow City
    GeoPoint::new_unchecked(37.595512, 55.741283), // Gorky Park
];

/// Compute edit distance between two strings (Levenshtein).
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let n = b.len();

    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for j in 1..=n {
            let cost = usize::from(*ca != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

fn normalize(query: &str) -> String {
    query.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_named(city: &BuiltinCity) -> NamedPoint {
    NamedPoint::new(city.display, city.point)
}

/// Exact (alias-aware, case-insensitive) match only.
pub fn exact_lookup(query: &str) -> Option<NamedPoint> {
    let q = normalize(query);
    BUILTIN_CITIES
        .iter()
        .find(|city| city.names.iter().any(|name| *name == q))
        .map(to_named)
}

/// Exact match, then the closest alias within edit distance 2.
pub fn lookup(query: &str) -> Option<NamedPoint> {
    if let Some(found) = exact_lookup(query) {
        return Some(found);
    }

    let q = normalize(query);
    let mut best: Option<(&BuiltinCity, usize)> = None;
    for city in BUILTIN_CITIES {
        for name in city.names {
            let dist = edit_distance(&q, name);
            let better = match best {
                Some((_, best_dist)) => dist < best_dist,
                None => true,
            };
            if dist <= 2 && better {
                best = Some((city, dist));
            }
        }
    }
    best.map(|(city, _)| to_named(city))
}

/// All built-in cities in table order.
pub fn cities() -> Vec<NamedPoint> {
    BUILTIN_CITIES.iter().map(to_named).collect()
}

pub fn moscow_stadiums() -> Vec<NamedPoint> {
    MOSCOW_STADIUMS.iter().map(|(name, point)| NamedPoint::new(*name, *point)).collect()
}

/// Red Square → Zaryadye → Moscow City → Gorky Park.
pub fn moscow_route() -> Vec<GeoPoint> {
    MOSCOW_ROUTE.to_vec()
}

/// Offline geocoder over the built-in city table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinGeocoder;

impl Geocoder for BuiltinGeocoder {
    fn geocode(&self, address: &str) -> Result<GeoPoint, LocationError> {
        lookup(address)
            .map(|city| city.point)
            .ok_or_else(|| LocationError::NotFound(address.to_string()))
    }

    fn district(&self, _point: GeoPoint) -> Result<Option<District>, LocationError> {
        Ok(None)
    }
}
