use clap::{Parser, Subcommand};
use geotasks::config::Config;
use geotasks::game::Game;
use geotasks::geo::{GeoError, GeoPoint, NamedPoint};
use geotasks::location::{
    builtin, BuiltinGeocoder, OverpassSearch, PlaceSearch, YandexGeocoder, YandexSearch,
    DEFAULT_OVERPASS_RADIUS_M,
};
use geotasks::staticmap::{save_image, MapLayer, StaticMap};
use geotasks::tasks::{self, TaskError};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// geotasks: small geographic tasks on top of Yandex Maps.
///
/// Human-readable results go to stderr, a JSON report to stdout.
///
/// Examples:
///   geotasks distance "Tverskaya 1, Moscow" "Leninskie Gory 1, Moscow"
///   geotasks southernmost "Moscow, Kazan, Sochi"
///   geotasks pharmacy "Arbat 10, Moscow" --provider osm
///   geotasks district Tverskaya 7 Moscow
///   geotasks path --point 37.6176,55.7521 --point 37.6305,55.7437
///   geotasks snapshot --lon 37.6173 --lat 55.7558 --zoom 14
#[derive(Parser)]
#[command(name = "geotasks", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Straight-line distance between two addresses.
    Distance {
        /// Home address (prompted if omitted).
        home: Option<String>,
        /// University address (prompted if omitted).
        university: Option<String>,
    },

    /// Southernmost of several cities.
    Southernmost {
        /// City names; commas separate cities within one argument.
        cities: Vec<String>,

        /// Resolve cities from the built-in dataset only.
        #[arg(long)]
        offline: bool,
    },

    /// Nearest pharmacy (or other place) to an address.
    Pharmacy {
        /// Address to search around (prompted if omitted).
        address: Option<String>,

        /// Search provider: "yandex" (organization search) or "osm" (Overpass).
        #[arg(long, default_value = "yandex", value_parser = parse_provider)]
        provider: SearchProvider,

        /// Search text (yandex) or amenity tag (osm).
        #[arg(long)]
        query: Option<String>,

        /// Overpass search radius in meters.
        #[arg(long, default_value_t = DEFAULT_OVERPASS_RADIUS_M)]
        radius: u32,
    },

    /// Administrative district of an address.
    District {
        /// Address words (prompted if omitted).
        address: Vec<String>,
    },

    /// Length of a path, rendered as a polyline.
    Path {
        /// Waypoint as lon,lat; repeat in order. Defaults to a Moscow walk.
        #[arg(long = "point", allow_hyphen_values = true, value_parser = parse_point)]
        points: Vec<GeoPoint>,

        #[arg(long, default_value = "path_visualization.png")]
        out: PathBuf,

        /// Only compute the length.
        #[arg(long)]
        no_image: bool,
    },

    /// Map with named markers.
    Markers {
        /// Marker as name=lon,lat; repeat. Defaults to Moscow stadiums.
        #[arg(long = "point", allow_hyphen_values = true, value_parser = parse_named_point)]
        points: Vec<NamedPoint>,

        #[arg(long, default_value = "moscow_stadiums.png")]
        out: PathBuf,
    },

    /// Map image centred on a coordinate.
    Snapshot {
        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Zoom level 1-17. Out-of-range values fall back to 16.
        #[arg(long, short = 'z', allow_hyphen_values = true)]
        zoom: Option<i64>,

        /// Layer: "map", "sat" or "hybrid".
        #[arg(long, default_value = "map", value_parser = parse_layer)]
        layer: MapLayer,

        /// Output file. Defaults to snapshot_<lon>_<lat>.png.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Guess the city from a map fragment.
    Guess,
}

#[derive(Clone, Copy)]
enum SearchProvider {
    Yandex,
    Osm,
}

fn parse_provider(s: &str) -> Result<SearchProvider, String> {
    match s.to_lowercase().as_str() {
        "yandex" => Ok(SearchProvider::Yandex),
        "osm" | "overpass" => Ok(SearchProvider::Osm),
        _ => Err(format!("Unknown provider '{}'. Use 'yandex' or 'osm'.", s)),
    }
}

fn parse_layer(s: &str) -> Result<MapLayer, String> {
    match s.to_lowercase().as_str() {
        "map" => Ok(MapLayer::Map),
        "sat" | "satellite" => Ok(MapLayer::Satellite),
        "hybrid" | "skl" => Ok(MapLayer::Hybrid),
        _ => Err(format!("Unknown layer '{}'. Use 'map', 'sat' or 'hybrid'.", s)),
    }
}

fn parse_point(s: &str) -> Result<GeoPoint, String> {
    GeoPoint::parse_lon_lat(s).map_err(|e| e.to_string())
}

fn parse_named_point(s: &str) -> Result<NamedPoint, String> {
    let (name, coords) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected name=lon,lat, got '{}'", s))?;
    Ok(NamedPoint::new(name.trim(), parse_point(coords)?))
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load();

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run(command: Command, config: &Config) -> Result<(), TaskError> {
    match command {
        Command::Distance { home, university } => {
            let home = arg_or_prompt(home, "Home address: ")?;
            let university = arg_or_prompt(university, "University address: ")?;
            let geocoder = YandexGeocoder::new(config.require_geocode_key()?, config);

            let report = tasks::distance_between(&geocoder, &home, &university)?;
            eprintln!("  \u{1F4CD} {} \u{2192} {}", report.from.point, report.to.point);
            eprintln!("  Distance from home to university: {:.2} m", report.distance_m);
            print_json(&report)
        }

        Command::Southernmost { cities, offline } => {
            let joined = if cities.is_empty() {
                prompt("City names separated by commas (e.g. Moscow, Saint Petersburg, Novosibirsk): ")?
            } else {
                cities.join(",")
            };
            let cities = tasks::split_city_list(&joined);

            let result = if offline {
                tasks::southernmost_city(&BuiltinGeocoder, &cities)
            } else {
                let geocoder = YandexGeocoder::new(config.require_geocode_key()?, config);
                tasks::southernmost_city(&geocoder, &cities)
            };
            let report = match result {
                Err(TaskError::Geo(GeoError::EmptyCandidateSet)) => {
                    return Err(TaskError::Input("Could not find coordinates for any of the entered cities".into()));
                }
                other => other?,
            };

            for city in &report.resolved {
                eprintln!("  Found coordinates for {}: {}", city.name, city.point);
            }
            for city in &report.unresolved {
                eprintln!("  City not found: {}", city);
            }
            eprintln!("\n  The southernmost city is: {}", report.southernmost.name);
            print_json(&report)
        }

        Command::Pharmacy { address, provider, query, radius } => {
            let address = arg_or_prompt(address, "Your address: ")?;
            let geocoder = YandexGeocoder::new(config.require_geocode_key()?, config);

            let search: Box<dyn PlaceSearch> = match provider {
                SearchProvider::Yandex => Box::new(YandexSearch::new(config.require_search_key()?, config)),
                SearchProvider::Osm => Box::new(OverpassSearch::new(config, radius)),
            };
            let default_query = match provider {
                SearchProvider::Yandex => "аптека",
                SearchProvider::Osm => "pharmacy",
            };
            let query = query.unwrap_or_else(|| default_query.to_string());

            let report = match tasks::nearest_place(&geocoder, search.as_ref(), &address, &query) {
                Err(TaskError::Geo(GeoError::EmptyCandidateSet)) => {
                    let message = if query == default_query {
                        "No pharmacies found nearby".to_string()
                    } else {
                        format!("No '{}' found nearby", query)
                    };
                    return Err(TaskError::Input(message));
                }
                other => other?,
            };

            eprintln!("  Address coordinates: {}", report.origin.point);
            eprintln!("\n  Nearest ({}):", report.source);
            eprintln!("  Name: {}", report.place.name);
            eprintln!("  Address: {}", report.place.address.as_deref().unwrap_or("Address not specified"));
            eprintln!("  Distance: {:.0} m", report.distance_m);

            match config.require_static_key() {
                Ok(key) => {
                    let url = tasks::nearest_place_map(&report, &config.lang)
                        .url(key)
                        .map_err(|e| TaskError::Input(e.to_string()))?;
                    eprintln!("\n  Map: {}", url);
                }
                Err(e) => log::info!("Skipping map link: {}", e),
            }
            print_json(&report)
        }

        Command::District { address } => {
            let address = if address.is_empty() {
                prompt("Address: ")?
            } else {
                address.join(" ")
            };
            let geocoder = YandexGeocoder::new(config.require_geocode_key()?, config);

            eprintln!("  Looking up the district for: {}", address.trim());
            let report = tasks::find_district(&geocoder, &address)?;
            eprintln!("  Coordinates: {}", report.location.point);
            match &report.district {
                Some(d) => {
                    eprintln!("\n  District: {}", d.name);
                    if let Some(desc) = &d.description {
                        eprintln!("  Description: {}", desc);
                    }
                }
                None => eprintln!("  Could not determine the district"),
            }
            print_json(&report)
        }

        Command::Path { points, out, no_image } => {
            let points = if points.is_empty() { builtin::moscow_route() } else { points };
            let report = tasks::path_report(&points)?;
            eprintln!("  Total path length: {:.2} km", report.total_m / 1000.0);

            if !no_image {
                let key = config.require_static_key()?;
                render(&tasks::path_map(&report, &config.lang), key, config, &out)?;
            }
            print_json(&report)
        }

        Command::Markers { points, out } => {
            let points = if points.is_empty() { builtin::moscow_stadiums() } else { points };
            let key = config.require_static_key()?;
            render(&tasks::markers_map(&points, &config.lang), key, config, &out)?;
            print_json(&points)
        }

        Command::Snapshot { lon, lat, zoom, layer, out } => {
            let point = GeoPoint::new(lon, lat)?;
            let zoom = tasks::snapshot_zoom(zoom);
            let key = config.require_static_key()?;
            let out = out.unwrap_or_else(|| PathBuf::from(tasks::snapshot_filename(point)));

            let map = tasks::snapshot_map(point, zoom, &config.lang).layer(layer);
            render(&map, key, config, &out)?;
            print_json(&point)
        }

        Command::Guess => {
            let key = config.require_static_key()?.to_string();
            let mut game = Game::new(rand::thread_rng());
            let stdin = io::stdin();
            let score = game.play(stdin.lock(), io::stderr(), |round| {
                let path = PathBuf::from(&round.image_name);
                let bytes = round.map(&config.lang).fetch(&key, config)?;
                save_image(&bytes, &path)?;
                Ok(path)
            })?;
            print_json(&score)
        }
    }
}

fn render(map: &StaticMap, key: &str, config: &Config, out: &Path) -> Result<(), TaskError> {
    let bytes = map.fetch(key, config)?;
    save_image(&bytes, out)?;
    eprintln!("  Map saved as {}", out.display());
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TaskError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg_or_prompt(arg: Option<String>, label: &str) -> Result<String, TaskError> {
    match arg {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

fn prompt(label: &str) -> Result<String, TaskError> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        return Err(TaskError::Input("No input given".into()));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_point() {
        let p = parse_named_point("Luzhniki=37.554191,55.715551").unwrap();
        assert_eq!(p.name, "Luzhniki");
        assert_eq!(p.point, GeoPoint::new(37.554191, 55.715551).unwrap());
        assert!(parse_named_point("37.5,55.7").is_err());
        assert!(parse_named_point("x=200,0").is_err());
    }

    #[test]
    fn test_parse_provider_and_layer() {
        assert!(matches!(parse_provider("OSM"), Ok(SearchProvider::Osm)));
        assert!(parse_provider("google").is_err());
        assert_eq!(parse_layer("sat").unwrap(), MapLayer::Satellite);
        assert!(parse_layer("terrain").is_err());
    }

    #[test]
    fn test_cli_parses_negative_points() {
        let cli = Cli::try_parse_from(["geotasks", "path", "--point", "-70.6,-33.4", "--point", "-70.5,-33.5", "--no-image"]).unwrap();
        match cli.command {
            Command::Path { points, no_image, .. } => {
                assert_eq!(points.len(), 2);
                assert!(no_image);
            }
            _ => panic!("expected path"),
        }
    }

    #[test]
    fn test_cli_snapshot_zoom_out_of_range_falls_back() {
        for (raw, expected) in [("300", 16), ("-3", 16), ("0", 16), ("12", 12)] {
            let cli = Cli::try_parse_from(["geotasks", "snapshot", "--lon", "37.6", "--lat", "55.7", "--zoom", raw]).unwrap();
            match cli.command {
                Command::Snapshot { zoom, .. } => assert_eq!(tasks::snapshot_zoom(zoom), expected, "zoom {}", raw),
                _ => panic!("expected snapshot"),
            }
        }
    }
}
