use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static::lazy_static! {
    // "47.0517, 6.9769", "47.0517 6.9769", "47.0517;6.9769"
    static ref COORDINATE_PAIR: regex::Regex = regex::Regex::new(
        r"^\s*([+-]?\d+(?:\.\d+)?)\s*[,; ]\s*([+-]?\d+(?:\.\d+)?)\s*$"
    )
    .expect("coordinate pattern is valid");
}

/// Errors raised while building or parsing coordinates
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("coordinate components must be finite numbers")]
    NotFinite,
    #[error("cannot parse coordinate from \"{0}\"")]
    Malformed(String),
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<CoordinateError>,
    },
}

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(c: Coordinate) -> Self {
        Self {
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

impl Coordinate {
    /// Build a coordinate, rejecting values outside the WGS84 ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoordinateError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Compile-time constructor for known-good literals
    const fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Parses "lat,lon", "lat lon" or "lat;lon"
    pub fn parse(input: &str) -> Result<Self, CoordinateError> {
        let caps = COORDINATE_PAIR
            .captures(input)
            .ok_or_else(|| CoordinateError::Malformed(input.trim().to_string()))?;

        let lat: f64 = caps[1]
            .parse()
            .map_err(|_| CoordinateError::Malformed(input.trim().to_string()))?;
        let lon: f64 = caps[2]
            .parse()
            .map_err(|_| CoordinateError::Malformed(input.trim().to_string()))?;

        Self::new(lat, lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.10}, {:.10}", self.latitude, self.longitude)
    }
}

/// The built-in route walked when no coordinate list is configured
pub const DEFAULT_ROUTE: [Coordinate; 11] = [
    Coordinate::from_degrees(47.0517107724, 6.9769611437),
    Coordinate::from_degrees(47.0518965562, 6.9770253497),
    Coordinate::from_degrees(47.0520204176, 6.9770695249),
    Coordinate::from_degrees(47.0520964606, 6.9771058860),
    Coordinate::from_degrees(47.0522570784, 6.9772032121),
    Coordinate::from_degrees(47.0492166675, 6.9719076559),
    Coordinate::from_degrees(47.0217685943, 6.9223475258),
    Coordinate::from_degrees(47.0091005782, 6.9201392406),
    Coordinate::from_degrees(47.0040310719, 6.9248685302),
    Coordinate::from_degrees(46.9992430310, 6.9316281074),
    Coordinate::from_degrees(46.9929703142, 6.9294318683),
];

/// Parses one coordinate per line. Blank lines and `#` comments are skipped.
pub fn parse_coordinate_list(text: &str) -> Result<Vec<Coordinate>, CoordinateError> {
    let mut points = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let content = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        if content.trim().is_empty() {
            continue;
        }

        let point = Coordinate::parse(content).map_err(|e| CoordinateError::AtLine {
            line: i + 1,
            source: Box::new(e),
        })?;
        points.push(point);
    }

    Ok(points)
}

/// Formats a coordinate as a short label
/// Example: "47.05N_6.98E"
pub fn format_location(coordinate: &Coordinate) -> String {
    let lat_dir = if coordinate.latitude >= 0.0 { "N" } else { "S" };
    let lon_dir = if coordinate.longitude >= 0.0 { "E" } else { "W" };

    format!(
        "{:.2}{}_{:.2}{}",
        coordinate.latitude.abs(),
        lat_dir,
        coordinate.longitude.abs(),
        lon_dir
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_ranges() {
        assert!(Coordinate::new(47.05, 6.97).is_ok());
        assert_eq!(
            Coordinate::new(91.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            Coordinate::new(0.0, -180.5),
            Err(CoordinateError::LongitudeOutOfRange(-180.5))
        );
        assert_eq!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoordinateError::NotFinite)
        );
    }

    #[test]
    fn test_parse_separators() {
        let expected = Coordinate::new(47.0517107724, 6.9769611437).unwrap();
        assert_eq!(Coordinate::parse("47.0517107724, 6.9769611437").unwrap(), expected);
        assert_eq!(Coordinate::parse("47.0517107724 6.9769611437").unwrap(), expected);
        assert_eq!(Coordinate::parse(" 47.0517107724;6.9769611437 ").unwrap(), expected);
        assert_eq!(
            Coordinate::parse("-33.86,151.2").unwrap(),
            Coordinate::new(-33.86, 151.2).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Coordinate::parse("north of here"),
            Err(CoordinateError::Malformed(_))
        ));
        assert!(matches!(
            Coordinate::parse("120.0, 5.0"),
            Err(CoordinateError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_parse_coordinate_list() {
        let text = "# route\n47.05, 6.97\n\n46.99, 6.93 # last stop\n";
        let points = parse_coordinate_list(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1], Coordinate::new(46.99, 6.93).unwrap());
    }

    #[test]
    fn test_parse_coordinate_list_reports_line() {
        let text = "47.05, 6.97\nnot a point\n";
        match parse_coordinate_list(text) {
            Err(CoordinateError::AtLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_format_location() {
        let c = Coordinate::new(37.7749, -122.4194).unwrap();
        assert_eq!(format_location(&c), "37.77N_122.42W");
        assert_eq!(format_location(&DEFAULT_ROUTE[0]), "47.05N_6.98E");
    }

    #[test]
    fn test_default_route_is_valid() {
        assert_eq!(DEFAULT_ROUTE.len(), 11);
        for c in DEFAULT_ROUTE {
            assert!(Coordinate::new(c.latitude(), c.longitude()).is_ok());
        }
    }

    #[test]
    fn test_serde_rejects_out_of_range() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap();
        assert_eq!(ok, Coordinate::new(1.0, 2.0).unwrap());

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude": 100.0, "longitude": 2.0}"#);
        assert!(bad.is_err());
    }
}
