//! Turn a city name into something the weather service can be asked about

use crate::{
    config::Config,
    http::{redact, Transport},
};
use anyhow::{anyhow, bail, Context};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use std::{
    fmt::{self, Display, Formatter},
    sync::{Arc, OnceLock},
};

/// Where a city is. The two variants are *different coordinate systems*, but
/// the weather request treats both as a grid index (see [Self::grid_pair]).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Coordinate {
    /// A cell on the weather service's forecast grid
    Grid { nx: i32, ny: i32 },
    /// Longitude/latitude from the geocoder, rounded to whole degrees
    LatLng { lng: i32, lat: i32 },
}

impl Coordinate {
    /// The `(nx, ny)` pair to put in a weather request. For geocoded cities
    /// this is (longitude, latitude), which is *not* a grid cell.
    pub fn grid_pair(self) -> (i32, i32) {
        match self {
            Self::Grid { nx, ny } => (nx, ny),
            Self::LatLng { lng, lat } => (lng, lat),
        }
    }

    pub fn is_grid(self) -> bool {
        matches!(self, Self::Grid { .. })
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid { nx, ny } => write!(f, "grid ({nx}, {ny})"),
            Self::LatLng { lng, lat } => write!(f, "lng/lat ({lng}, {lat})"),
        }
    }
}

/// Forecast grid cells for major Korean cities. Lookup is exact, no case
/// folding or trimming.
pub fn city_table() -> &'static IndexMap<&'static str, Coordinate> {
    static TABLE: OnceLock<IndexMap<&'static str, Coordinate>> =
        OnceLock::new();
    TABLE.get_or_init(|| {
        [
            ("서울", 60, 127),
            ("대전", 67, 100),
            ("부산", 98, 76),
            ("대구", 89, 90),
            ("인천", 55, 124),
            ("광주", 58, 74),
            ("울산", 102, 84),
            ("수원", 60, 121),
        ]
        .into_iter()
        .map(|(name, nx, ny)| (name, Coordinate::Grid { nx, ny }))
        .collect()
    })
}

/// Resolves city names, first from [city_table], then from the geocoding API
pub struct CityResolver {
    transport: Arc<dyn Transport>,
    geocode_url: String,
    api_key: Option<String>,
}

impl CityResolver {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            geocode_url: config.geocode_url.clone(),
            api_key: config.google_api_key.clone(),
        }
    }

    /// Get the coordinate for a city. `Ok(None)` means the city doesn't
    /// exist as far as the geocoder is concerned. Errors are network or
    /// protocol failures.
    pub fn resolve(&self, city: &str) -> anyhow::Result<Option<Coordinate>> {
        if let Some(coordinate) = city_table().get(city) {
            debug!("Found {city} in city table: {coordinate}");
            return Ok(Some(*coordinate));
        }
        self.geocode(city)
    }

    fn geocode(&self, city: &str) -> anyhow::Result<Option<Coordinate>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow!("{city} is not a built-in city and no geocoding key is set")
        })?;
        let url = format!(
            "{}?address={}&key={}",
            self.geocode_url,
            urlencoding::encode(city),
            urlencoding::encode(api_key),
        );

        info!("Geocoding {city}");
        let body = self.transport.get(&url)?;
        let response: GeocodeResponse =
            serde_json::from_str(&body).with_context(|| {
                format!("Error parsing geocode response from {}", redact(&url))
            })?;
        response.into_coordinate()
    }
}

/// https://developers.google.com/maps/documentation/geocoding/requests-geocoding#GeocodingResponses
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    /// Missing status is treated as OK
    status: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn into_coordinate(self) -> anyhow::Result<Option<Coordinate>> {
        match self.status.as_deref() {
            None | Some("OK" | "ZERO_RESULTS") => {}
            Some(status) => bail!(
                "Geocoding failed with status {status}: {}",
                self.error_message.as_deref().unwrap_or("no message")
            ),
        }

        // Only the first result counts, even if it has no location
        let location = self
            .results
            .into_iter()
            .next()
            .and_then(|result| result.geometry)
            .and_then(|geometry| geometry.location);
        Ok(location.map(|location| Coordinate::LatLng {
            lng: location.lng.round() as i32,
            lat: location.lat.round() as i32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;

    const GEOCODE: &str = "https://maps.googleapis.com/maps/api/geocode/json";

    fn resolver(
        transport: &Arc<MockTransport>,
        key: Option<&str>,
    ) -> CityResolver {
        let config = Config {
            google_api_key: key.map(String::from),
            ..Config::default()
        };
        CityResolver::new(&config, Arc::clone(transport) as Arc<dyn Transport>)
    }

    #[test]
    fn test_table_hits_skip_network() {
        let transport = Arc::new(MockTransport::default());
        let resolver = resolver(&transport, None);
        for (&name, &coordinate) in city_table() {
            assert_eq!(resolver.resolve(name).unwrap(), Some(coordinate));
        }
        assert_eq!(
            resolver.resolve("서울").unwrap(),
            Some(Coordinate::Grid { nx: 60, ny: 127 })
        );
        assert_eq!(city_table().len(), 8);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_table_is_exact_match() {
        let transport = Arc::new(MockTransport::default().respond(
            GEOCODE,
            r#"{"results": [], "status": "ZERO_RESULTS"}"#,
        ));
        let resolver = resolver(&transport, Some("key"));
        assert_eq!(resolver.resolve(" 서울").unwrap(), None);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_geocode() {
        let transport = Arc::new(MockTransport::default().respond(
            GEOCODE,
            r#"{
                "results": [
                    {"geometry": {"location":
                        {"lat": 37.4563, "lng": 126.7052}}},
                    {"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
                ],
                "status": "OK"
            }"#,
        ));
        let resolver = resolver(&transport, Some("k y"));
        assert_eq!(
            resolver.resolve("Tokyo Station").unwrap(),
            Some(Coordinate::LatLng { lng: 127, lat: 37 })
        );
        assert_eq!(
            transport.requests(),
            vec![format!("{GEOCODE}?address=Tokyo%20Station&key=k%20y")]
        );
    }

    #[test]
    fn test_geocode_not_found() {
        let transport = Arc::new(MockTransport::default().respond(
            GEOCODE,
            r#"{"results": [], "status": "ZERO_RESULTS"}"#,
        ));
        let resolver = resolver(&transport, Some("key"));
        assert_eq!(resolver.resolve("Atlantis").unwrap(), None);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_geocode_no_location() {
        let transport = Arc::new(MockTransport::default().respond(
            GEOCODE,
            r#"{"results": [{"geometry": {}}], "status": "OK"}"#,
        ));
        let resolver = resolver(&transport, Some("key"));
        assert_eq!(resolver.resolve("Nowhere").unwrap(), None);
    }

    #[test]
    fn test_geocode_errors() {
        // Denied
        let transport = Arc::new(MockTransport::default().respond(
            GEOCODE,
            r#"{
                "results": [],
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            }"#,
        ));
        let err = resolver(&transport, Some("bad"))
            .resolve("Tokyo")
            .unwrap_err();
        assert!(err.to_string().contains("REQUEST_DENIED"), "{err}");

        // Network
        let transport = Arc::new(
            MockTransport::default().fail(GEOCODE, "connection reset"),
        );
        assert!(resolver(&transport, Some("key")).resolve("Tokyo").is_err());

        // Malformed
        let transport =
            Arc::new(MockTransport::default().respond(GEOCODE, "<html>"));
        assert!(resolver(&transport, Some("key")).resolve("Tokyo").is_err());

        // No key, no request
        let transport = Arc::new(MockTransport::default());
        assert!(resolver(&transport, None).resolve("Tokyo").is_err());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_grid_pair() {
        assert_eq!(Coordinate::Grid { nx: 60, ny: 127 }.grid_pair(), (60, 127));
        assert_eq!(
            Coordinate::LatLng { lng: 127, lat: 37 }.grid_pair(),
            (127, 37)
        );
        assert!(!Coordinate::LatLng { lng: 0, lat: 0 }.is_grid());
    }
}
