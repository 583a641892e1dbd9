use super::{Geocoder, LookupCallback};
use crate::coord::Coordinate;
use crate::engine::EngineHandle;
use crate::error::{InitializationError, LookupError};
use crate::search::{Address, GeoPoint, Place, SearchOptions};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Settings for a Nominatim-compatible reverse endpoint
#[derive(Debug, Clone)]
pub struct NominatimOptions {
    /// Base URL, e.g. "https://nominatim.openstreetmap.org"
    pub endpoint: String,
    /// Send the credentials' secret as `api_key` (hosted providers such as geocode.maps.co)
    pub send_api_key: bool,
    pub cache_ttl: Duration,
    /// Minimum spacing between two requests (Nominatim allows 1 per second)
    pub min_interval: Duration,
}

impl Default for NominatimOptions {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            send_api_key: false,
            cache_ttl: Duration::from_secs(3600),
            min_interval: Duration::from_secs(1),
        }
    }
}

/// Cache for lookup results with request pacing
struct GeocodeCache {
    entries: HashMap<String, CachedPlaces>,
    last_request: Option<Instant>,
    ttl: Duration,
}

struct CachedPlaces {
    places: Vec<Place>,
    cached_at: Instant,
}

impl GeocodeCache {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            last_request: None,
            ttl,
        }
    }

    fn key(coordinate: &Coordinate, options: &SearchOptions) -> String {
        format!(
            "{:.4},{:.4}|{}",
            coordinate.latitude(),
            coordinate.longitude(),
            options.language
        )
    }

    /// Cached places, or None if not cached/expired
    fn get(&self, key: &str) -> Option<Vec<Place>> {
        self.entries.get(key).and_then(|cached| {
            if cached.cached_at.elapsed() < self.ttl {
                Some(cached.places.clone())
            } else {
                None
            }
        })
    }

    fn set(&mut self, key: String, places: Vec<Place>) {
        let ttl = self.ttl;
        self.entries.retain(|_, cached| cached.cached_at.elapsed() < ttl);
        self.entries.insert(
            key,
            CachedPlaces {
                places,
                cached_at: Instant::now(),
            },
        );
    }

    /// Time to wait before the next request may go out, and claim that slot
    fn reserve_slot(&mut self, min_interval: Duration) -> Duration {
        let now = Instant::now();
        let wait = self
            .last_request
            .map(|last| min_interval.saturating_sub(now.duration_since(last)))
            .unwrap_or(Duration::ZERO);
        self.last_request = Some(now + wait);
        wait
    }
}

/// Reverse geocoder backed by a Nominatim-compatible HTTP API
pub struct NominatimGeocoder {
    handle: EngineHandle,
    base: reqwest::Url,
    options: NominatimOptions,
    cache: Arc<Mutex<GeocodeCache>>,
}

impl NominatimGeocoder {
    pub fn new(handle: EngineHandle, options: NominatimOptions) -> Result<Self, InitializationError> {
        let base = reqwest::Url::parse(&options.endpoint).map_err(|e| {
            InitializationError::Geocoder(format!("invalid endpoint {}: {}", options.endpoint, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(InitializationError::Geocoder(format!(
                "endpoint {} cannot be used as a base URL",
                options.endpoint
            )));
        }

        Ok(Self {
            handle,
            base,
            cache: Arc::new(Mutex::new(GeocodeCache::new(options.cache_ttl))),
            options,
        })
    }

    fn request_url(&self, coordinate: &Coordinate, options: &SearchOptions) -> Result<reqwest::Url, LookupError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| LookupError::Transport("endpoint cannot be a base URL".to_string()))?;
            segments.pop_if_empty().push("reverse");
        }

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("lat", &coordinate.latitude().to_string())
                .append_pair("lon", &coordinate.longitude().to_string())
                .append_pair("format", "jsonv2")
                .append_pair("addressdetails", "1")
                .append_pair("accept-language", options.language.tag());

            if self.options.send_api_key {
                let credentials = self.handle.credentials()?;
                query.append_pair("api_key", &credentials.access_key_secret);
            }
        }

        Ok(url)
    }
}

impl Geocoder for NominatimGeocoder {
    fn reverse_lookup(
        &self,
        coordinate: Coordinate,
        options: &SearchOptions,
        on_complete: LookupCallback,
    ) {
        let client = match self.handle.http_client() {
            Ok(client) => client,
            Err(e) => {
                on_complete(Err(LookupError::Engine(e)));
                return;
            }
        };

        let key = GeocodeCache::key(&coordinate, options);
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(mut places) = cache.get(&key) {
                log::debug!("Geocode cache hit for {}", key);
                places.truncate(options.max_items);
                on_complete(Ok(places));
                return;
            }
        }

        let url = match self.request_url(&coordinate, options) {
            Ok(url) => url,
            Err(e) => {
                on_complete(Err(e));
                return;
            }
        };

        let cache = Arc::clone(&self.cache);
        let min_interval = self.options.min_interval;
        let max_items = options.max_items;

        std::thread::spawn(move || {
            let wait = cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .reserve_slot(min_interval);
            if !wait.is_zero() {
                log::debug!("Pacing geocoding request by {:?}", wait);
                std::thread::sleep(wait);
            }

            log::debug!("Reverse geocoding {} via {}", coordinate, url.host_str().unwrap_or("?"));
            let outcome = fetch(&client, url, max_items);

            if let Ok(places) = &outcome {
                cache
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .set(key, places.clone());
            }
            on_complete(outcome);
        });
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}

fn fetch(
    client: &reqwest::blocking::Client,
    url: reqwest::Url,
    max_items: usize,
) -> Result<Vec<Place>, LookupError> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| LookupError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(LookupError::Status(response.status().as_u16()));
    }

    let body = response
        .text()
        .map_err(|e| LookupError::Transport(e.to_string()))?;

    parse_reverse_response(&body, max_items)
}

/// Nominatim `/reverse` response (jsonv2)
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
    address: Option<AddressDetails>,
}

#[derive(Debug, Deserialize)]
struct AddressDetails {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    suburb: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

fn parse_reverse_response(body: &str, max_items: usize) -> Result<Vec<Place>, LookupError> {
    let data: ReverseResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;

    if let Some(error) = data.error {
        log::debug!("Geocoding API reported: {}", error);
        return Err(LookupError::NoResults);
    }

    let address_text = match data.display_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(LookupError::NoResults),
    };

    let mut address = Address {
        address_text,
        ..Default::default()
    };
    if let Some(details) = data.address {
        address.road = match (details.road, details.house_number) {
            (Some(road), Some(number)) => Some(format!("{} {}", road, number)),
            (road, _) => road,
        };
        address.city = details
            .city
            .or(details.town)
            .or(details.village)
            .or(details.hamlet)
            .or(details.suburb);
        address.postcode = details.postcode;
        address.country = details.country;
        address.country_code = details.country_code;
    }

    let geo_point = match (data.lat, data.lon) {
        (Some(lat), Some(lon)) => match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Coordinate::new(lat, lon).ok().map(|coordinate| GeoPoint {
                coordinate,
                // Nominatim does not report elevation
                altitude: None,
            }),
            _ => None,
        },
        _ => None,
    };

    let mut places = vec![Place { address, geo_point }];
    places.truncate(max_items.max(1));
    Ok(places)
}
