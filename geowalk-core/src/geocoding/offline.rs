use super::{Geocoder, LookupCallback};
use crate::coord::{format_location, Coordinate};
use crate::engine::EngineHandle;
use crate::error::LookupError;
use crate::search::{Address, GeoPoint, Place, SearchOptions};

/// Resolves coordinates to their own "47.05N_6.98E" label without any network
pub struct OfflineGeocoder {
    handle: EngineHandle,
}

impl OfflineGeocoder {
    pub fn new(handle: EngineHandle) -> Self {
        Self { handle }
    }
}

impl Geocoder for OfflineGeocoder {
    fn reverse_lookup(
        &self,
        coordinate: Coordinate,
        _options: &SearchOptions,
        on_complete: LookupCallback,
    ) {
        if let Err(e) = self.handle.ensure_ready() {
            on_complete(Err(LookupError::Engine(e)));
            return;
        }

        let place = Place {
            address: Address {
                address_text: format_location(&coordinate),
                ..Default::default()
            },
            geo_point: Some(GeoPoint {
                coordinate,
                altitude: None,
            }),
        };
        on_complete(Ok(vec![place]));
    }

    fn name(&self) -> &str {
        "offline"
    }
}
