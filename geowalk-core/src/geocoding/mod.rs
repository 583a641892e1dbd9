pub mod nominatim;
pub mod offline;

pub use nominatim::NominatimGeocoder;
pub use offline::OfflineGeocoder;

use crate::coord::Coordinate;
use crate::error::LookupError;
use crate::search::{Place, SearchOptions};

/// Called exactly once with the outcome of a lookup, possibly from another thread
pub type LookupCallback = Box<dyn FnOnce(Result<Vec<Place>, LookupError>) + Send + 'static>;

/// A reverse geocoding provider.
///
/// `reverse_lookup` must return without waiting for the network; the outcome
/// is delivered through `on_complete`. A successful outcome is never an empty
/// list.
pub trait Geocoder {
    fn reverse_lookup(
        &self,
        coordinate: Coordinate,
        options: &SearchOptions,
        on_complete: LookupCallback,
    );

    /// Short name for logs and the status bar
    fn name(&self) -> &str;
}
