// Adapters layer: concrete implementations for external systems (geocoding service, filesystem).

pub mod nominatim;
pub mod storage;

pub use nominatim::NominatimProvider;
pub use storage::LocalStorage;
