pub mod geocoding;

pub use geocoding::{GeocodingClient, PlaceSuggestion};
