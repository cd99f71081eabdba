pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::{LocalStorage, NominatimProvider};
pub use core::{
    batch::BatchDriver, etl::EtlEngine, pipeline::GeocodePipeline, resolver::ResolutionEngine,
};
pub use utils::error::{GeoError, Result};
