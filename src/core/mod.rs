pub mod batch;
pub mod cache;
pub mod centroid;
pub mod etl;
pub mod fallback;
pub mod pipeline;
pub mod rate_limit;
pub mod resolver;
pub mod retry;

pub use crate::domain::model::{
    BatchReport, Coordinate, Country, Dataset, LookupKey, Record, Resolution, ResolutionTier,
    RowFailure, TransformResult,
};
pub use crate::domain::ports::{ConfigProvider, GeocodeProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
