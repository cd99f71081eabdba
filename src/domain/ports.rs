use crate::domain::model::{Coordinate, Dataset, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// External geocoding service.
///
/// `Ok(None)` means the provider answered and found nothing. `Err` means the
/// call itself failed (network, timeout, 5xx, unreadable payload) and may be
/// worth retrying.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<Coordinate>>;
}

pub trait ConfigProvider: Send + Sync {
    fn provider_endpoint(&self) -> &str;
    fn user_agent(&self) -> &str;
    fn min_interval(&self) -> Duration;
    fn request_timeout(&self) -> Duration;
    fn retry_policy(&self) -> crate::core::retry::RetryPolicy;
    fn concurrent_requests(&self) -> usize;

    fn input_path(&self) -> &str;
    fn postcode_column(&self) -> &str;
    fn country_column(&self) -> &str;

    fn output_path(&self) -> &str;
    fn output_filename(&self) -> &str;
    fn report_filename(&self) -> &str;
    fn compress_output(&self) -> bool;

    fn cache_path(&self) -> Option<&str>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Dataset>;
    async fn transform(&self, data: Dataset) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
