use crate::core::{BatchReport, Pipeline};
use crate::utils::error::Result;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: String,
    pub report: BatchReport,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        tracing::info!("Starting geocoding run");

        tracing::info!("Extracting dataset...");
        let dataset = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} rows ({} columns)",
            dataset.records.len(),
            dataset.headers.len()
        );

        tracing::info!("Geocoding rows...");
        let transformed = self.pipeline.transform(dataset).await?;
        let report = transformed.report.clone();
        tracing::info!(
            "Resolved {}/{} rows ({} exact, {} fallback, {} centroid)",
            report.resolved_rows(),
            report.total_rows,
            report.exact_rows,
            report.fallback_rows.len(),
            report.centroid_rows.len()
        );

        tracing::info!("Writing results...");
        let output_path = self.pipeline.load(transformed).await?;
        tracing::info!("Output saved to: {} in {:?}", output_path, started.elapsed());

        Ok(RunSummary {
            output_path,
            report,
        })
    }
}
