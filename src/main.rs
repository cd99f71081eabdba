use clap::Parser;
use postcode_geocoder::core::ConfigProvider;
use postcode_geocoder::utils::error::ErrorSeverity;
use postcode_geocoder::utils::{logger, validation::Validate};
use postcode_geocoder::{CliConfig, EtlEngine, GeocodePipeline, LocalStorage, NominatimProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose, config.log_file.as_deref())?;
    }

    tracing::info!("🚀 Starting postcode-geocoder");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let provider = NominatimProvider::new(
        config.provider_endpoint(),
        config.user_agent(),
        config.request_timeout(),
    )?;
    let storage = LocalStorage::new(".");
    let pipeline = GeocodePipeline::new(storage, config, provider).await;
    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(summary) => {
            println!("✅ Geocoding completed!");
            println!("📁 Output saved to: {}", summary.output_path);
            if !summary.report.unresolved_rows.is_empty() {
                println!("\nFailed rows: {:?}", summary.report.unresolved_rows);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Geocoding run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
