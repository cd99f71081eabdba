use clap::Parser;
use postcode_geocoder::core::fallback::nearby;
use postcode_geocoder::core::{ConfigProvider, Country, Pipeline};
use postcode_geocoder::utils::error::ErrorSeverity;
use postcode_geocoder::utils::{logger, validation::Validate};
use postcode_geocoder::{EtlEngine, GeocodePipeline, LocalStorage, NominatimProvider, TomlConfig};
use std::collections::BTreeMap;

#[derive(Parser)]
#[command(name = "toml-geocode")]
#[command(about = "Postcode geocoding driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "geocoder.toml")]
    config: String,

    /// Enable verbose output (overrides [logging].verbose)
    #[arg(short, long)]
    verbose: bool,

    /// Override [batch].concurrent_requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Read the dataset and show what would be geocoded without calling the provider
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if config.json_logs() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose || config.verbose(), config.log_file())?;
    }
    tracing::info!("🚀 Starting TOML-based geocoder");
    tracing::info!("📁 Configuration loaded from: {}", args.config);

    if let Some(concurrency) = args.concurrency {
        config.batch.get_or_insert_with(Default::default).concurrent_requests = Some(concurrency);
        tracing::info!("🔧 Concurrency overridden to: {}", concurrency);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    let provider = NominatimProvider::new(
        config.provider_endpoint(),
        config.user_agent(),
        config.request_timeout(),
    )?;
    let columns = (
        config.postcode_column().to_string(),
        config.country_column().to_string(),
    );
    let storage = LocalStorage::new(".");
    let pipeline = GeocodePipeline::new(storage, config, provider).await;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the geocoding service will not be called");
        perform_dry_run(&pipeline, &columns.0, &columns.1).await?;
        return Ok(());
    }

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

fn display_config_summary(config: &TomlConfig, args: &Args) {
    let policy = config.retry_policy();
    println!("📋 Configuration Summary:");
    println!("  Input: {}", config.input_path());
    println!(
        "  Columns: postcode='{}', country='{}'",
        config.postcode_column(),
        config.country_column()
    );
    println!("  Provider: {}", config.provider_endpoint());
    println!("  Min interval: {:?}", config.min_interval());
    println!(
        "  Retries: {} attempts, backoff {:?}..{:?} (x{})",
        policy.max_attempts, policy.min_wait, policy.max_wait, policy.multiplier
    );
    println!("  Concurrent Requests: {}", config.concurrent_requests());
    println!("  Output: {}", config.output_path());
    if let Some(cache) = config.cache_path() {
        println!("  Cache: {}", cache);
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run<P: Pipeline>(
    pipeline: &P,
    postcode_column: &str,
    country_column: &str,
) -> anyhow::Result<()> {
    let dataset = pipeline.extract().await?;

    let mut per_country: BTreeMap<String, usize> = BTreeMap::new();
    let mut without_fallbacks = 0usize;
    for record in &dataset.records {
        let country = record.text(country_column).unwrap_or_default();
        let postcode = record.text(postcode_column).unwrap_or_default();
        let label = match Country::parse(&country) {
            Some(parsed) => parsed.to_string(),
            None => format!("{} (unsupported)", country),
        };
        *per_country.entry(label).or_default() += 1;
        if nearby(&postcode, &country).is_empty() {
            without_fallbacks += 1;
        }
    }

    println!("🔍 Dry Run Analysis:");
    println!("  Rows: {}", dataset.records.len());
    for (country, count) in &per_country {
        println!("  {}: {}", country, count);
    }
    println!("  Rows with no fallback candidates: {}", without_fallbacks);
    println!();
    println!("✅ Dry run analysis complete.");

    Ok(())
}
