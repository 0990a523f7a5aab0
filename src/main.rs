use log::{error, info};
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use weather_compaction::config::CompactionConfig;
use weather_compaction::database::PgWeatherStore;
use weather_compaction::utils::{duration_to_seconds, format_datetime};
use weather_compaction::{CompactionPipeline, PassReport};

/// Connect, run a single compaction pass and drop the connection
async fn run_pass(config: &CompactionConfig) -> Result<PassReport, Box<dyn std::error::Error>> {
    let store = PgWeatherStore::connect(config).await?;

    if config.create_schema {
        store.ensure_schema().await?;
    }

    let report = CompactionPipeline::new(&store)
        .with_max_key_pages(config.max_key_pages)
        .run()
        .await?;

    Ok(report)
}

async fn main_loop(config: CompactionConfig, interval_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting weather compaction every {} seconds", interval_secs);

    loop {
        let start_time = OffsetDateTime::now_utc();
        info!("Starting compaction pass at: {}", format_datetime(&start_time));

        // A failed pass leaves unprocessed raw data in place; the next one retries it
        match run_pass(&config).await {
            Ok(report) => info!(
                "Pass finished: {} readings, {} summaries",
                report.readings, report.summaries
            ),
            Err(e) => error!("Compaction pass failed: {}", e),
        }

        // Wait until next pass should start
        let total_elapsed = duration_to_seconds(OffsetDateTime::now_utc() - start_time);
        if total_elapsed < interval_secs {
            let wait_time = interval_secs - total_elapsed;
            info!("Waiting {} seconds until next compaction pass", wait_time);
            sleep(Duration::from_secs(wait_time)).await;
        }
    }
}

async fn run(config: CompactionConfig) -> Result<(), Box<dyn std::error::Error>> {
    match config.interval_secs {
        Some(interval_secs) => main_loop(config, interval_secs).await,
        None => {
            let report = run_pass(&config).await?;
            info!(
                "Compaction finished: {} readings, {} summaries",
                report.readings, report.summaries
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match CompactionConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Keep the sender alive so the select below never sees a shutdown
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    // Run compaction or wait for shutdown signal
    tokio::select! {
        result = run(config) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => {
                    error!("Fatal error: {}", e);
                    return Err(e);
                }
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
