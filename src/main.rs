use clap::Parser;
use kaspi_tracker::adapters::report::export_report;
use kaspi_tracker::utils::validation::{validate_file_extension, Validate};
use kaspi_tracker::utils::logger;
use kaspi_tracker::{
    CliConfig, Command, FileSnapshotSource, MarketplaceClient, SqliteProductStore, SyncEngine,
    TrackerConfig, TrackerError,
};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting kaspi-tracker");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    if let Err(e) = execute(&cli.command, config).await {
        exit_with(e);
    }
    Ok(())
}

fn load_config(cli: &CliConfig) -> kaspi_tracker::Result<TrackerConfig> {
    let mut config = TrackerConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.database {
        config.database.url = url.clone();
    }
    config.validate()?;
    if matches!(cli.command, Command::Sync | Command::Download { .. }) {
        config.validate_credentials()?;
    }
    Ok(config)
}

async fn execute(command: &Command, config: TrackerConfig) -> kaspi_tracker::Result<()> {
    match command {
        Command::Sync => {
            let mut client = MarketplaceClient::new(config.marketplace.clone())?;
            if let Some(path) = config.download_path() {
                client = client.with_save_path(path);
            }
            let store = SqliteProductStore::connect(&config.database.url).await?;
            let report = SyncEngine::new(client, store).run().await?;
            println!("✅ {}", report.summary());
        }
        Command::Import { file } => {
            validate_file_extension("import", file, &["xlsx"])?;
            let store = SqliteProductStore::connect(&config.database.url).await?;
            let report = SyncEngine::new(FileSnapshotSource::new(file), store).run().await?;
            println!("✅ {}", report.summary());
        }
        Command::Download { output } => {
            let path = output
                .as_deref()
                .or(config.download_path())
                .ok_or_else(|| TrackerError::MissingConfigError {
                    field: "storage.download_path".to_string(),
                })?
                .to_string();
            let client = MarketplaceClient::new(config.marketplace.clone())?.with_save_path(&path);
            let bytes = client.download_export().await?;
            println!("📁 Saved {} bytes to {}", bytes.len(), path);
        }
        Command::Report { output, .. } => {
            let output_dir = output.as_deref().unwrap_or(&config.storage.report_dir);
            let store = SqliteProductStore::connect(&config.database.url).await?;
            let path = export_report(
                &store,
                &command.product_filter(),
                Path::new(output_dir),
                chrono::Utc::now(),
            )
            .await?;
            println!("📁 Report saved to: {}", path.display());
        }
    }
    Ok(())
}

fn exit_with(e: TrackerError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    std::process::exit(e.exit_code())
}
