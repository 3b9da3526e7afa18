use anyhow::Context;
use clap::Parser;
use market_export::core::ConfigProvider;
use market_export::domain::model::ExportOutcome;
use market_export::utils::error::ErrorSeverity;
use market_export::utils::logger;
use market_export::{
    CliConfig, ConsoleNotifier, ExportEngine, ExportJob, HttpRecordSource, LocalStorage,
    TomlConfig,
};

const TOKEN_ENV_VAR: &str = "MARKET_EXPORT_TOKEN";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting market-export CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if cli.token.is_none() {
        cli.token = std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
    }

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if cli.list_presets {
        if config.exports.is_empty() {
            println!("No presets defined");
        }
        for preset in &config.exports {
            let format = preset
                .format
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<24} {:<6} {}", preset.name, format, preset.resource);
        }
        return Ok(());
    }

    let job = match cli.build_job(&config) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("❌ Invalid export job: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    print_summary(&config, &job);
    if cli.dry_run {
        println!("🔍 Dry run, nothing fetched");
        return Ok(());
    }

    let source = HttpRecordSource::from_config(&config).context("failed to build HTTP client")?;
    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = ExportEngine::new(source, storage, ConsoleNotifier);

    match engine.run_export(&job).await {
        Ok(ExportOutcome::Saved {
            file_name,
            bytes,
            records,
            ..
        }) => {
            tracing::info!(
                "📁 {} records written to {}/{} ({} bytes)",
                records,
                config.output_path(),
                file_name,
                bytes
            );
        }
        Ok(ExportOutcome::NoRecords) => {}
        Err(e) => {
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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

fn print_summary(config: &TomlConfig, job: &ExportJob) {
    println!("📋 Export");
    println!("  Source:   {}{}", config.api_base_url(), job.resource_path);
    println!("  Format:   {}", job.format);
    println!("  Output:   {}/{}", config.output_path(), job.file_name());
    println!(
        "  Paging:   {:?} (pageSize={})",
        config.page_strategy(),
        config.page_size()
    );
    if let Some(title) = &job.title {
        println!("  Title:    {}", title);
    }
}
