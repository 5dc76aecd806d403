use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use domain_expiry::{config::Config, loader, report, ExpiryMonitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "domain_expiry=info".into()),
        )
        .init();

    // Load configuration
    let config = Arc::new(Config::load().context("Failed to load configuration")?);
    info!(
        "Configuration loaded: server {}:{}, registrar {:?}, {}s between queries",
        config.server, config.port, config.supported_registrar, config.base_delay_seconds
    );

    let domains = loader::load_domains(&config.domains_file).await?;
    if domains.is_empty() {
        warn!("No domains to check in {}", config.domains_file.display());
    }

    let template = match &config.template_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read template {}", path.display()))?,
        None => report::DEFAULT_TEMPLATE.to_string(),
    };

    let monitor = ExpiryMonitor::new_with_config(config.clone());

    // Stop between domains on Ctrl-C; the domain in flight still completes
    let cancel = monitor.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, finishing current domain...");
            cancel.cancel();
        }
    });

    let batch = monitor.check_with_summary(&domains).await;
    let mut records = batch.records;
    report::sort_by_days_left(&mut records);

    let generated_at = Utc::now();
    let html = report::render(&template, &records, generated_at)?;
    report::write_report(&config.output_file, &html).await?;

    if let Some(path) = &config.json_output_file {
        let json = report::render_json(&records, generated_at)?;
        report::write_report(path, &json).await?;
    }

    info!(
        "Done: {} of {} domains reported ({} failed, {} skipped)",
        batch.summary.succeeded, batch.summary.total, batch.summary.failed, batch.summary.skipped
    );

    Ok(())
}
