use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod classify;
pub mod config;
pub mod error;
pub mod http_probe;
pub mod metadata;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod tls;

use classify::Classifier;
use config::{Config, load_config, setup_http_client, setup_tls_connector};
use http_probe::prelude::{LatencyProber, RetryPolicy};
use orchestrator::ProbeOrchestrator;
use registry::{CachedRegistry, EndOfLifeClient, VersionRegistry};
use tls::TlsValidator;

fn build_registry(config: &Config) -> Result<Arc<dyn VersionRegistry>, reqwest::Error> {
    let settings = &config.registry;
    let client = EndOfLifeClient::with_timeout(
        settings.base_url.as_str(),
        Duration::from_secs(settings.timeout_secs),
        &config.probe.user_agent,
    )?;

    let registry: Arc<dyn VersionRegistry> = if settings.cache {
        Arc::new(CachedRegistry::new(client))
    } else {
        Arc::new(client)
    };
    Ok(registry)
}

/// Cancels `cancel` on the first Ctrl-C so in-flight probes stop and the
/// results gathered so far are still written.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, finishing with the results gathered so far");
                cancel.cancel();
            }
            Err(e) => error!("Unable to listen for interrupt: {}", e),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;

    let targets = report::read_targets_file(&config.input.path, config.input.column)?;
    info!(
        "Read {} targets from {}",
        targets.len(),
        config.input.path.display()
    );

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let policy = RetryPolicy::new(
        config.probe.max_attempts,
        Duration::from_secs(config.probe.retry_delay_secs),
    );
    let prober = LatencyProber::new(setup_http_client(&config.probe)?, policy, cancel.clone());
    let validator = TlsValidator::new(
        setup_tls_connector()?,
        Duration::from_secs(config.probe.tls_timeout_secs),
        cancel.clone(),
    );
    let classifier = Classifier::new(build_registry(&config)?, cancel.clone())
        .with_aliases(config.registry.aliases.clone());

    let orchestrator =
        ProbeOrchestrator::new(Arc::new(prober), Arc::new(validator), classifier, cancel)
            .with_concurrency(config.probe.concurrency);

    let results = orchestrator.probe_all(&targets).await;

    let output = report::output_path(&config.output.directory, Local::now());
    report::write_results_file(&output, &results)?;
    info!(
        "Wrote {} of {} targets to {}",
        results.len(),
        targets.len(),
        output.display()
    );

    Ok(())
}
