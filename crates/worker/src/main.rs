use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mjrelay_events::{Notifier, NotificationBus, WebhookDelivery};
use mjrelay_midjourney::{JobPoller, JobRunner, MjApi, PassthroughTranslator};
use mjrelay_store::JobRecordStore;
use mjrelay_worker::command::Cli;
use mjrelay_worker::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let request = Cli::parse().into_request();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mjrelay_worker=debug,mjrelay_midjourney=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        record_dir = %config.record_dir.display(),
        mj_api_url = %config.mj_api_url,
        "Worker starting"
    );

    let store = JobRecordStore::open(config.record_dir.clone())
        .context("Failed to open job record directory")?;

    // --- Delivery ---
    let mut log_task = None;
    let notifier: Arc<dyn Notifier> = match &config.delivery_webhook_url {
        Some(url) => {
            tracing::info!(%url, "Delivering notifications by webhook");
            Arc::new(WebhookDelivery::new(url.clone()).context("Failed to build webhook client")?)
        }
        None => {
            let bus = Arc::new(NotificationBus::default());
            let mut rx = bus.subscribe();
            log_task = Some(tokio::spawn(async move {
                while let Ok(n) = rx.recv().await {
                    tracing::info!(kind = %n.kind, job_id = ?n.job_id, "{}", n.text);
                }
            }));
            bus
        }
    };

    let runner = JobRunner::new(
        MjApi::new(config.mj_api_url.clone()),
        JobPoller::new(store, config.poll.clone()),
        Arc::clone(&notifier),
        Arc::new(PassthroughTranslator),
    );

    // --- Cancellation on Ctrl-C ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT (Ctrl-C), cancelling job");
            signal_cancel.cancel();
        }
    });

    let outcome = runner.run(request, &cancel).await;

    // Closing the bus lets the log task drain and exit.
    drop(runner);
    drop(notifier);
    if let Some(handle) = log_task {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(2), handle).await;
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
