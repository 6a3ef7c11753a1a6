//! menderd — the Mender operator daemon.
//!
//! Watches `HealingPolicy` objects and, for each one, retries failed
//! pipeline runs within a budget and scales, restarts, or alerts on the
//! paired deployment when its metrics breach the policy thresholds.
//!
//! # Usage
//!
//! ```text
//! menderd run --config /etc/mender/config.toml --port 9090
//! menderd crd | kubectl apply -f -
//! ```

mod http;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mender_actuate::LogNotifier;
use mender_core::{ActionModel, OperatorConfig, RetryMode};
use mender_kube::{
    EventNotifier, KubeDeployments, KubePipelineRuns, KubePolicyStore, pipeline_run_resource,
    run_controller,
};
use mender_metrics::{HttpMetricsSource, OperatorMetrics};
use mender_reconcile::{Ports, Reconciler};
use mender_state::{HealingPolicy, Notifier};

const DEFAULT_FILTER: &str = "info,menderd=debug,mender=debug";

#[derive(Parser)]
#[command(name = "menderd", about = "Mender self-healing operator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the operator until interrupted.
    Run(RunArgs),
    /// Print the HealingPolicy CRD manifest as YAML.
    Crd,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port for /metrics and /healthz.
    #[arg(long, default_value = "9090")]
    port: u16,

    /// Only watch policies in this namespace.
    #[arg(long)]
    namespace: Option<String>,

    #[arg(long)]
    max_retries: Option<u32>,

    /// once-per-run | per-cycle
    #[arg(long)]
    retry_mode: Option<RetryMode>,

    /// independent | single
    #[arg(long)]
    action_model: Option<ActionModel>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Report alerts only in the log instead of as Kubernetes events.
    #[arg(long)]
    no_events: bool,
}

impl RunArgs {
    /// File configuration (or defaults) with command-line overrides applied.
    fn operator_config(&self) -> anyhow::Result<OperatorConfig> {
        let mut config = match &self.config {
            Some(path) => OperatorConfig::from_file(path)?,
            None => OperatorConfig::default(),
        };
        if let Some(max) = self.max_retries {
            config.max_retries = max;
        }
        if let Some(mode) = self.retry_mode {
            config.retry_mode = mode;
        }
        if let Some(model) = self.action_model {
            config.action_model = model;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Where alerts go: `Warning` events on the policy, or only the log.
fn notifier(args: &RunArgs, client: &kube::Client) -> Arc<dyn Notifier> {
    if args.no_events {
        Arc::new(LogNotifier)
    } else {
        Arc::new(EventNotifier::new(
            client.clone(),
            std::env::var("POD_NAME").ok(),
        ))
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            init_tracing(args.json_logs);
            run(args).await
        }
        Command::Crd => {
            print!("{}", serde_yaml::to_string(&HealingPolicy::crd())?);
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = args.operator_config()?;
    info!(
        max_retries = config.max_retries,
        retry_mode = ?config.retry_mode,
        action_model = ?config.action_model,
        "Mender operator starting"
    );

    let client = kube::Client::try_default()
        .await
        .context("failed to build kubernetes client")?;

    // ── Ports ────────────────────────────────────────────────────

    let metrics = Arc::new(OperatorMetrics::new());
    let ports = Ports {
        policies: Arc::new(KubePolicyStore::new(client.clone())),
        runs: Arc::new(KubePipelineRuns::new(client.clone(), pipeline_run_resource())),
        deployments: Arc::new(KubeDeployments::new(client.clone())),
        metrics_source: Arc::new(HttpMetricsSource::from_config(&config.metrics)?),
        notifier: notifier(&args, &client),
    };
    let reconciler = Arc::new(Reconciler::new(ports, config, metrics.clone()));

    // ── Controller ───────────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller = tokio::spawn(run_controller(
        client,
        args.namespace.clone(),
        reconciler,
        shutdown_rx,
    ));

    // ── HTTP server ──────────────────────────────────────────────

    let router = http::build_router(metrics);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!(%addr, "metrics server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = controller.await;
    info!("Mender operator stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> RunArgs {
        match Cli::try_parse_from(args).unwrap().command {
            Command::Run(args) => args,
            Command::Crd => panic!("expected run"),
        }
    }

    #[test]
    fn run_defaults() {
        let args = parse(&["menderd", "run"]);
        assert_eq!(args.port, 9090);
        assert!(args.namespace.is_none());
        assert!(!args.no_events);
        assert_eq!(args.operator_config().unwrap(), OperatorConfig::default());
    }

    #[test]
    fn flags_override_config() {
        let args = parse(&[
            "menderd",
            "run",
            "--max-retries",
            "2",
            "--retry-mode",
            "per-cycle",
            "--action-model",
            "single",
            "--namespace",
            "ops",
        ]);
        let config = args.operator_config().unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_mode, RetryMode::PerCycle);
        assert_eq!(config.action_model, ActionModel::Single);
        assert_eq!(config.requeue_after, Duration::from_secs(30));
        assert_eq!(args.namespace.as_deref(), Some("ops"));
    }

    #[test]
    fn no_events_flag() {
        assert!(parse(&["menderd", "run", "--no-events"]).no_events);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["menderd", "run", "--retry-mode", "always"]).is_err());
    }

    #[test]
    fn missing_config_file_fails() {
        let args = RunArgs {
            config: Some(PathBuf::from("/nonexistent/mender.toml")),
            ..Default::default()
        };
        assert!(args.operator_config().is_err());
    }

    #[test]
    fn crd_manifest_names_the_group() {
        let yaml = serde_yaml::to_string(&HealingPolicy::crd()).unwrap();
        assert!(yaml.contains("healingpolicies.demo.kcd2025"));
        assert!(yaml.contains("v1alpha1"));
    }
}
