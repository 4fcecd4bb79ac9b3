//! Thin binary entrypoint: load configuration, initialize logging and
//! metrics, construct the configured backend, reconcile once at startup,
//! then run the event loop until a shutdown signal (spec.md §6 Signals).
//!
//! Mirrors bindy's `main.rs` shape (`initialize_logging()`,
//! `start_metrics_server()`, a manually-built multi-thread Tokio runtime)
//! generalized from "stop kube Controllers" to "drain the runtime event
//! stream, withdraw, exit".

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use ddns_sd_agent::backend::etag_cloud::EtagCloudBackend;
use ddns_sd_agent::backend::logonly::LogOnlyBackend;
use ddns_sd_agent::backend::route53::Route53Backend;
use ddns_sd_agent::backend::sql::SqlBackend;
use ddns_sd_agent::backend::Backend;
use ddns_sd_agent::config::{BackendConfig, Config};
use ddns_sd_agent::constants::{METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH};
use ddns_sd_agent::events::{EventProcessor, LogLevel};
use ddns_sd_agent::metrics;
use ddns_sd_agent::reconciler::Reconciler;
use ddns_sd_agent::runtime::{ContainerRuntime, RuntimeEvent};
use ddns_sd_agent::synth::{synthesize_container, SynthConfig};
use std::str::FromStr;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("ddns-sd-agent")
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

/// Respects `RUST_LOG` if set, otherwise falls back to `default_level`
/// (later replaced by the configured `LOG_LEVEL` once `Config` loads), and
/// `RUST_LOG_FORMAT` for json/text output. Returns a reload handle so
/// `USR1`/`USR2` can adjust verbosity without restarting the process.
fn initialize_logging(default_level: &str) -> reload::Handle<EnvFilter, Registry> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (filter_layer, handle) = reload::Layer::new(filter);
    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().compact())
            .init();
    }
    handle
}

/// Serves Prometheus metrics on `0.0.0.0:<port>/metrics`.
fn start_metrics_server(port: u16) -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port, path = METRICS_SERVER_PATH, "starting metrics server"
    );
    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(text) => text,
                Err(e) => {
                    error!("failed to gather metrics: {e}");
                    String::from("# error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };
        info!("metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");
        if let Err(e) = axum::serve(listener, app).await {
            error!("metrics server error: {e}");
        }
    })
}

async fn build_backend(cfg: &Config) -> Result<Box<dyn Backend>> {
    match &cfg.backend {
        BackendConfig::Route53 { hosted_zone_id } => {
            let aws_cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_route53::Client::new(&aws_cfg);
            Ok(Box::new(Route53Backend::new(
                client,
                hosted_zone_id.clone(),
                cfg.base_domain.clone(),
            )))
        }
        BackendConfig::Sql { database_url, table } => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .context("connecting to SQL backend")?;
            Ok(Box::new(SqlBackend::new(
                pool,
                table.clone(),
                cfg.base_domain.clone(),
            )))
        }
        BackendConfig::EtagCloud {
            base_url,
            api_token,
            zone_id,
        } => Ok(Box::new(EtagCloudBackend::new(
            base_url.clone(),
            api_token.clone(),
            zone_id.clone(),
            cfg.base_domain.clone(),
        ))),
        BackendConfig::LogOnly => Ok(Box::new(LogOnlyBackend::new())),
    }
}

/// No concrete container-runtime client is implemented (spec.md Non-goals:
/// interface-only collaborator) — this never emits events and never sees a
/// running container, so the agent degrades to "reconcile an empty desired
/// set and idle" until a real `ContainerRuntime` is wired in by the
/// deployment.
struct NoRuntime;

#[async_trait::async_trait]
impl ContainerRuntime for NoRuntime {
    async fn next_event(&self) -> Option<RuntimeEvent> {
        std::future::pending().await
    }

    async fn inspect(&self, _container_id: &str) -> Option<ddns_sd_agent::container::Container> {
        None
    }

    async fn list_running(&self) -> Vec<ddns_sd_agent::container::Container> {
        Vec::new()
    }
}

async fn async_main() -> Result<()> {
    let log_handle = initialize_logging("info");

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            // The only fatal path in the agent (spec.md §7 InvalidEnvironment).
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(e) = log_handle.reload(EnvFilter::new(cfg.log_level.clone())) {
        warn!(error = %e, "failed to apply configured log level");
    }

    info!(
        hostname = %cfg.hostname,
        base_domain = %cfg.base_domain,
        ipv6_only = cfg.ipv6_only,
        "starting DNS-SD agent"
    );

    metrics::record_start_timestamp(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0),
        env!("CARGO_PKG_VERSION"),
    );

    if cfg.enable_metrics {
        start_metrics_server(cfg.metrics_port);
    }

    let backend = build_backend(&cfg).await?;
    let container_runtime = NoRuntime;

    let synth_cfg = SynthConfig {
        host: &cfg.hostname,
        base_domain: &cfg.base_domain,
        ttl: cfg.record_ttl,
        host_ip_address: cfg.host_ip_address,
        ipv6_only: cfg.ipv6_only,
    };

    let running = container_runtime.list_running().await;
    let mut desired = Vec::new();
    let mut per_container = Vec::new();
    for container in &running {
        let services = ddns_sd_agent::labels::parse_labels(&container.labels, &container.name);
        let records = synthesize_container(container, &services, &synth_cfg);
        per_container.push((container.id.clone(), records.clone()));
        desired.extend(records);
    }

    let reconciler = Reconciler {
        host: &cfg.hostname,
        base_domain: &cfg.base_domain,
    };
    if let Err(err) = reconciler.run(backend.as_ref(), &desired).await {
        error!(error = %err, "startup reconciliation failed");
    }

    let mut processor = EventProcessor::new(backend.as_ref(), synth_cfg);
    for (id, records) in per_container {
        processor.seed(&id, records);
    }

    let mut log_level = LogLevel::from_str(&cfg.log_level).unwrap_or(LogLevel::Info);
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            event = container_runtime.next_event() => {
                match event {
                    Some(event) => {
                        let container_id = match &event {
                            RuntimeEvent::Started { container_id } => Some(container_id.clone()),
                            RuntimeEvent::Stopped { container_id, .. } => Some(container_id.clone()),
                            RuntimeEvent::Other { .. } => None,
                        };
                        let container = match &container_id {
                            Some(id) => container_runtime.inspect(id).await,
                            None => None,
                        };
                        processor.handle(event, container).await;
                    }
                    None => {
                        info!("runtime event stream closed, shutting down");
                        break;
                    }
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, withdrawing records");
                processor.shutdown_withdraw().await;
                break;
            }
            _ = sighup.recv() => {
                info!("received SIGHUP, restarting without withdrawing records");
                processor.restart_without_suppression();
                break;
            }
            _ = sigusr1.recv() => {
                log_level = log_level.more_verbose();
                apply_log_level(&log_handle, log_level);
            }
            _ = sigusr2.recv() => {
                log_level = log_level.less_verbose();
                apply_log_level(&log_handle, log_level);
            }
        }
    }

    Ok(())
}

fn apply_log_level(handle: &reload::Handle<EnvFilter, Registry>, level: LogLevel) {
    info!(level = level.as_str(), "adjusting log level");
    if let Err(e) = handle.reload(EnvFilter::new(level.as_str())) {
        warn!(error = %e, "failed to apply new log level");
    }
}
