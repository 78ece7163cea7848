//! Bare-metal Node Controller
//!
//! Runs one controller per node: watches Volume records, runs the periodic
//! Discover pass and serves health and metrics endpoints.

use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use baremetal_node_controller::controller::{
    run_volume_controller, wait_for_shutdown, KubeEventRecorder, LogRecorder, SHUTDOWN_GRACE,
};
use baremetal_node_controller::domain::ports::{EventRecorderRef, ExecutorRef};
use baremetal_node_controller::hardware::{
    CommandExecutor, DataDiscover, Lsblk, LvmCli, ScannerConfig, SmartHealth, SysfsInventory,
};
use baremetal_node_controller::{
    Collaborators, ControllerConfig, ControllerMetrics, DriveProvisioner, Error, KubeStore,
    LvmProvisioner, MemoryStore, ProvisionerKind, ProvisionerMap, ProvisionerRegistry,
    ResourceStore, Result, Runner, Volume, VolumeManager,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Bare-metal Node Controller - drives, volume groups and volumes of one node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Node this controller manages
    #[arg(long, env = "NODE_ID")]
    node_id: String,

    /// Namespace holding the resource records
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    namespace: String,

    /// Discover interval in seconds
    #[arg(long, env = "DISCOVER_INTERVAL", default_value = "30")]
    discover_interval_secs: u64,

    /// Volume resync interval in seconds
    #[arg(long, env = "RESYNC_INTERVAL", default_value = "60")]
    resync_interval_secs: u64,

    /// Adopt the system drive's volume group as a LogicalVolumeGroup
    #[arg(
        long,
        env = "DISCOVER_SYSTEM_LVG",
        default_value_t = ControllerConfig::default().discover_system_lvg,
        action = ArgAction::Set
    )]
    discover_system_lvg: bool,

    /// Path to sysfs
    #[arg(long, env = "SYSFS_ROOT", default_value = "/sys")]
    sysfs_root: PathBuf,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run in standalone mode (no Kubernetes, in-memory records)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,
}

impl Args {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            node_id: self.node_id.clone(),
            namespace: self.namespace.clone(),
            discover_system_lvg: self.discover_system_lvg,
            discover_interval: Duration::from_secs(self.discover_interval_secs),
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            ..Default::default()
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting Bare-metal Node Controller");
    info!("  Version: {}", baremetal_node_controller::VERSION);
    info!("  Node: {}", args.node_id);
    info!("  Namespace: {}", args.namespace);
    info!("  Discover system LVG: {}", args.discover_system_lvg);
    info!("  Standalone mode: {}", args.standalone);

    if args.node_id.is_empty() {
        return Err(Error::Configuration("node id must not be empty".into()));
    }

    let metrics = Arc::new(ControllerMetrics::new()?);
    let shutdown = CancellationToken::new();

    // Start health server
    let health_addr = args.health_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let exposed = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, exposed).await {
            error!("Metrics server error: {}", e);
        }
    });

    if args.standalone {
        let store = Arc::new(MemoryStore::new(args.namespace.clone()));
        let manager = build_manager(&args, store, Arc::new(LogRecorder), metrics);
        run_standalone(manager, shutdown).await;
    } else {
        let client = kube::Client::try_default().await?;
        let store = Arc::new(KubeStore::new(client.clone(), args.namespace.clone()));
        let recorder = Arc::new(KubeEventRecorder::new(client.clone(), &args.node_id));
        let manager = build_manager(&args, store, recorder, metrics);
        let api = kube::Api::<Volume>::namespaced(client, &args.namespace);
        run_cluster(manager, api, shutdown).await;
    }

    info!("Controller shutdown complete");
    Ok(())
}

fn build_manager<S: ResourceStore>(
    args: &Args,
    store: Arc<S>,
    recorder: EventRecorderRef,
    metrics: Arc<ControllerMetrics>,
) -> Arc<VolumeManager<S>> {
    let executor: ExecutorRef = Arc::new(CommandExecutor::default());
    let lister = Arc::new(Lsblk::new(executor.clone()));
    let lvm = Arc::new(LvmCli::new(executor.clone()));
    let data = Arc::new(DataDiscover::new(lister.clone(), lvm.clone(), executor.clone()));

    let scanner = ScannerConfig {
        sysfs_path: args.sysfs_root.clone(),
        ..Default::default()
    };
    let inventory = Arc::new(SysfsInventory::new(
        scanner,
        Some(SmartHealth::new(executor.clone())),
    ));

    let mut provisioners = ProvisionerMap::new();
    provisioners.insert(
        ProvisionerKind::DriveBased,
        Arc::new(DriveProvisioner::new(store.clone(), lister.clone(), executor)),
    );
    provisioners.insert(
        ProvisionerKind::LvmBased,
        Arc::new(LvmProvisioner::new(store.clone(), lvm.clone())),
    );

    let collaborators = Collaborators {
        inventory,
        lister,
        data_discoverer: data,
        lvm,
        recorder,
        metrics,
    };

    Arc::new(VolumeManager::new(
        args.controller_config(),
        store,
        ProvisionerRegistry::new(provisioners),
        collaborators,
    ))
}

async fn run_standalone(manager: Arc<VolumeManager<MemoryStore>>, shutdown: CancellationToken) {
    let runner = Arc::new(Runner::new(manager, shutdown.clone()));

    let discover = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_discover_loop().await })
    };
    let resync = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_resync_loop().await })
    };

    wait_for_shutdown(shutdown).await;
    join_with_grace(vec![discover, resync]).await;
}

async fn run_cluster(
    manager: Arc<VolumeManager<KubeStore>>,
    api: kube::Api<Volume>,
    shutdown: CancellationToken,
) {
    let runner = Arc::new(Runner::new(manager.clone(), shutdown.clone()));

    let discover = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_discover_loop().await })
    };
    let controller = tokio::spawn(run_volume_controller(manager, api, shutdown.clone()));

    wait_for_shutdown(shutdown).await;
    join_with_grace(vec![discover, controller]).await;
}

async fn join_with_grace(tasks: Vec<tokio::task::JoinHandle<()>>) {
    let all = futures::future::join_all(tasks);
    if tokio::time::timeout(SHUTDOWN_GRACE, all).await.is_err() {
        error!("Controller loops did not stop within the grace period");
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "kube_runtime=info"] {
        let directive = directive
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid log directive {}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let (status, body) = match req.uri().path() {
                "/healthz" | "/livez" | "/readyz" => (StatusCode::OK, "ok"),
                _ => (StatusCode::NOT_FOUND, "not found"),
            };
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, metrics: Arc<ControllerMetrics>) -> Result<()> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let metrics = metrics.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match metrics.encode() {
                            Ok((content_type, buffer)) => {
                                let mut response = Response::new(Body::from(buffer));
                                if let Ok(value) = HeaderValue::from_str(&content_type) {
                                    response.headers_mut().insert(CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => {
                                error!("Metrics encoding error: {}", e);
                                let mut response = Response::new(Body::from("encoding failed"));
                                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                                response
                            }
                        },
                        _ => {
                            let mut response = Response::new(Body::from("not found"));
                            *response.status_mut() = StatusCode::NOT_FOUND;
                            response
                        }
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Configuration(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_lvg_default_matches_config() {
        let args = Args::try_parse_from(["node-controller", "--node-id", "node-1"]).unwrap();
        assert!(args.discover_system_lvg);
        assert_eq!(
            args.controller_config().discover_system_lvg,
            ControllerConfig::default().discover_system_lvg
        );

        let args = Args::try_parse_from([
            "node-controller",
            "--node-id",
            "node-1",
            "--discover-system-lvg",
            "false",
        ])
        .unwrap();
        assert!(!args.controller_config().discover_system_lvg);
    }
}
