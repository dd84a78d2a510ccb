mod clients;
mod config;
mod helpers;
mod models;
mod parsers;
mod quantity;
mod reconcile;
mod routes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use clients::aggregator::Aggregator;
use clients::refresh::RefreshControl;
use clients::{Kubectl, SystemExecutor};
use config::{Config, ConfigError};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub refresher: Arc<RefreshControl>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kube_monitor=info".into()),
        )
        .init();

    let config_path = std::env::args()
        .skip(1)
        .zip(std::env::args().skip(2))
        .find_map(|(k, v)| (k == "-config" || k == "--config").then_some(v))
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| "/etc/kube-monitor/config.yaml".to_string());
    let config_path = PathBuf::from(config_path);

    let cfg = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });
    let listen_addr = cfg.listen_addr();

    let executor = Arc::new(SystemExecutor);
    if !Kubectl::new(executor.clone(), cfg.kubectl_path.clone())
        .is_available()
        .await
    {
        warn!(
            "kubectl not found at {:?}; snapshots stay empty until it is",
            cfg.kubectl_path
        );
    }

    let (config_tx, config_rx) = watch::channel(Arc::new(cfg));
    tokio::spawn(reload_on_hangup(config_path, config_tx));

    let aggregator = Arc::new(Aggregator::new(executor, config_rx));
    let refresher = Arc::new(RefreshControl::new(aggregator.clone()));
    refresher.start().await;

    let state = AppState {
        aggregator,
        refresher: refresher.clone(),
    };

    let router = routes::build_router(state);

    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!("kube-monitor listening on {}", listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            refresher.stop().await;
        })
        .await
        .unwrap_or_else(|e| {
            eprintln!("server error: {}", e);
            std::process::exit(1);
        });
}

/// A missing file means "run with defaults"; anything else is fatal.
fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match Config::load(path) {
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            warn!("config {} not found, using defaults", path.display());
            Ok(Config::default())
        }
        other => other,
    }
}

#[cfg(unix)]
async fn reload_on_hangup(path: PathBuf, tx: watch::Sender<Arc<Config>>) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("config reload disabled, cannot listen for SIGHUP: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        match load_config(&path) {
            Ok(cfg) => {
                info!("reloaded config from {}", path.display());
                if tx.send(Arc::new(cfg)).is_err() {
                    return;
                }
            }
            Err(e) => warn!("keeping previous config: {}", e),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_path: PathBuf, _tx: watch::Sender<Arc<Config>>) {}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
