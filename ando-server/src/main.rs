//! Binary entry point: CLI parsing, config loading, and wiring of the two
//! listeners (data plane + control plane) onto a single tokio runtime.

mod data_plane;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use ando_core::config::{GatewayConfig, StorageBackend};
use ando_core::route::RouteData;
use ando_core::store::RouteStore;
use ando_proxy::error_pipeline::ErrorPipelineOptions;
use ando_proxy::forward::HttpForwarder;
use ando_proxy::{ProxyCore, ProxyOptions};
use clap::Parser;
use data_plane::DataPlaneState;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ando", version, about = "Ando — dynamically reconfigurable HTTP/WebSocket reverse proxy")]
struct Cli {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data-plane listen address.
    #[arg(long)]
    ip: Option<IpAddr>,
    /// Data-plane listen port.
    #[arg(long)]
    port: Option<u16>,
    /// Control-plane listen address.
    #[arg(long)]
    api_ip: Option<IpAddr>,
    /// Control-plane listen port (defaults to `port + 1`).
    #[arg(long)]
    api_port: Option<u16>,

    /// Seed a route for `/` at startup.
    #[arg(long)]
    default_target: Option<String>,
    /// Custom error-target base URL. Mutually exclusive with `--error-path`.
    #[arg(long)]
    error_target: Option<String>,
    /// Directory of static error pages. Mutually exclusive with `--error-target`.
    #[arg(long)]
    error_path: Option<PathBuf>,

    /// Route by synthesizing the `Host` header into the lookup path.
    #[arg(long)]
    host_routing: bool,

    /// Total forwarder timeout, in milliseconds.
    #[arg(long)]
    timeout: Option<u64>,
    /// Upstream connect/response timeout, in milliseconds.
    #[arg(long = "proxy-timeout")]
    proxy_timeout: Option<u64>,

    /// Extra header to merge into every forwarded request, as `name:value`. Repeatable.
    #[arg(long = "custom-header", value_parser = parse_header)]
    custom_header: Vec<(String, String)>,

    #[arg(long = "x-forward", overrides_with = "no_x_forward")]
    x_forward: bool,
    #[arg(long = "no-x-forward", overrides_with = "x_forward")]
    no_x_forward: bool,

    #[arg(long = "prepend-path", overrides_with = "no_prepend_path")]
    prepend_path: bool,
    #[arg(long = "no-prepend-path", overrides_with = "prepend_path")]
    no_prepend_path: bool,

    #[arg(long = "include-prefix", overrides_with = "no_include_prefix")]
    include_prefix: bool,
    #[arg(long = "no-include-prefix", overrides_with = "include_prefix")]
    no_include_prefix: bool,

    /// Route store backend: `memory` or `database`.
    #[arg(long = "storage-backend", value_parser = parse_storage_backend)]
    storage_backend: Option<StorageBackend>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Where to snapshot the in-memory route table after each mutation.
    #[arg(long, default_value = "data/ando-state.json")]
    state_file: PathBuf,
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected name:value, got {s:?}"))
}

fn parse_storage_backend(s: &str) -> Result<StorageBackend, String> {
    match s {
        "memory" => Ok(StorageBackend::Memory),
        "database" => Ok(StorageBackend::Database),
        other => Err(format!("unknown storage backend {other:?} (expected memory or database)")),
    }
}

/// Apply CLI overrides on top of the file/env-loaded config. CLI wins when
/// the caller actually passed a value; the toggle pairs resolve to the
/// config default when neither `--x` nor `--no-x` was given.
fn apply_cli_overrides(mut config: GatewayConfig, cli: &Cli) -> GatewayConfig {
    if let Some(ip) = cli.ip {
        config.ip = ip;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ip) = cli.api_ip {
        config.api_ip = ip;
    }
    if cli.api_port.is_some() {
        config.api_port = cli.api_port;
    }
    if cli.default_target.is_some() {
        config.default_target = cli.default_target.clone();
    }
    if cli.error_target.is_some() {
        config.error_target = cli.error_target.clone();
    }
    if cli.error_path.is_some() {
        config.error_path = cli.error_path.clone();
    }
    if cli.host_routing {
        config.host_routing = true;
    }
    if let Some(ms) = cli.timeout {
        config.timeout = Some(ms as f64 / 1000.0);
    }
    if let Some(ms) = cli.proxy_timeout {
        config.proxy_timeout = Some(ms as f64 / 1000.0);
    }
    for (k, v) in &cli.custom_header {
        config.custom_headers.insert(k.clone(), v.clone());
    }
    if cli.x_forward {
        config.x_forward = true;
    } else if cli.no_x_forward {
        config.x_forward = false;
    }
    if cli.prepend_path {
        config.prepend_path = true;
    } else if cli.no_prepend_path {
        config.prepend_path = false;
    }
    if cli.include_prefix {
        config.include_prefix = true;
    } else if cli.no_include_prefix {
        config.include_prefix = false;
    }
    if let Some(backend) = cli.storage_backend {
        config.storage_backend = backend;
    }
    config
}

async fn build_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn RouteStore>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            let store = ando_store::MemoryStore::new();
            if let Some(target) = &config.default_target {
                store.seed("/", RouteData::with_target(target.clone()));
            }
            Ok(Arc::new(store))
        }
        StorageBackend::Database => {
            let store = ando_store::DatabaseStore::connect_from_env().await?;
            if let Some(target) = &config.default_target {
                store.add("/", RouteData::with_target(target.clone())).await?;
            }
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ando_observability::init_tracing(&cli.log_level);

    let file_config = match &cli.config {
        Some(path) => GatewayConfig::load(Some(path))?,
        None => GatewayConfig::load(None)?,
    };
    let config = apply_cli_overrides(file_config, &cli);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ip = %config.ip,
        port = config.port,
        "Ando starting"
    );

    let store = build_store(&config).await?;

    let is_memory_backend = config.storage_backend == StorageBackend::Memory;
    let state_file = is_memory_backend.then(|| cli.state_file.clone());
    if let Some(path) = &state_file {
        ando_admin::persist::load_state(path, store.as_ref()).await;
    }

    let proxy_options = ProxyOptions::from_config(&config);
    let error_pipeline = ErrorPipelineOptions::from_config(&config);
    let core = Arc::new(ProxyCore::new(Arc::clone(&store), proxy_options));

    let data_plane_state = Arc::new(DataPlaneState {
        core,
        forwarder: HttpForwarder::new(),
        error_pipeline,
        timeout: config.timeout,
        proxy_timeout: config.proxy_timeout,
    });
    let data_plane_addr = SocketAddr::new(config.ip, config.port);
    let data_plane_app = data_plane::build_router(data_plane_state)
        .into_make_service_with_connect_info::<SocketAddr>();

    let admin_state = ando_admin::AdminState::with_state_file(
        Arc::clone(&store),
        config.effective_auth_token(),
        state_file,
    );
    let admin_addr = SocketAddr::new(config.api_ip, config.effective_api_port());

    info!(data_plane = %data_plane_addr, control_plane = %admin_addr, "listening");

    let data_plane_listener = tokio::net::TcpListener::bind(data_plane_addr).await?;
    let result = tokio::try_join!(
        async {
            axum::serve(data_plane_listener, data_plane_app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(anyhow::Error::from)
        },
        ando_admin::server::serve(admin_addr, admin_state, shutdown_signal()),
    );
    result?;

    info!("Ando stopped");
    Ok(())
}
