//! VM Provisioner
//!
//! Serves inventory lookups (network port-group identifiers, datastore
//! capacity) and database disk layouts over a JSON REST API.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use vm_provisioner::{
    AmbiguityPolicy, ApiServer, AppState, Error, GovcExecutor, InventoryClient, InventoryService,
    Result, ServiceConfig, ServiceMetrics, SessionRegistry,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// VM Provisioner - inventory lookups and database disk layouts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// REST API bind address
    #[arg(long, env = "API_ADDR")]
    api_addr: Option<String>,

    /// Path or name of the govc binary
    #[arg(long, env = "GOVC_PATH")]
    govc_path: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long, env = "COMMAND_TIMEOUT_SECS")]
    command_timeout_secs: Option<u64>,

    /// Maximum bytes accepted from one command stream
    #[arg(long, env = "MAX_OUTPUT_BYTES")]
    max_output_bytes: Option<usize>,

    /// What to do with ambiguous names (best-effort, strict)
    #[arg(long, env = "AMBIGUITY_POLICY")]
    ambiguity_policy: Option<AmbiguityPolicy>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    let config = load_config(&args)?;

    info!("Starting VM Provisioner");
    info!("  Version: {}", vm_provisioner::VERSION);
    info!("  REST API: {}", config.api.listen_addr);
    info!("  govc: {}", config.inventory.executor.cli_path);
    info!("  Command timeout: {}ms", config.inventory.executor.timeout_ms);
    info!("  Ambiguity policy: {}", config.inventory.ambiguity);

    let metrics = Arc::new(ServiceMetrics::new()?);
    let executor = Arc::new(GovcExecutor::new(config.inventory.executor.clone()));
    let client = Arc::new(InventoryClient::new(
        executor,
        Arc::new(SessionRegistry::new()),
        metrics,
    ));
    let service = Arc::new(InventoryService::new(client, config.inventory.ambiguity));

    let state = AppState::new(service, config.layout.clone(), config.inventory.insecure_tls);
    let server = ApiServer::new(config.api.clone(), state);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown.send(());
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    server.run().await?;

    info!("VM Provisioner shutdown complete");
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

/// Load the YAML file if given, then apply command-line overrides
fn load_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(addr) = &args.api_addr {
        config.api.listen_addr = addr.parse::<SocketAddr>().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?;
    }
    if let Some(path) = &args.govc_path {
        config.inventory.executor.cli_path = path.clone();
    }
    if let Some(secs) = args.command_timeout_secs {
        config.inventory.executor.timeout_ms = secs.saturating_mul(1000);
    }
    if let Some(bytes) = args.max_output_bytes {
        config.inventory.executor.max_output_bytes = bytes;
    }
    if let Some(policy) = args.ambiguity_policy {
        config.inventory.ambiguity = policy;
    }

    config.validate()?;
    Ok(config)
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

    let directive = |d: &str| -> Result<Directive> {
        d.parse()
            .map_err(|e| Error::Configuration(format!("Invalid log directive '{}': {}", d, e)))
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(directive("hyper=warn")?)
        .add_directive(directive("tower=warn")?)
        .add_directive(directive("tower_http=info")?)
        .add_directive(directive("axum=info")?);

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
