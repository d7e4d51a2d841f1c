//! VM Image Policy Service
//!
//! Serves image resolution, hardware version determination and storage usage
//! notification over REST, backed either by the Kubernetes API or by a local
//! image inventory file.

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vm_image_policy::image::load_inventory;
use vm_image_policy::provider::DEFAULT_VC_PORT;
use vm_image_policy::usage::{LoggingTrigger, DEFAULT_USAGE_QUEUE_CAPACITY};
use vm_image_policy::{
    storage_usage_queue, ApiServer, ApiServerConfig, Error, ImageResolver, ImageStoreRef,
    KubeImageStore, OperatorMetrics, ProviderConfigLoader, RestRouter, Result,
    StorageUsageConsumer,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// VM Image Policy - image resolution and hardware version policy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Namespace the service runs in; holds the provider ConfigMaps
    #[arg(long, env = "POD_NAMESPACE", default_value = "vmware-system-vmop")]
    pod_namespace: String,

    /// Capacity of the storage usage queue
    #[arg(long, env = "USAGE_QUEUE_CAPACITY", default_value_t = DEFAULT_USAGE_QUEUE_CAPACITY)]
    usage_queue_capacity: usize,

    /// Image inventory file (multi-document YAML), used in standalone mode
    #[arg(long, env = "IMAGES_FILE")]
    images_file: Option<String>,

    /// vCenter PNID to write into the provider ConfigMap at startup
    #[arg(long, env = "VC_PNID")]
    vc_pnid: Option<String>,

    /// vCenter port written together with --vc-pnid
    #[arg(long, env = "VC_PORT", default_value = DEFAULT_VC_PORT)]
    vc_port: String,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30")]
    request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run in standalone mode (no Kubernetes)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting VM Image Policy service");
    info!("  Version: {}", vm_image_policy::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Namespace: {}", args.pod_namespace);
    info!("  Standalone mode: {}", args.standalone);

    let shutdown = CancellationToken::new();
    let metrics = Arc::new(OperatorMetrics::new()?);
    let store = build_store(&args, &shutdown).await?;
    info!("Image store: {}", store.store_name());

    let resolver = ImageResolver::new(store).with_metrics(metrics.clone());

    // Storage usage pipeline
    let (notifier, receiver) = storage_usage_queue(args.usage_queue_capacity);
    let consumer = StorageUsageConsumer::new(receiver, Arc::new(LoggingTrigger))
        .with_metrics(metrics.clone());
    let consumer_handle = tokio::spawn(consumer.run(shutdown.clone()));

    // Shutdown on Ctrl-C
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    // Create and run API server
    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
        request_timeout_secs: args.request_timeout_secs,
        ..Default::default()
    };

    let router = RestRouter::new(resolver, notifier, metrics);
    let api_server = ApiServer::new(api_config, router, shutdown.clone());

    info!("Starting API server");
    let result = api_server.run().await;

    shutdown.cancel();
    match consumer_handle.await {
        Ok(delivered) => info!("Storage usage consumer delivered {} events", delivered),
        Err(e) => error!("Storage usage consumer failed: {}", e),
    }

    result?;
    info!("Shutdown complete");
    Ok(())
}

/// Pick the image store for the current mode.
///
/// In cluster mode the image watchers run until `shutdown` fires.
async fn build_store(args: &Args, shutdown: &CancellationToken) -> Result<ImageStoreRef> {
    if args.standalone {
        let path = args.images_file.as_deref().ok_or_else(|| {
            Error::Configuration("--images-file is required in standalone mode".into())
        })?;
        let store = load_inventory(path, &args.pod_namespace)?;
        return Ok(Arc::new(store));
    }

    let client = kube::Client::try_default().await?;

    let loader = ProviderConfigLoader::new(client.clone(), args.pod_namespace.clone());
    if let Some(vc_pnid) = args.vc_pnid.as_deref() {
        match loader.update_vc_endpoint(vc_pnid, &args.vc_port).await {
            Ok(updated) => info!("vCenter endpoint sync (changed: {})", updated),
            Err(e) => warn!("Failed to sync vCenter endpoint: {}", e),
        }
    }
    match loader.load().await {
        Ok(config) => info!(
            "vCenter: {} (datacenter {:?})",
            config.vc_endpoint(),
            config.datacenter
        ),
        Err(e) => warn!("Provider config unavailable: {}", e),
    }
    match loader.dns().await {
        Ok(dns) => info!(
            "DNS: nameservers {:?}, search suffixes {:?}",
            dns.nameservers, dns.search_suffixes
        ),
        Err(e) => warn!("DNS config unavailable: {}", e),
    }

    let store = KubeImageStore::new(client);
    let cache: ImageStoreRef = store.cache();
    tokio::spawn(store.run(shutdown.clone()));
    Ok(cache)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "tower_http=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
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
}
