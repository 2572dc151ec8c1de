use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use node_template_operator::cloud::{HttpInventoryClient, InventoryApi, InventoryClientConfig};
use node_template_operator::config::{OperatorConfig, RequeueConfig};
use node_template_operator::controller::{
    self, KubeTemplateStore, RequeuePolicy, TemplateReconciler, TemplateStore,
};
use node_template_operator::providers::{
    CacheConfig, SecurityGroupProvider, SelectorCache, SubnetProvider,
};
use node_template_operator::{telemetry, Error};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version and build information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Base URL of the cloud inventory API
    #[arg(long, env = "INVENTORY_ENDPOINT")]
    inventory_endpoint: String,

    /// Cloud region sent with every inventory request
    #[arg(long, env = "CLOUD_REGION", default_value = "us-east-1")]
    region: String,

    /// Items requested per inventory page
    #[arg(long, env = "INVENTORY_PAGE_SIZE", default_value_t = 100)]
    page_size: u32,

    /// Per-request timeout for the inventory API
    #[arg(long, env = "INVENTORY_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Lifetime of cached selector resolutions
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 60)]
    cache_ttl_secs: u64,

    /// Maximum number of cached selector resolutions
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 1024)]
    cache_capacity: u64,

    /// Requeue interval after a successful reconcile
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value_t = 300)]
    resync_interval_secs: u64,

    /// First retry delay after a transient failure
    #[arg(long, env = "BACKOFF_BASE_SECS", default_value_t = 5)]
    backoff_base_secs: u64,

    /// Retry delay cap
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value_t = 300)]
    backoff_max_secs: u64,

    /// Status patch attempts under write conflicts
    #[arg(long, env = "PATCH_ATTEMPTS", default_value_t = 3)]
    patch_attempts: u32,

    /// Listen address for the health, metrics and query API
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    api_addr: SocketAddr,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl RunArgs {
    fn operator_config(&self) -> OperatorConfig {
        OperatorConfig {
            inventory: InventoryClientConfig {
                endpoint: self.inventory_endpoint.clone(),
                region: self.region.clone(),
                page_size: self.page_size,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
            },
            cache: CacheConfig {
                max_capacity: self.cache_capacity,
                ttl: Duration::from_secs(self.cache_ttl_secs),
            },
            requeue: RequeueConfig {
                resync_interval: Duration::from_secs(self.resync_interval_secs),
                backoff_base: Duration::from_secs(self.backoff_base_secs),
                backoff_max: Duration::from_secs(self.backoff_max_secs),
            },
            patch_attempts: self.patch_attempts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("Node Template Operator v{}", env!("CARGO_PKG_VERSION"));
            println!("Build Date: {}", env!("BUILD_DATE"));
            println!("Git SHA: {}", env!("GIT_SHA"));
            println!("Rust Version: {}", env!("RUST_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let fmt_layer = match format {
        LogFormat::Text => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    // Only enable OTEL if an endpoint is provided
    if telemetry::otlp_enabled() {
        match telemetry::init_telemetry(&registry) {
            Ok(otel_layer) => {
                registry.with(otel_layer).init();
                info!("OpenTelemetry tracing initialized");
            }
            Err(e) => {
                registry.init();
                warn!("OpenTelemetry tracing disabled: {}", e);
            }
        }
    } else {
        registry.init();
        info!("OpenTelemetry tracing disabled (OTEL_EXPORTER_OTLP_ENDPOINT not set)");
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_format);

    info!(
        "Starting Node Template Operator v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = args.operator_config();
    config.validate()?;

    // Initialize Kubernetes client
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let inventory: Arc<dyn InventoryApi> =
        Arc::new(HttpInventoryClient::new(config.inventory.clone())?);
    info!(
        "Using inventory API at {} (region {})",
        config.inventory.endpoint, config.inventory.region
    );

    // One cache shared by both providers, the controller and the REST API
    let cache = Arc::new(SelectorCache::new(config.cache.clone()));
    let subnets = SubnetProvider::new(inventory.clone(), cache.clone());
    let security_groups = SecurityGroupProvider::new(inventory, cache.clone());
    let store: Arc<dyn TemplateStore> = Arc::new(KubeTemplateStore::new(client.clone()));

    #[cfg(feature = "rest-api")]
    {
        let api_state = Arc::new(node_template_operator::rest_api::ApiState {
            store: store.clone(),
            subnets: Arc::new(subnets.clone()),
            security_groups: Arc::new(security_groups.clone()),
            cache,
        });
        let addr = args.api_addr;
        tokio::spawn(async move {
            if let Err(e) = node_template_operator::rest_api::run_server(api_state, addr).await {
                tracing::error!("REST API server error: {:?}", e);
            }
        });
    }

    // Create shared controller state
    let state = Arc::new(controller::ControllerState {
        client,
        reconciler: TemplateReconciler::new(
            store,
            subnets,
            security_groups,
            config.patch_attempts,
        ),
        requeue: RequeuePolicy::new(config.requeue.clone()),
    });

    // Run the main controller loop
    let result = controller::run_controller(state).await;

    // Flush any remaining traces
    telemetry::shutdown_telemetry();

    result
}
