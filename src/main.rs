use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repliset::remote::{self, HttpDiscovery, HttpSelection, RelayRegistry, SelfClockStore};
use repliset::{
    EngineConfig, HttpNodeClient, NodeClient, PeerSetView, ReconfigPlanner, StateMachine,
    SyncQueues,
};

#[derive(Parser, Debug)]
#[command(name = "repliset")]
#[command(about = "Replica-set state machine for storage fleet nodes", long_about = None)]
struct Args {
    /// This node's own base URL, as registered with the fleet
    #[arg(long)]
    endpoint: String,

    /// This node's service-provider id
    #[arg(long)]
    sp_id: u64,

    /// Base URL of the discovery service
    #[arg(long)]
    discovery_url: String,

    /// Base URL of the registry relay
    #[arg(long)]
    relay_url: String,

    /// Run with the short dev iteration delay (3 s instead of 1 h)
    #[arg(long)]
    dev_mode: bool,

    /// Disable the engine (metadata-only node)
    #[arg(long)]
    user_metadata_node: bool,

    /// Worker count for the manual sync queue
    #[arg(long, default_value_t = 3)]
    manual_workers: usize,

    /// Worker count for the recurring sync queue
    #[arg(long, default_value_t = 3)]
    recurring_workers: usize,

    /// Maximum clock distance one export covers
    #[arg(long, default_value_t = 10_000)]
    max_export_clock_range: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repliset=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig {
        is_user_metadata_node: args.user_metadata_node,
        dev_mode: args.dev_mode,
        max_manual_sync_concurrency: args.manual_workers,
        max_recurring_sync_concurrency: args.recurring_workers,
        max_export_clock_range: args.max_export_clock_range,
        ..EngineConfig::new(args.endpoint.clone(), args.sp_id)
    };

    let http = reqwest::Client::builder().build()?;
    let client: Arc<dyn NodeClient> =
        Arc::new(HttpNodeClient::new(config.health_probe_timeout())?);

    // The endpoint map is written once here and read-only afterwards.
    let endpoints = Arc::new(remote::fetch_endpoint_map(&http, &args.discovery_url).await?);
    tracing::info!(
        "Loaded {} service providers from {}",
        endpoints.len(),
        args.discovery_url
    );

    let store = Arc::new(SelfClockStore::new(client.clone(), args.endpoint.clone()));
    let queues = SyncQueues::start(&config, client.clone(), store.clone());

    let view = PeerSetView::new(
        args.endpoint.clone(),
        Arc::new(HttpDiscovery::new(http.clone(), args.discovery_url.clone())),
        client.clone(),
    );
    let planner = ReconfigPlanner::new(
        Arc::new(HttpSelection::new(
            http.clone(),
            args.discovery_url.clone(),
            client.clone(),
        )),
        Arc::new(RelayRegistry::new(http, args.relay_url)),
        client,
        endpoints,
        queues.clone(),
    );

    let machine = StateMachine::new(config, view, queues, planner, store);

    tokio::select! {
        () = machine.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
