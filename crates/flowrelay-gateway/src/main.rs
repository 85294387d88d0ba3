//! flowrelay gateway server
//!
//! HTTP relay in front of a Langflow flow engine.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use flowrelay_client::{FlowClient, FlowClientConfig};
use flowrelay_core::config::{RelayConfig, load_tweaks};
use flowrelay_core::tracing_init::{DEFAULT_FILTER, init_tracing};
use flowrelay_gateway::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "flowrelay-gateway")]
#[command(version, about = "flowrelay gateway - relays chat requests to a flow engine")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:3000", env = "LISTEN_ADDR")]
    addr: SocketAddr,

    /// Flow engine base URL
    #[arg(long, env = "BASE_URL")]
    base_url: String,

    /// Application token for the flow engine
    #[arg(long, env = "APPLICATION_TOKEN", hide_env_values = true)]
    token: String,

    /// Flow id or name to run
    #[arg(long, env = "FLOW_ID")]
    flow_id: String,

    /// Langflow instance id
    #[arg(long, env = "LANGFLOW_ID")]
    engine_id: String,

    /// JSON file with component tweaks (defaults to the built-in map)
    #[arg(long, env = "FLOWRELAY_TWEAKS_FILE")]
    tweaks_file: Option<PathBuf>,

    /// Timeout in seconds for the initial run request
    #[arg(long, env = "FLOWRELAY_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(DEFAULT_FILTER, args.log_json);

    let mut relay = RelayConfig::new(args.flow_id, args.engine_id)?;
    if let Some(path) = &args.tweaks_file {
        info!(path = %path.display(), "Loading tweaks file");
        relay = relay.with_tweaks(load_tweaks(path)?);
    }

    let client = FlowClient::new(&FlowClientConfig {
        base_url: args.base_url,
        token: args.token,
        timeout: args.request_timeout.map(Duration::from_secs),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        engine = %client.base_url(),
        flow_id = %relay.flow_id,
        tweaks = relay.tweaks.len(),
        "Starting flowrelay-gateway"
    );

    let app = build_router(AppState::new(client, relay));
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    info!("Gateway stopped");
    Ok(())
}
