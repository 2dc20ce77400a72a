//! counsel binary: configure providers from the environment and serve MCP
//! over stdio.

use std::sync::Arc;

use counsel_server::{Core, McpServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let core = match Core::from_env() {
        Ok(core) => core,
        Err(err) => {
            // Logging is not up yet; this must reach the operator anyway.
            eprintln!("counsel failed to start: {err}");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_new(&core.config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = counsel_tools::SERVER_VERSION,
        tools = core.catalogue.names().len(),
        default_model = core.config.default_model,
        "counsel starting on stdio"
    );

    if let Err(err) = McpServer::new(Arc::new(core)).serve_stdio().await {
        error!(%err, "server terminated with error");
        std::process::exit(1);
    }
}
