use std::sync::Arc;

use mc_jobs_rs::api::server::JobServer;
use mc_jobs_rs::helpers::{build_tracker, load_config_from_env, load_port};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,mc_jobs_rs=info".into()),
        )
        .init();

    let port = load_port();
    let tracker = Arc::new(build_tracker(load_config_from_env()));
    let server = JobServer::new(port, Some(tracker));
    if let Err(err) = server.start().await {
        error!("server error: {err}");
        std::process::exit(1);
    }
}
