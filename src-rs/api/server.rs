use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tracing::info;

use crate::api::handlers::{
    handle_cancel_job, handle_download_status, handle_health, handle_list_downloads,
    handle_list_jobs, handle_start_download, handle_start_update, handle_update_check,
    handle_update_progress, handle_update_status,
};
use crate::config::TrackerConfig;
use crate::helpers::build_tracker;
use crate::tracker::JobTracker;

pub struct JobServer {
    pub port: u16,
    pub tracker: Arc<JobTracker>,
}

impl JobServer {
    pub fn new(port: u16, tracker: Option<Arc<JobTracker>>) -> Self {
        let tracker = tracker.unwrap_or_else(|| Arc::new(build_tracker(TrackerConfig::default())));
        Self { port, tracker }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route(
                "/server-download",
                get(handle_list_downloads).post(handle_start_download),
            )
            .route("/server-download/:id", get(handle_download_status))
            .route("/system/update/install", post(handle_start_update))
            .route("/system/update/progress", get(handle_update_progress))
            .route("/system/update/status", get(handle_update_status))
            .route("/system/update/check", post(handle_update_check))
            .route("/jobs", get(handle_list_jobs))
            .route("/jobs/:id", delete(handle_cancel_job))
            .with_state(self.tracker.clone())
    }

    /// Serves until ctrl-c, then cancels whatever jobs are still running.
    pub async fn start(&self) -> Result<(), String> {
        let sweeper = self.tracker.spawn_sweeper();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("mc-jobs listening on {addr}");

        let served = axum::Server::bind(&addr)
            .serve(self.router().into_make_service())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown requested");
            })
            .await
            .map_err(|err| err.to_string());

        let cancelled = self.tracker.shutdown();
        if cancelled > 0 {
            info!(cancelled, "cancelled in-flight jobs");
        }
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        served
    }
}
