use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use crate::core::Core;
use crate::error::CoreResult;
use crate::utils::paths::normalize_path;

pub mod analysis;
pub mod apps;
pub mod directory;
pub mod error;

pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Server {
    pub async fn new(data_dir: PathBuf) -> Result<Self, String> {
        let core = Core::load(&data_dir).map_err(|error| error.to_string())?;
        Self::start(Arc::new(core)).await
    }

    pub async fn start(core: Arc<Core>) -> Result<Self, String> {
        let app = router(core.clone());
        let listener = TcpListener::bind(core.config().server.bind.as_str())
            .await
            .map_err(|error| error.to_string())?;
        let addr = listener
            .local_addr()
            .map_err(|error| error.to_string())?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        tracing::info!(%addr, "dirscope server listening");

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| "failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

pub fn router(core: Arc<Core>) -> Router {
    let state = Arc::new(ServerState { core });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/health", get(health))
        .route("/directory/list", post(directory::list_directory))
        .route("/directory/invalidate", post(directory::invalidate_directory))
        .route("/directory/mutated", post(directory::record_mutation))
        .route("/analysis/scan", post(analysis::scan_subtree))
        .route("/analysis/duplicates", post(analysis::duplicate_page))
        .route("/apps/installed", post(apps::installed_apps))
        .with_state(state)
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

pub(crate) struct ServerState {
    pub(crate) core: Arc<Core>,
}

impl ServerState {
    /// Relative request paths resolve against the data directory.
    pub(crate) fn resolve(&self, raw: &str) -> CoreResult<PathBuf> {
        normalize_path(raw, self.base_dir())
    }

    fn base_dir(&self) -> &Path {
        self.core.data_dir()
    }
}
