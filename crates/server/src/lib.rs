mod config;
mod error;
mod handlers;
mod store;

pub use config::*;
pub use error::*;
pub use store::*;

use axum::{
  routing::{get, post},
  Router,
};
use docstream::{Orchestrator, SignalManager};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves generation progress streams over HTTP.
///
/// Only one run per job is live at a time. Finished runs are saved to the
/// [`StateStore`] so that a later retry can pick them up.
#[derive(Clone)]
pub struct DocstreamServer {
  orchestrator: Orchestrator,
  signals: SignalManager,
  store: Arc<dyn StateStore>,
}

impl DocstreamServer {
  pub fn new(orchestrator: Orchestrator) -> Self {
    Self::with_store(orchestrator, MemoryStateStore::new())
  }

  pub fn with_store<T>(orchestrator: Orchestrator, store: T) -> Self
  where
    T: StateStore + 'static,
  {
    DocstreamServer {
      orchestrator,
      signals: SignalManager::new(),
      store: Arc::new(store),
    }
  }

  pub fn orchestrator(&self) -> &Orchestrator {
    &self.orchestrator
  }

  pub fn signals(&self) -> &SignalManager {
    &self.signals
  }

  pub fn router(&self) -> Router {
    Router::new()
      .route("/jobs/{job_id}/generate", post(handlers::generate))
      .route("/jobs/{job_id}/retry", post(handlers::retry))
      .route("/jobs/{job_id}/cancel", post(handlers::cancel))
      .route("/jobs/{job_id}/state", get(handlers::state))
      .with_state(self.clone())
  }

  pub async fn serve(self, addr: &str) -> docstream::Result<()> {
    let listener = TcpListener::bind(addr).await?;

    log::info!("Docstream server listening on {}", addr);

    axum::serve(listener, self.router()).await?;

    Ok(())
  }
}
