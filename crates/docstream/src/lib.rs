mod codec;
mod config;
mod consumer;
mod generator;
mod orchestrator;
mod progress;
mod retry;
mod signals;
mod tracker;
mod types;

pub use codec::*;
pub use config::*;
pub use consumer::*;
pub use generator::*;
pub use orchestrator::{EventStream, JobRun, Orchestrator, OrchestratorBuilder, RunOutcome};
pub use progress::*;
pub use retry::*;
pub use signals::*;
pub use tracker::{StateTracker, Transition};
pub use types::*;

pub use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Error>;
