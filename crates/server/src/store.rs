use async_trait::async_trait;
use docstream::{JobId, JobRunState, Result};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// Where the last finished run of each job is kept between requests.
#[async_trait]
pub trait StateStore: Send + Sync {
  async fn load(&self, job_id: &JobId) -> Result<Option<JobRunState>>;

  async fn save(&self, state: JobRunState) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryStateStore {
  states: Arc<Mutex<HashMap<JobId, JobRunState>>>,
}

impl MemoryStateStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl StateStore for MemoryStateStore {
  async fn load(&self, job_id: &JobId) -> Result<Option<JobRunState>> {
    Ok(self.states.lock().get(job_id).cloned())
  }

  async fn save(&self, state: JobRunState) -> Result<()> {
    log::trace!("Saving state of job {} run {}", state.job_id, state.run_id);

    self.states.lock().insert(state.job_id.clone(), state);

    Ok(())
  }
}
