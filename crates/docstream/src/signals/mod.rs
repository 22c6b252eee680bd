mod signal;

pub use signal::{Receiver, RunSignal, Signal};

use crate::{Error, JobId, Result};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// Signals of the job runs currently live, keyed by job.
#[derive(Clone, Default)]
pub struct SignalManager {
  signals: Arc<Mutex<HashMap<JobId, RunSignal>>>,
}

impl SignalManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns `false` if a run of the job is already registered.
  pub fn register_signal(&self, job_id: JobId, signal: RunSignal) -> bool {
    let mut signals = self.signals.lock();
    if signals.contains_key(&job_id) {
      return false;
    }

    signals.insert(job_id, signal);
    true
  }

  pub fn unregister_signal(&self, job_id: &JobId) {
    self.signals.lock().remove(job_id);
  }

  pub fn get_signal(&self, job_id: &JobId) -> Option<RunSignal> {
    self.signals.lock().get(job_id).cloned()
  }

  pub fn is_running(&self, job_id: &JobId) -> bool {
    self.signals.lock().contains_key(job_id)
  }

  pub fn cancel_job(&self, job_id: &JobId) -> Result<()> {
    let signal = self
      .get_signal(job_id)
      .ok_or_else(|| Error::error(format!("Job {} not found", job_id)))?;

    signal.cancel()?;

    Ok(())
  }
}
