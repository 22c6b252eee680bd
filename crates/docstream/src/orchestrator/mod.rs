mod builder;
mod driver;
mod emitter;
mod handle;
mod supervisor;

pub use builder::OrchestratorBuilder;
pub use emitter::EventStream;
pub use handle::{JobRun, RunOutcome};

use crate::{
  tracker::StateTracker, ArtifactKind, Error, GenerationConfig, Generators, JobId, Result, RunId,
  RunSignal,
};
use driver::Driver;
pub(crate) use emitter::Emitter;
use std::sync::Arc;

/// Drives the generators of a job and streams one event per state change.
///
/// Cheap to clone. Every run gets its own tracker, so one orchestrator can
/// serve any number of jobs at once.
#[derive(Clone, Debug)]
pub struct Orchestrator {
  config: Arc<GenerationConfig>,
  generators: Generators,
}

impl Orchestrator {
  pub fn builder() -> OrchestratorBuilder {
    OrchestratorBuilder::new()
  }

  pub fn config(&self) -> &GenerationConfig {
    &self.config
  }

  pub fn generators(&self) -> &Generators {
    &self.generators
  }

  /// Generates every configured kind.
  pub fn run(&self, job_id: JobId) -> Result<JobRun> {
    self.run_with_signal(job_id, RunSignal::new())
  }

  /// Same as [`Orchestrator::run`], stopped through `signal`. Lets a caller
  /// register the signal before anything is spawned.
  pub fn run_with_signal(&self, job_id: JobId, signal: RunSignal) -> Result<JobRun> {
    self.launch(job_id, &self.config.kinds(), signal)
  }

  /// Generates `kinds` in the given order.
  ///
  /// Configuration problems are returned here, before anything is spawned or
  /// emitted. Must be called within a tokio runtime.
  pub fn run_kinds(&self, job_id: JobId, kinds: &[ArtifactKind]) -> Result<JobRun> {
    self.launch(job_id, kinds, RunSignal::new())
  }

  fn launch(&self, job_id: JobId, kinds: &[ArtifactKind], signal: RunSignal) -> Result<JobRun> {
    self.check_generators(kinds)?;

    let weights = self.config.weights_for(kinds);
    let tracker = StateTracker::initialize(job_id, RunId::new(), kinds, &weights)?;

    Ok(self.spawn(tracker, kinds.to_vec(), signal))
  }

  pub(crate) fn spawn(
    &self,
    tracker: StateTracker,
    kinds: Vec<ArtifactKind>,
    signal: RunSignal,
  ) -> JobRun {
    let job_id = tracker.state().job_id.clone();
    let run_id = tracker.state().run_id.clone();
    let (emitter, events) = Emitter::channel(self.config.channel_capacity, signal.clone());

    let driver = Driver::new(
      self.config.clone(),
      self.generators.clone(),
      tracker,
      emitter,
      signal.clone(),
      kinds,
    );

    let outcome = tokio::spawn(driver.run());

    JobRun {
      job_id,
      run_id,
      events,
      signal,
      outcome,
    }
  }

  pub(crate) fn check_generators(&self, kinds: &[ArtifactKind]) -> Result<()> {
    match kinds.iter().find(|kind| !self.generators.contains(**kind)) {
      Some(kind) => Err(Error::config_error(format!(
        "No generator registered for `{}`",
        kind
      ))),
      None => Ok(()),
    }
  }
}
