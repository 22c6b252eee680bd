use super::EventStream;
use crate::{Error, JobId, JobRunState, ProgressEvent, Result, RunId, RunSignal};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// How a run ended, with the state it ended in.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
  /// The summary event was emitted. Every artifact is terminal.
  Completed(JobRunState),
  /// Stopped before the summary. Unfinished artifacts keep their last status.
  Cancelled(JobRunState),
}

impl RunOutcome {
  pub fn state(&self) -> &JobRunState {
    match self {
      RunOutcome::Completed(state) | RunOutcome::Cancelled(state) => state,
    }
  }

  pub fn into_state(self) -> JobRunState {
    match self {
      RunOutcome::Completed(state) | RunOutcome::Cancelled(state) => state,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, RunOutcome::Cancelled(_))
  }
}

/// Handle to a spawned run.
///
/// Dropping `events` cancels the run the next time it tries to emit.
#[derive(Debug)]
pub struct JobRun {
  pub job_id: JobId,
  pub run_id: RunId,
  pub events: EventStream,
  pub signal: RunSignal,
  pub outcome: JoinHandle<RunOutcome>,
}

impl JobRun {
  pub fn cancel(&self) -> Result<()> {
    self.signal.cancel()
  }

  /// Drains every event, then waits for the outcome.
  pub async fn collect(mut self) -> Result<(Vec<ProgressEvent>, RunOutcome)> {
    let mut events = Vec::new();
    while let Some(event) = self.events.next().await {
      events.push(event);
    }

    let outcome = self.outcome.await.map_err(|err| {
      Error::error(format!(
        "Run {} of job {} did not finish: {}",
        self.run_id, self.job_id, err
      ))
    })?;

    Ok((events, outcome))
  }
}
