use crate::{
  orchestrator::Emitter, tracker::StateTracker, ArtifactKind, ArtifactState, ArtifactStatus,
  Error, ErrorCode, JobRun, JobRunState, Orchestrator, Result, RunId, RunOutcome, RunSignal,
};

/// Kinds a retry regenerates: everything that did not succeed.
///
/// Besides `Failed`, this picks up `Pending`/`Processing` artifacts left behind
/// by a cancelled run.
pub fn retryable_kinds(prior: &JobRunState) -> Vec<ArtifactKind> {
  prior
    .artifacts
    .iter()
    .filter(|artifact| artifact.status != ArtifactStatus::Succeeded)
    .map(|artifact| artifact.kind)
    .collect()
}

/// Fresh state for a retry run. Succeeded artifacts are copied as they are,
/// the rest start over at `Pending` with their previous weight.
pub fn seed_retry(prior: &JobRunState, run_id: RunId) -> Result<JobRunState> {
  validate_prior(prior)?;

  let artifacts = prior
    .artifacts
    .iter()
    .map(|artifact| match artifact.status {
      ArtifactStatus::Succeeded => artifact.clone(),
      _ => ArtifactState::pending(artifact.kind, artifact.weight),
    })
    .collect();

  Ok(JobRunState::new(prior.job_id.clone(), run_id, artifacts))
}

fn validate_prior(prior: &JobRunState) -> Result<()> {
  if prior.artifacts.is_empty() {
    return Err(Error::config_error(format!(
      "Prior state of job {} has no artifacts",
      prior.job_id
    )));
  }

  let total: u32 = prior.artifacts.iter().map(|a| a.weight as u32).sum();
  if total != 100 {
    return Err(Error::config_error(format!(
      "Prior state of job {} has weights summing to {}, expected 100",
      prior.job_id, total
    )));
  }

  let kinds = prior.kinds();
  if let Some(kind) = kinds
    .iter()
    .enumerate()
    .find_map(|(idx, kind)| kinds[..idx].contains(kind).then_some(kind))
  {
    return Err(Error::config_error(format!(
      "Prior state of job {} lists `{}` twice",
      prior.job_id, kind
    )));
  }

  for artifact in &prior.artifacts {
    if let Some(problem) = terminal_conflict(artifact) {
      return Err(Error::config_error(format!(
        "Prior state of job {} records `{}` as {} {}",
        prior.job_id, artifact.kind, artifact.status, problem
      )));
    }
  }

  Ok(())
}

/// A terminal artifact carries its own outcome and never the other one.
fn terminal_conflict(artifact: &ArtifactState) -> Option<&'static str> {
  match artifact.status {
    ArtifactStatus::Succeeded if artifact.artifact_ref.is_none() => Some("without an artifact ref"),
    ArtifactStatus::Succeeded if artifact.failure_reason.is_some() => {
      Some("with a failure reason")
    }
    ArtifactStatus::Failed if artifact.failure_reason.is_none() => Some("without a failure reason"),
    ArtifactStatus::Failed if artifact.artifact_ref.is_some() => Some("with an artifact ref"),
    _ => None,
  }
}

impl Orchestrator {
  /// Regenerates only what did not succeed in `prior`.
  ///
  /// Succeeded artifacts never produce events but count towards every overall
  /// figure. With nothing to retry the stream carries a single error event,
  /// no generator runs and the outcome is `prior` unchanged.
  pub fn retry(&self, prior: &JobRunState) -> Result<JobRun> {
    self.retry_with_signal(prior, RunSignal::new())
  }

  /// Same as [`Orchestrator::retry`], stopped through `signal`.
  pub fn retry_with_signal(&self, prior: &JobRunState, signal: RunSignal) -> Result<JobRun> {
    let kinds = retryable_kinds(prior);

    if kinds.is_empty() {
      validate_prior(prior)?;
      log::info!("Job {} has nothing to retry", prior.job_id);

      return Ok(self.reject_retry(prior.clone(), signal));
    }

    self.check_generators(&kinds)?;

    let seed = seed_retry(prior, RunId::new())?;
    log::info!(
      "Retrying {} of {} artifact(s) of job {}",
      kinds.len(),
      seed.artifacts.len(),
      seed.job_id
    );

    Ok(self.spawn(StateTracker::from_state(seed), kinds, signal))
  }

  fn reject_retry(&self, prior: JobRunState, signal: RunSignal) -> JobRun {
    let (mut emitter, events) = Emitter::channel(self.config().channel_capacity, signal.clone());
    let job_id = prior.job_id.clone();
    let run_id = prior.run_id.clone();

    let message = format!("Every artifact of job {} has already succeeded", job_id);
    let outcome = tokio::spawn(async move {
      match emitter
        .error(prior.job_id.clone(), ErrorCode::NothingToRetry, message)
        .await
      {
        Ok(()) => RunOutcome::Completed(prior),
        Err(_) => RunOutcome::Cancelled(prior),
      }
    });

    JobRun {
      job_id,
      run_id,
      events,
      signal,
      outcome,
    }
  }
}
