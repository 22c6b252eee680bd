use crate::{
  ArtifactKind, ArtifactRef, ArtifactState, ArtifactStatus, Error, FailureReason, JobId,
  JobRunState, Result, RunId,
};
use std::collections::{HashMap, HashSet};

/// A requested change to one artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
  Processing {
    progress: u8,
    message: Option<String>,
  },
  Succeeded {
    artifact_ref: ArtifactRef,
    message: Option<String>,
  },
  Failed {
    reason: FailureReason,
    message: Option<String>,
  },
}

impl Transition {
  pub fn processing(progress: u8, message: impl Into<String>) -> Self {
    Transition::Processing {
      progress,
      message: Some(message.into()),
    }
  }

  pub fn succeeded(artifact_ref: impl Into<ArtifactRef>) -> Self {
    Transition::Succeeded {
      artifact_ref: artifact_ref.into(),
      message: None,
    }
  }

  pub fn failed(reason: FailureReason) -> Self {
    Transition::Failed {
      reason,
      message: None,
    }
  }

  pub fn status(&self) -> ArtifactStatus {
    match self {
      Transition::Processing { .. } => ArtifactStatus::Processing,
      Transition::Succeeded { .. } => ArtifactStatus::Succeeded,
      Transition::Failed { .. } => ArtifactStatus::Failed,
    }
  }
}

/// Owns the [`JobRunState`] of one run. Only the orchestrator mutates it;
/// everything else gets snapshots.
#[derive(Debug)]
pub struct StateTracker {
  state: JobRunState,
}

impl StateTracker {
  /// Creates every artifact at `Pending`/0.
  ///
  /// An empty `weights` map splits 100 evenly across `kinds`. Otherwise it must
  /// name exactly the given kinds and sum to 100.
  pub fn initialize(
    job_id: JobId,
    run_id: RunId,
    kinds: &[ArtifactKind],
    weights: &HashMap<ArtifactKind, u8>,
  ) -> Result<Self> {
    let weights = resolve_weights(kinds, weights)?;

    let artifacts = kinds
      .iter()
      .zip(weights)
      .map(|(kind, weight)| ArtifactState::pending(*kind, weight))
      .collect();

    Ok(StateTracker {
      state: JobRunState::new(job_id, run_id, artifacts),
    })
  }

  /// Resumes from an existing state, e.g. a retry seed.
  pub fn from_state(mut state: JobRunState) -> Self {
    state.recompute();
    StateTracker { state }
  }

  pub fn transition(&mut self, kind: ArtifactKind, transition: Transition) -> Result<JobRunState> {
    let artifact = self.state.artifact_mut(kind).ok_or_else(|| {
      Error::invalid_transition(
        kind,
        ArtifactStatus::Pending,
        transition.status(),
        "artifact is not part of this run",
      )
    })?;

    let from = artifact.status;
    let to = transition.status();

    if from.is_terminal() {
      return Err(Error::invalid_transition(
        kind,
        from,
        to,
        "artifact is already terminal",
      ));
    }

    let now = chrono::Utc::now();

    match transition {
      Transition::Processing { progress, message } => {
        if progress > 100 {
          return Err(Error::invalid_transition(
            kind,
            from,
            to,
            format!("progress {} is out of range", progress),
          ));
        }
        if from == ArtifactStatus::Processing && progress < artifact.progress {
          return Err(Error::invalid_transition(
            kind,
            from,
            to,
            format!("progress decreased from {} to {}", artifact.progress, progress),
          ));
        }

        artifact.status = ArtifactStatus::Processing;
        artifact.progress = progress;
        if let Some(message) = message {
          artifact.message = message;
        }
      }
      Transition::Succeeded {
        artifact_ref,
        message,
      } => {
        artifact.status = ArtifactStatus::Succeeded;
        artifact.progress = 100;
        artifact.artifact_ref = Some(artifact_ref);
        artifact.completed_at = Some(now);
        if let Some(message) = message {
          artifact.message = message;
        }
      }
      Transition::Failed { reason, message } => {
        artifact.status = ArtifactStatus::Failed;
        artifact.message = message.unwrap_or_else(|| reason.to_string());
        artifact.failure_reason = Some(reason);
        artifact.completed_at = Some(now);
      }
    }

    if artifact.started_at.is_none() {
      artifact.started_at = Some(now);
    }

    self.state.recompute();

    Ok(self.snapshot())
  }

  pub fn snapshot(&self) -> JobRunState {
    self.state.clone()
  }

  pub fn state(&self) -> &JobRunState {
    &self.state
  }
}

pub(crate) fn equal_weights(count: usize) -> Vec<u8> {
  if count == 0 {
    return vec![];
  }

  let base = 100 / count;
  let remainder = 100 % count;

  // Leftover points go to the earliest kinds
  (0..count)
    .map(|idx| (base + usize::from(idx < remainder)) as u8)
    .collect()
}

fn resolve_weights(kinds: &[ArtifactKind], weights: &HashMap<ArtifactKind, u8>) -> Result<Vec<u8>> {
  if kinds.is_empty() {
    return Err(Error::config_error("At least one artifact kind is required"));
  }
  if kinds.len() > 100 {
    return Err(Error::config_error("At most 100 artifact kinds are supported"));
  }

  let mut seen = HashSet::new();
  for kind in kinds {
    if !seen.insert(kind) {
      return Err(Error::config_error(format!(
        "Artifact kind `{}` is listed more than once",
        kind
      )));
    }
  }

  if weights.is_empty() {
    return Ok(equal_weights(kinds.len()));
  }

  if let Some(extra) = weights.keys().find(|kind| !kinds.contains(kind)) {
    return Err(Error::config_error(format!(
      "Weight given for `{}`, which is not generated in this run",
      extra
    )));
  }

  let resolved = kinds
    .iter()
    .map(|kind| {
      weights
        .get(kind)
        .copied()
        .ok_or_else(|| Error::config_error(format!("Missing weight for `{}`", kind)))
    })
    .collect::<Result<Vec<u8>>>()?;

  let total: u32 = resolved.iter().map(|w| *w as u32).sum();
  if total != 100 {
    return Err(Error::config_error(format!(
      "Artifact weights must sum to 100, got {}",
      total
    )));
  }

  Ok(resolved)
}
