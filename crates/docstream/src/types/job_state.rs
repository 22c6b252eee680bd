use super::{ArtifactKind, ArtifactState, ArtifactStatus, JobId, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
  Processing,
  Complete,
  PartialFailure,
  Failed,
}

impl OverallStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, OverallStatus::Processing)
  }

  /// Folds per-artifact statuses into the job status.
  pub fn derive(artifacts: &[ArtifactState]) -> Self {
    if artifacts.iter().any(|a| a.status.is_active()) {
      return OverallStatus::Processing;
    }

    let succeeded = artifacts
      .iter()
      .filter(|a| a.status == ArtifactStatus::Succeeded)
      .count();

    if succeeded == artifacts.len() {
      OverallStatus::Complete
    } else if succeeded > 0 {
      OverallStatus::PartialFailure
    } else {
      OverallStatus::Failed
    }
  }
}

impl fmt::Display for OverallStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      OverallStatus::Processing => "processing",
      OverallStatus::Complete => "complete",
      OverallStatus::PartialFailure => "partial_failure",
      OverallStatus::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Aggregate state of one orchestrator invocation.
///
/// `artifacts` keeps the configured generation order. The overall fields are
/// derived and kept in sync by [`JobRunState::recompute`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRunState {
  pub job_id: JobId,
  pub run_id: RunId,
  pub artifacts: Vec<ArtifactState>,
  pub overall_status: OverallStatus,
  pub overall_progress: u8,
}

impl JobRunState {
  pub(crate) fn new(job_id: JobId, run_id: RunId, artifacts: Vec<ArtifactState>) -> Self {
    let mut state = JobRunState {
      job_id,
      run_id,
      artifacts,
      overall_status: OverallStatus::Processing,
      overall_progress: 0,
    };
    state.recompute();
    state
  }

  pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactState> {
    self.artifacts.iter().find(|a| a.kind == kind)
  }

  pub(crate) fn artifact_mut(&mut self, kind: ArtifactKind) -> Option<&mut ArtifactState> {
    self.artifacts.iter_mut().find(|a| a.kind == kind)
  }

  pub fn kinds(&self) -> Vec<ArtifactKind> {
    self.artifacts.iter().map(|a| a.kind).collect()
  }

  pub fn kinds_with_status(&self, status: ArtifactStatus) -> Vec<ArtifactKind> {
    self
      .artifacts
      .iter()
      .filter(|a| a.status == status)
      .map(|a| a.kind)
      .collect()
  }

  pub fn is_terminal(&self) -> bool {
    self.overall_status.is_terminal()
  }

  pub(crate) fn recompute(&mut self) {
    self.overall_status = OverallStatus::derive(&self.artifacts);

    // Weights sum to 100, so the total is at most 100 * 100
    let total: u32 = self.artifacts.iter().map(|a| a.contribution()).sum();
    self.overall_progress = (total / 100).min(100) as u8;
  }
}
