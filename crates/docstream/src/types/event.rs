use super::{
  ArtifactKind, ArtifactRef, ArtifactStatus, FailureReason, JobId, JobRunState, OverallStatus,
  RunId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Emitted on every state transition of one artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEvent {
  pub seq: u64,
  pub job_id: JobId,
  pub run_id: RunId,
  pub kind: ArtifactKind,
  pub status: ArtifactStatus,
  pub progress: u8,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifact_ref: Option<ArtifactRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure_reason: Option<FailureReason>,
  pub overall_status: OverallStatus,
  pub overall_progress: u8,
}

/// Terminal event of a run that was not cancelled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEvent {
  pub seq: u64,
  pub job_id: JobId,
  pub run_id: RunId,
  pub overall_status: OverallStatus,
  pub overall_progress: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
  NothingToRetry,
}

/// Emitted instead of any orchestration when a request is rejected up front.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
  pub seq: u64,
  pub job_id: JobId,
  pub code: ErrorCode,
  pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
  Progress,
  Summary,
  Error,
}

impl EventType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EventType::Progress => "progress",
      EventType::Summary => "summary",
      EventType::Error => "error",
    }
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
  Progress(ArtifactEvent),
  Summary(SummaryEvent),
  Error(ErrorEvent),
}

impl ProgressEvent {
  pub(crate) fn progress(seq: u64, kind: ArtifactKind, state: &JobRunState) -> Option<Self> {
    let artifact = state.artifact(kind)?;

    Some(ProgressEvent::Progress(ArtifactEvent {
      seq,
      job_id: state.job_id.clone(),
      run_id: state.run_id.clone(),
      kind,
      status: artifact.status,
      progress: artifact.progress,
      message: artifact.message.clone(),
      artifact_ref: artifact.artifact_ref.clone(),
      failure_reason: artifact.failure_reason.clone(),
      overall_status: state.overall_status,
      overall_progress: state.overall_progress,
    }))
  }

  pub(crate) fn summary(seq: u64, state: &JobRunState) -> Self {
    ProgressEvent::Summary(SummaryEvent {
      seq,
      job_id: state.job_id.clone(),
      run_id: state.run_id.clone(),
      overall_status: state.overall_status,
      overall_progress: state.overall_progress,
    })
  }

  pub(crate) fn error(seq: u64, job_id: JobId, code: ErrorCode, message: impl Into<String>) -> Self {
    ProgressEvent::Error(ErrorEvent {
      seq,
      job_id,
      code,
      message: message.into(),
    })
  }

  pub fn event_type(&self) -> EventType {
    match self {
      ProgressEvent::Progress(_) => EventType::Progress,
      ProgressEvent::Summary(_) => EventType::Summary,
      ProgressEvent::Error(_) => EventType::Error,
    }
  }

  pub fn seq(&self) -> u64 {
    match self {
      ProgressEvent::Progress(event) => event.seq,
      ProgressEvent::Summary(event) => event.seq,
      ProgressEvent::Error(event) => event.seq,
    }
  }

  pub fn job_id(&self) -> &JobId {
    match self {
      ProgressEvent::Progress(event) => &event.job_id,
      ProgressEvent::Summary(event) => &event.job_id,
      ProgressEvent::Error(event) => &event.job_id,
    }
  }

  /// `None` for summary and error events.
  pub fn kind(&self) -> Option<ArtifactKind> {
    match self {
      ProgressEvent::Progress(event) => Some(event.kind),
      _ => None,
    }
  }

  pub fn is_summary(&self) -> bool {
    matches!(self, ProgressEvent::Summary(_))
  }
}
