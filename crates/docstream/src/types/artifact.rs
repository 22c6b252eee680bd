use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

pub type Time = chrono::DateTime<chrono::Utc>;

/// The fixed set of documents a job can produce.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
  Report,
  Estimate,
  PhotoCompilation,
  PhotoArchive,
}

impl ArtifactKind {
  pub const ALL: [ArtifactKind; 4] = [
    ArtifactKind::Report,
    ArtifactKind::Estimate,
    ArtifactKind::PhotoCompilation,
    ArtifactKind::PhotoArchive,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      ArtifactKind::Report => "report",
      ArtifactKind::Estimate => "estimate",
      ArtifactKind::PhotoCompilation => "photo-compilation",
      ArtifactKind::PhotoArchive => "photo-archive",
    }
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl TryFrom<&str> for ArtifactKind {
  type Error = Error;

  fn try_from(value: &str) -> Result<Self, Self::Error> {
    ArtifactKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == value)
      .ok_or_else(|| Error::config_error(format!("Unknown artifact kind `{}`", value)))
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
  Pending,
  Processing,
  Succeeded,
  Failed,
}

impl ArtifactStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, ArtifactStatus::Succeeded | ArtifactStatus::Failed)
  }

  pub fn is_active(&self) -> bool {
    matches!(self, ArtifactStatus::Pending | ArtifactStatus::Processing)
  }
}

impl fmt::Display for ArtifactStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ArtifactStatus::Pending => "pending",
      ArtifactStatus::Processing => "processing",
      ArtifactStatus::Succeeded => "succeeded",
      ArtifactStatus::Failed => "failed",
    };
    f.write_str(name)
  }
}

/// Opaque pointer to a finished artifact, e.g. a storage key or URL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
  pub fn new(location: impl Into<String>) -> Self {
    ArtifactRef(location.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for ArtifactRef {
  fn from(value: &str) -> Self {
    ArtifactRef::new(value)
  }
}

impl From<String> for ArtifactRef {
  fn from(value: String) -> Self {
    ArtifactRef::new(value)
  }
}

impl fmt::Display for ArtifactRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FailureReason {
  /// The generator reported a failure of its own.
  Generator { message: String },
  /// The generator did not finish within its per-kind timeout.
  Timeout { after_ms: u64 },
  /// The job-level deadline elapsed before this artifact finished.
  DeadlineExceeded,
  /// An illegal state transition was observed. Always a defect.
  Internal { message: String },
}

impl FailureReason {
  pub fn generator(message: impl Into<String>) -> Self {
    FailureReason::Generator {
      message: message.into(),
    }
  }

  pub fn timeout(after: Duration) -> Self {
    FailureReason::Timeout {
      after_ms: after.as_millis() as u64,
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    FailureReason::Internal {
      message: message.into(),
    }
  }

  pub fn is_timeout(&self) -> bool {
    matches!(
      self,
      FailureReason::Timeout { .. } | FailureReason::DeadlineExceeded
    )
  }
}

impl fmt::Display for FailureReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FailureReason::Generator { message } => write!(f, "{}", message),
      FailureReason::Timeout { after_ms } => {
        write!(f, "timed out after {}", humantime::format_duration(Duration::from_millis(*after_ms)))
      }
      FailureReason::DeadlineExceeded => write!(f, "job deadline exceeded"),
      FailureReason::Internal { message } => write!(f, "internal error: {}", message),
    }
  }
}

/// State of one artifact within one job run.
///
/// `artifact_ref` is only set once `Succeeded`, `failure_reason` only once `Failed`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactState {
  pub kind: ArtifactKind,
  pub status: ArtifactStatus,
  pub progress: u8,
  pub message: String,
  pub weight: u8,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artifact_ref: Option<ArtifactRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub failure_reason: Option<FailureReason>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub started_at: Option<Time>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<Time>,
}

impl ArtifactState {
  pub fn pending(kind: ArtifactKind, weight: u8) -> Self {
    ArtifactState {
      kind,
      status: ArtifactStatus::Pending,
      progress: 0,
      message: String::new(),
      weight,
      artifact_ref: None,
      failure_reason: None,
      started_at: None,
      completed_at: None,
    }
  }

  /// Weighted progress in hundredths of a percentage point.
  ///
  /// Failed artifacts contribute nothing, whatever progress they froze at.
  pub fn contribution(&self) -> u32 {
    let progress = match self.status {
      ArtifactStatus::Failed => 0,
      ArtifactStatus::Succeeded => 100,
      _ => self.progress as u32,
    };

    progress * self.weight as u32
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }
}
