use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the business record a job produces artifacts for.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Hash, Eq)]
#[serde(transparent)]
pub struct JobId(String);

/// Identifies one orchestrator invocation (an initial run or a retry) of a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Hash, Eq)]
#[serde(transparent)]
pub struct RunId(String);

impl JobId {
  pub fn new(id: impl Into<String>) -> Self {
    JobId(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl RunId {
  pub fn new() -> Self {
    RunId(uuid::Uuid::new_v4().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for RunId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl fmt::Display for RunId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<&str> for JobId {
  type Error = Error;

  fn try_from(value: &str) -> Result<Self, Self::Error> {
    let value = value.trim();
    if value.is_empty() {
      Err(Error::config_error("JobId cannot be empty"))
    } else {
      Ok(JobId(value.to_string()))
    }
  }
}

impl TryFrom<String> for JobId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::try_from(value.as_str())
  }
}
