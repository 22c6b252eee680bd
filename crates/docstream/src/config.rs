use crate::{tracker::equal_weights, ArtifactKind, Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

pub const DEFAULT_ARTIFACT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UserArtifactConfig {
  pub kind: ArtifactKind,
  pub weight: Option<u8>,
  pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UserGenerationConfig {
  pub artifacts: Vec<UserArtifactConfig>,
  pub job_timeout: Option<String>,
  pub max_concurrency: Option<usize>,
  pub channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactConfig {
  pub kind: ArtifactKind,
  pub weight: Option<u8>,
  pub timeout: Duration,
}

impl ArtifactConfig {
  pub fn new(kind: ArtifactKind) -> Self {
    ArtifactConfig {
      kind,
      weight: None,
      timeout: DEFAULT_ARTIFACT_TIMEOUT,
    }
  }

  pub fn weight(mut self, weight: u8) -> Self {
    self.weight = Some(weight);
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }
}

/// How one orchestrator generates the artifacts of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
  /// Generation order.
  pub artifacts: Vec<ArtifactConfig>,
  pub job_timeout: Option<Duration>,
  /// `1` runs artifacts strictly one after another.
  pub max_concurrency: usize,
  /// Events buffered before emission waits on the consumer.
  pub channel_capacity: usize,
}

impl Default for GenerationConfig {
  /// All four kinds, equal weights, sequential.
  fn default() -> Self {
    GenerationConfig {
      artifacts: ArtifactKind::ALL.into_iter().map(ArtifactConfig::new).collect(),
      job_timeout: None,
      max_concurrency: 1,
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    }
  }
}

impl GenerationConfig {
  pub fn builder() -> GenerationConfigBuilder {
    GenerationConfigBuilder::new()
  }

  pub fn kinds(&self) -> Vec<ArtifactKind> {
    self.artifacts.iter().map(|a| a.kind).collect()
  }

  pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactConfig> {
    self.artifacts.iter().find(|a| a.kind == kind)
  }

  pub fn timeout_for(&self, kind: ArtifactKind) -> Duration {
    self
      .artifact(kind)
      .map(|a| a.timeout)
      .unwrap_or(DEFAULT_ARTIFACT_TIMEOUT)
  }

  /// Explicit weights for `kinds`. Empty when weights are left to the default split.
  pub fn weights_for(&self, kinds: &[ArtifactKind]) -> HashMap<ArtifactKind, u8> {
    kinds
      .iter()
      .filter_map(|kind| {
        self
          .artifact(*kind)
          .and_then(|a| a.weight)
          .map(|weight| (*kind, weight))
      })
      .collect()
  }

  /// Weight each configured kind ends up with.
  pub fn effective_weights(&self) -> Vec<(ArtifactKind, u8)> {
    let defaults = equal_weights(self.artifacts.len());

    self
      .artifacts
      .iter()
      .zip(defaults)
      .map(|(a, default)| (a.kind, a.weight.unwrap_or(default)))
      .collect()
  }

  fn validate(&self) -> Result<()> {
    if self.artifacts.is_empty() {
      return Err(Error::config_error(
        "Generation config must have at least one artifact",
      ));
    }

    let mut seen = Vec::with_capacity(self.artifacts.len());
    for artifact in &self.artifacts {
      if seen.contains(&artifact.kind) {
        return Err(Error::config_error(format!(
          "Artifact `{}` is configured more than once",
          artifact.kind
        )));
      }
      seen.push(artifact.kind);

      if artifact.timeout.is_zero() {
        return Err(Error::config_error(format!(
          "Timeout of `{}` must be greater than zero",
          artifact.kind
        )));
      }
    }

    let weighted = self.artifacts.iter().filter(|a| a.weight.is_some()).count();
    if weighted != 0 && weighted != self.artifacts.len() {
      return Err(Error::config_error(
        "Either every artifact has a weight or none has",
      ));
    }

    if weighted != 0 {
      let total: u32 = self
        .artifacts
        .iter()
        .filter_map(|a| a.weight)
        .map(|w| w as u32)
        .sum();
      if total != 100 {
        return Err(Error::config_error(format!(
          "Artifact weights must sum to 100, got {}",
          total
        )));
      }
    }

    if self.max_concurrency == 0 {
      return Err(Error::config_error("max-concurrency must be at least 1"));
    }

    if self.channel_capacity == 0 {
      return Err(Error::config_error("channel-capacity must be at least 1"));
    }

    Ok(())
  }
}

fn parse_duration(value: &str, field: &str) -> Result<Duration> {
  humantime::parse_duration(value).map_err(|err| {
    log::error!("Invalid {} `{}`: {}", field, value, err);
    Error::config_error(format!(
      "Invalid {} `{}`. The format should like `90s` or `10m`.",
      field, value
    ))
  })
}

impl TryFrom<UserGenerationConfig> for GenerationConfig {
  type Error = Error;

  fn try_from(user: UserGenerationConfig) -> Result<Self> {
    let mut builder = GenerationConfig::builder();

    for artifact in user.artifacts {
      let mut config = ArtifactConfig::new(artifact.kind);
      if let Some(weight) = artifact.weight {
        config = config.weight(weight);
      }
      if let Some(timeout) = artifact.timeout {
        config = config.timeout(parse_duration(&timeout, "timeout")?);
      }
      builder = builder.artifact(config);
    }

    if let Some(job_timeout) = user.job_timeout {
      builder = builder.job_timeout(parse_duration(&job_timeout, "job-timeout")?);
    }
    if let Some(max_concurrency) = user.max_concurrency {
      builder = builder.max_concurrency(max_concurrency);
    }
    if let Some(channel_capacity) = user.channel_capacity {
      builder = builder.channel_capacity(channel_capacity);
    }

    builder.build()
  }
}

impl TryFrom<&str> for GenerationConfig {
  type Error = Error;

  fn try_from(value: &str) -> Result<Self> {
    let user: UserGenerationConfig = serde_yaml::from_str(value)
      .map_err(|e| Error::config_error(format!("Failed to parse generation config: {}", e)))?;

    Self::try_from(user)
  }
}

impl TryFrom<String> for GenerationConfig {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> {
    Self::try_from(value.as_str())
  }
}

pub struct GenerationConfigBuilder {
  artifacts: Vec<ArtifactConfig>,
  job_timeout: Option<Duration>,
  max_concurrency: usize,
  channel_capacity: usize,
}

impl GenerationConfigBuilder {
  pub fn new() -> Self {
    GenerationConfigBuilder {
      artifacts: vec![],
      job_timeout: None,
      max_concurrency: 1,
      channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    }
  }

  pub fn artifact(mut self, artifact: ArtifactConfig) -> Self {
    self.artifacts.push(artifact);
    self
  }

  pub fn kind(self, kind: ArtifactKind) -> Self {
    self.artifact(ArtifactConfig::new(kind))
  }

  pub fn job_timeout(mut self, job_timeout: Duration) -> Self {
    self.job_timeout = Some(job_timeout);
    self
  }

  pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
    self.max_concurrency = max_concurrency;
    self
  }

  pub fn channel_capacity(mut self, channel_capacity: usize) -> Self {
    self.channel_capacity = channel_capacity;
    self
  }

  pub fn build(self) -> Result<GenerationConfig> {
    let config = GenerationConfig {
      artifacts: self.artifacts,
      job_timeout: self.job_timeout,
      max_concurrency: self.max_concurrency,
      channel_capacity: self.channel_capacity,
    };

    config.validate()?;

    Ok(config)
  }
}

impl Default for GenerationConfigBuilder {
  fn default() -> Self {
    Self::new()
  }
}
