use super::{ArtifactKind, ArtifactStatus};

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("Invalid generation config: {0}")]
  ConfigError(String),

  #[error("Invalid transition of `{kind}` from {from} to {to}: {reason}")]
  InvalidTransition {
    kind: ArtifactKind,
    from: ArtifactStatus,
    to: ArtifactStatus,
    reason: String,
  },

  #[error("Malformed event stream: {0}")]
  CodecError(String),

  #[error("Signal error: {0}")]
  SignalError(String),

  #[error("Channel closed: {0}")]
  ChannelClosed(String),

  #[error("Error: {0}")]
  Error(String),

  #[error("IO error: {0}")]
  IOError(#[from] std::io::Error),
}

impl Error {
  pub fn config_error<T: ToString>(message: T) -> Self {
    Self::ConfigError(message.to_string())
  }

  pub fn invalid_transition<T: ToString>(
    kind: ArtifactKind,
    from: ArtifactStatus,
    to: ArtifactStatus,
    reason: T,
  ) -> Self {
    Self::InvalidTransition {
      kind,
      from,
      to,
      reason: reason.to_string(),
    }
  }

  pub fn codec_error<T: ToString>(message: T) -> Self {
    Self::CodecError(message.to_string())
  }

  pub fn signal_error<T: ToString>(message: T) -> Self {
    Self::SignalError(message.to_string())
  }

  pub fn channel_closed<T: ToString>(message: T) -> Self {
    Self::ChannelClosed(message.to_string())
  }

  pub fn io_error(source: std::io::Error) -> Self {
    Self::IOError(source)
  }

  pub fn error<T: ToString>(message: T) -> Self {
    Self::Error(message.to_string())
  }
}

impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Self::codec_error(err)
  }
}

// implement PartialEq for Error so that we can compare errors in tests
impl PartialEq for Error {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::ConfigError(a), Self::ConfigError(b)) => a == b,
      (
        Self::InvalidTransition {
          kind: k1,
          from: f1,
          to: t1,
          reason: r1,
        },
        Self::InvalidTransition {
          kind: k2,
          from: f2,
          to: t2,
          reason: r2,
        },
      ) => k1 == k2 && f1 == f2 && t1 == t2 && r1 == r2,
      (Self::CodecError(a), Self::CodecError(b)) => a == b,
      (Self::SignalError(a), Self::SignalError(b)) => a == b,
      (Self::ChannelClosed(a), Self::ChannelClosed(b)) => a == b,
      (Self::IOError(a), Self::IOError(b)) => a.kind() == b.kind(),
      (Self::Error(a), Self::Error(b)) => a == b,
      _ => false,
    }
  }
}
