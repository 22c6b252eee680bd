use crate::{ArtifactRef, Error, FailureReason, Result};
use std::{
  pin::Pin,
  task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::Stream;

pub const DEFAULT_PROGRESS_CAPACITY: usize = 8;

/// What a generator reports back while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorUpdate {
  Progress { progress: u8, message: String },
  Succeeded(ArtifactRef),
  Failed(FailureReason),
}

impl GeneratorUpdate {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, GeneratorUpdate::Progress { .. })
  }
}

/// Generator side of a progress channel.
///
/// `succeeded` and `failed` consume the sender, so nothing can be reported
/// after the result. Dropping it without either counts as a defect of the
/// generator.
pub struct ProgressSender {
  tx: mpsc::Sender<GeneratorUpdate>,
}

impl ProgressSender {
  /// Waits while the orchestrator is behind. Fails once the orchestrator has
  /// stopped listening (cancelled or timed out), which is the cue to stop work.
  pub async fn progress(&self, progress: u8, message: impl Into<String>) -> Result<()> {
    self
      .send(GeneratorUpdate::Progress {
        progress,
        message: message.into(),
      })
      .await
  }

  pub async fn succeeded(self, artifact_ref: impl Into<ArtifactRef>) -> Result<()> {
    self
      .send(GeneratorUpdate::Succeeded(artifact_ref.into()))
      .await
  }

  pub async fn failed(self, message: impl Into<String>) -> Result<()> {
    self
      .send(GeneratorUpdate::Failed(FailureReason::generator(message)))
      .await
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }

  async fn send(&self, update: GeneratorUpdate) -> Result<()> {
    self
      .tx
      .send(update)
      .await
      .map_err(|_| Error::channel_closed("progress receiver dropped"))
  }
}

/// Orchestrator side of a progress channel.
pub struct ProgressReceiver {
  rx: mpsc::Receiver<GeneratorUpdate>,
}

impl Stream for ProgressReceiver {
  type Item = GeneratorUpdate;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.rx.poll_recv(cx)
  }
}

pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
  let (tx, rx) = mpsc::channel(capacity.max(1));

  (ProgressSender { tx }, ProgressReceiver { rx })
}
