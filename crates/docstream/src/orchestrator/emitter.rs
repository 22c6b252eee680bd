use crate::{
  codec::EventCodec, ArtifactKind, ErrorCode, JobId, JobRunState, ProgressEvent, Result,
  RunSignal,
};
use bytes::Bytes;
use std::{
  pin::Pin,
  task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

/// Why emission stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupt {
  /// The job signal was raised.
  Cancelled,
  /// The [`EventStream`] was dropped.
  Disconnected,
}

pub(crate) type Emitted = std::result::Result<(), Interrupt>;

/// Write side of a run's event stream. Owns the sequence counter, so events
/// leave in exactly the order they were emitted.
pub(crate) struct Emitter {
  tx: mpsc::Sender<ProgressEvent>,
  signal: RunSignal,
  seq: u64,
}

impl Emitter {
  pub fn channel(capacity: usize, signal: RunSignal) -> (Emitter, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let emitter = Emitter { tx, signal, seq: 0 };

    (emitter, EventStream { rx })
  }

  pub async fn artifact(&mut self, kind: ArtifactKind, state: &JobRunState) -> Emitted {
    let seq = self.next_seq();
    match ProgressEvent::progress(seq, kind, state) {
      Some(event) => self.send(event).await,
      None => {
        log::error!("Artifact {} is missing from job {}", kind, state.job_id);
        Ok(())
      }
    }
  }

  pub async fn summary(&mut self, state: &JobRunState) -> Emitted {
    let seq = self.next_seq();
    self.send(ProgressEvent::summary(seq, state)).await
  }

  pub async fn error(
    &mut self,
    job_id: JobId,
    code: ErrorCode,
    message: impl Into<String>,
  ) -> Emitted {
    let seq = self.next_seq();
    self
      .send(ProgressEvent::error(seq, job_id, code, message))
      .await
  }

  /// Resolves once the [`EventStream`] has been dropped.
  pub async fn closed(&self) {
    self.tx.closed().await
  }

  fn next_seq(&mut self) -> u64 {
    self.seq += 1;
    self.seq
  }

  /// Waits for room in the channel. A cancel that arrives while waiting wins.
  async fn send(&self, event: ProgressEvent) -> Emitted {
    log::trace!(
      "Emitting {} event #{} of job {}",
      event.event_type(),
      event.seq(),
      event.job_id()
    );

    tokio::select! {
      biased;
      _ = self.signal.recv() => Err(Interrupt::Cancelled),
      res = self.tx.send(event) => res.map_err(|_| Interrupt::Disconnected),
    }
  }
}

/// Events of one run, in emission order. Ends after the summary event, or
/// early when the run is cancelled.
#[derive(Debug)]
pub struct EventStream {
  rx: mpsc::Receiver<ProgressEvent>,
}

impl EventStream {
  /// Encodes every event as a text frame, ready to be written to a transport.
  pub fn framed(self) -> impl Stream<Item = Result<Bytes>> + Send + 'static {
    self.map(|event| EventCodec::encode_frame(&event).map(Bytes::from))
  }
}

impl Stream for EventStream {
  type Item = ProgressEvent;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.rx.poll_recv(cx)
  }
}
