#![allow(dead_code)]

use docstream::{
  progress_channel, ArtifactGenerator, Error, GenerateResponse, GenerationContext, ProgressEvent,
  Signal, DEFAULT_PROGRESS_CAPACITY,
};
use parking_lot::Mutex;
use std::{
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  time::Duration,
};

/// Records how a generator was used.
#[derive(Clone, Default)]
pub struct Recorder {
  calls: Arc<AtomicUsize>,
  running: Arc<AtomicUsize>,
  max_running: Arc<AtomicUsize>,
  signals: Arc<Mutex<Vec<Signal>>>,
}

impl Recorder {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn max_running(&self) -> usize {
    self.max_running.load(Ordering::SeqCst)
  }

  pub fn signals(&self) -> Vec<Signal> {
    self.signals.lock().clone()
  }

  fn enter(&self) {
    let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_running.fetch_max(running, Ordering::SeqCst);
  }

  fn leave(&self) {
    self.running.fetch_sub(1, Ordering::SeqCst);
  }
}

#[derive(Clone)]
enum Outcome {
  Succeed(String),
  Fail(String),
  Reject(String),
  DropSender,
  Hang,
}

/// Reports `steps` as progress, `delay` apart, then resolves as scripted.
/// Stops as soon as its signal is raised.
#[derive(Clone)]
pub struct ScriptedGenerator {
  steps: Vec<u8>,
  delay: Duration,
  start_delay: Duration,
  outcome: Outcome,
  recorder: Recorder,
}

impl ScriptedGenerator {
  fn new(outcome: Outcome) -> Self {
    ScriptedGenerator {
      steps: vec![],
      delay: Duration::ZERO,
      start_delay: Duration::ZERO,
      outcome,
      recorder: Recorder::default(),
    }
  }

  pub fn succeed(artifact_ref: impl Into<String>) -> Self {
    Self::new(Outcome::Succeed(artifact_ref.into()))
  }

  pub fn fail(message: impl Into<String>) -> Self {
    Self::new(Outcome::Fail(message.into()))
  }

  /// `generate` itself returns an error.
  pub fn reject(message: impl Into<String>) -> Self {
    Self::new(Outcome::Reject(message.into()))
  }

  pub fn drop_sender() -> Self {
    Self::new(Outcome::DropSender)
  }

  pub fn hang() -> Self {
    Self::new(Outcome::Hang)
  }

  pub fn steps(mut self, steps: &[u8]) -> Self {
    self.steps = steps.to_vec();
    self
  }

  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  /// Delay inside `generate`, before any receiver is handed back.
  pub fn start_delay(mut self, start_delay: Duration) -> Self {
    self.start_delay = start_delay;
    self
  }

  pub fn record(mut self, recorder: &Recorder) -> Self {
    self.recorder = recorder.clone();
    self
  }
}

#[docstream::async_trait]
impl ArtifactGenerator for ScriptedGenerator {
  async fn generate(&self, ctx: GenerationContext) -> GenerateResponse {
    self.recorder.calls.fetch_add(1, Ordering::SeqCst);

    if let Outcome::Reject(message) = &self.outcome {
      return Err(Error::error(message));
    }

    if !self.start_delay.is_zero() {
      tokio::time::sleep(self.start_delay).await;
    }

    let (tx, rx) = progress_channel(DEFAULT_PROGRESS_CAPACITY);
    let script = self.clone();

    tokio::task::spawn(async move {
      script.recorder.enter();

      let work = async {
        for step in &script.steps {
          tokio::time::sleep(script.delay).await;
          tx.progress(*step, format!("{}% done", step)).await?;
        }
        tokio::time::sleep(script.delay).await;

        match &script.outcome {
          Outcome::Succeed(artifact_ref) => tx.succeeded(artifact_ref.clone()).await,
          Outcome::Fail(message) => tx.failed(message.clone()).await,
          Outcome::Hang => {
            std::future::pending::<()>().await;
            Ok(())
          }
          Outcome::DropSender | Outcome::Reject(_) => Ok(()),
        }
      };

      // A signal raised on the same tick as the last step still gets recorded
      tokio::select! {
        biased;
        signal = ctx.signal.recv() => {
          script.recorder.signals.lock().push(signal);
        }
        res = work => {
          if let Err(err) = res {
            log::debug!("Generator for {} stopped: {}", ctx.kind, err);
          }
        }
      }

      script.recorder.leave();
    });

    Ok(rx)
  }
}

/// Events that belong to one kind, in order.
pub fn events_for(events: &[ProgressEvent], kind: docstream::ArtifactKind) -> Vec<ProgressEvent> {
  events
    .iter()
    .filter(|event| event.kind() == Some(kind))
    .cloned()
    .collect()
}

pub fn progress_events(events: &[ProgressEvent]) -> Vec<docstream::ArtifactEvent> {
  events
    .iter()
    .filter_map(|event| match event {
      ProgressEvent::Progress(event) => Some(event.clone()),
      _ => None,
    })
    .collect()
}
