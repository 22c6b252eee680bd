use super::{
  emitter::{Emitted, Emitter, Interrupt},
  supervisor::{Supervised, Supervision},
  RunOutcome,
};
use crate::{
  tracker::{StateTracker, Transition},
  ArtifactKind, FailureReason, GenerationConfig, GenerationContext, GeneratorUpdate, Generators,
  ProgressReceiver, Result, RunSignal,
};
use std::{
  collections::{HashMap, VecDeque},
  sync::Arc,
  time::Duration,
};
use tokio::time::Instant;
use tokio_stream::{StreamExt, StreamMap};

enum Launch {
  Started(Result<ProgressReceiver>),
  TimedOut,
  JobDeadline,
}

/// The single writer of one run. Owns the tracker, starts generators in
/// configured order and turns every applied transition into exactly one event.
pub(crate) struct Driver {
  config: Arc<GenerationConfig>,
  generators: Generators,
  tracker: StateTracker,
  emitter: Emitter,
  signal: RunSignal,
  queue: VecDeque<ArtifactKind>,
  in_flight: StreamMap<ArtifactKind, Supervised>,
  generator_signals: HashMap<ArtifactKind, RunSignal>,
  started_at: HashMap<ArtifactKind, Instant>,
  deadline: Option<Instant>,
}

impl Driver {
  pub fn new(
    config: Arc<GenerationConfig>,
    generators: Generators,
    tracker: StateTracker,
    emitter: Emitter,
    signal: RunSignal,
    kinds: Vec<ArtifactKind>,
  ) -> Self {
    let deadline = config.job_timeout.map(|timeout| Instant::now() + timeout);

    Driver {
      config,
      generators,
      tracker,
      emitter,
      signal,
      queue: kinds.into(),
      in_flight: StreamMap::new(),
      generator_signals: HashMap::new(),
      started_at: HashMap::new(),
      deadline,
    }
  }

  pub async fn run(mut self) -> RunOutcome {
    let started_at = Instant::now();
    let state = self.tracker.state();
    log::info!(
      "Job {} run {} started with {} artifact(s): {}",
      state.job_id,
      state.run_id,
      self.queue.len(),
      self
        .queue
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
    );

    match self.drive().await {
      Ok(()) => {
        let state = self.tracker.snapshot();
        log::info!(
          "Job {} run {} finished as {} ({}%) in {} seconds",
          state.job_id,
          state.run_id,
          state.overall_status,
          state.overall_progress,
          started_at.elapsed().as_secs()
        );

        RunOutcome::Completed(state)
      }
      Err(interrupt) => {
        self.abort(interrupt);
        RunOutcome::Cancelled(self.tracker.snapshot())
      }
    }
  }

  async fn drive(&mut self) -> Emitted {
    let concurrency = self.config.max_concurrency.max(1);

    loop {
      while self.in_flight.len() < concurrency {
        let Some(kind) = self.queue.pop_front() else {
          break;
        };
        self.start(kind).await?;
      }

      // The queue drains before in-flight slots do
      if self.in_flight.is_empty() {
        break;
      }

      tokio::select! {
        biased;
        _ = self.signal.recv() => return Err(Interrupt::Cancelled),
        _ = self.emitter.closed() => return Err(Interrupt::Disconnected),
        _ = deadline_elapsed(self.deadline) => self.expire().await?,
        Some((kind, supervision)) = self.in_flight.next() => self.supervise(kind, supervision).await?,
      }
    }

    self.emitter.summary(self.tracker.state()).await
  }

  async fn start(&mut self, kind: ArtifactKind) -> Emitted {
    let job_id = self.tracker.state().job_id.clone();
    let run_id = self.tracker.state().run_id.clone();

    log::info!("Generating {} for job {}", kind, job_id);
    self.started_at.insert(kind, Instant::now());

    // Processing is entered before the generator reports anything
    self
      .apply(
        kind,
        Transition::Processing {
          progress: 0,
          message: None,
        },
      )
      .await?;

    let Some(generator) = self.generators.get(kind) else {
      let reason = FailureReason::internal(format!("no generator registered for `{}`", kind));
      return self.finish(kind, Transition::failed(reason)).await;
    };

    let timeout = self.config.timeout_for(kind);
    let deadline = Instant::now() + timeout;
    let generator_signal = RunSignal::new();
    let ctx = GenerationContext {
      job_id,
      run_id,
      kind,
      signal: generator_signal.clone(),
    };

    let launch = tokio::select! {
      biased;
      _ = self.signal.recv() => {
        let _ = generator_signal.cancel();
        return Err(Interrupt::Cancelled);
      }
      _ = self.emitter.closed() => {
        let _ = generator_signal.cancel();
        return Err(Interrupt::Disconnected);
      }
      _ = deadline_elapsed(self.deadline) => Launch::JobDeadline,
      _ = tokio::time::sleep_until(deadline) => Launch::TimedOut,
      response = generator.generate(ctx) => Launch::Started(response),
    };

    match launch {
      Launch::Started(Ok(receiver)) => {
        self.generator_signals.insert(kind, generator_signal);
        self
          .in_flight
          .insert(kind, Supervised::new(receiver, deadline, timeout));
        Ok(())
      }
      Launch::Started(Err(err)) => {
        log::warn!("Generator for {} could not start: {}", kind, err);
        let reason = FailureReason::generator(err.to_string());
        self.finish(kind, Transition::failed(reason)).await
      }
      Launch::TimedOut => {
        let _ = generator_signal.timeout();
        self.time_out(kind, timeout).await
      }
      Launch::JobDeadline => {
        let _ = generator_signal.timeout();
        self.expire().await
      }
    }
  }

  async fn supervise(&mut self, kind: ArtifactKind, supervision: Supervision) -> Emitted {
    match supervision {
      Supervision::Update(GeneratorUpdate::Progress { progress, message }) => {
        log::debug!("Generator for {} reported {}%: {}", kind, progress, message);
        self
          .apply(kind, Transition::processing(progress, message))
          .await
      }
      Supervision::Update(GeneratorUpdate::Succeeded(artifact_ref)) => {
        self.finish(kind, Transition::succeeded(artifact_ref)).await
      }
      Supervision::Update(GeneratorUpdate::Failed(reason)) => {
        log::warn!("Generator for {} failed: {}", kind, reason);
        self.finish(kind, Transition::failed(reason)).await
      }
      Supervision::TimedOut(after) => {
        if let Some(signal) = self.generator_signals.get(&kind) {
          let _ = signal.timeout();
        }
        self.time_out(kind, after).await
      }
      Supervision::Ended => {
        log::error!("Generator for {} ended without a result", kind);
        let reason = FailureReason::internal("generator ended without a result");
        self.finish(kind, Transition::failed(reason)).await
      }
    }
  }

  async fn time_out(&mut self, kind: ArtifactKind, after: Duration) -> Emitted {
    log::warn!(
      "Generator for {} timed out after {}",
      kind,
      humantime::format_duration(after)
    );

    self
      .finish(kind, Transition::failed(FailureReason::timeout(after)))
      .await
  }

  /// Applies a terminal transition and releases the kind's slot.
  async fn finish(&mut self, kind: ArtifactKind, transition: Transition) -> Emitted {
    self.in_flight.remove(&kind);
    self.generator_signals.remove(&kind);

    let status = transition.status();
    self.apply(kind, transition).await?;

    if let Some(started_at) = self.started_at.remove(&kind) {
      log::info!(
        "Artifact {} of job {} ended as {} in {} seconds",
        kind,
        self.tracker.state().job_id,
        status,
        started_at.elapsed().as_secs()
      );
    }

    Ok(())
  }

  /// Fails every unresolved artifact once the job deadline passes.
  async fn expire(&mut self) -> Emitted {
    log::warn!(
      "Job {} run {} exceeded its deadline",
      self.tracker.state().job_id,
      self.tracker.state().run_id
    );

    self.deadline = None;
    self.queue.clear();
    self.in_flight.clear();
    self.started_at.clear();
    for (_, signal) in self.generator_signals.drain() {
      let _ = signal.timeout();
    }

    let unresolved: Vec<_> = self
      .tracker
      .state()
      .artifacts
      .iter()
      .filter(|artifact| artifact.status.is_active())
      .map(|artifact| artifact.kind)
      .collect();

    for kind in unresolved {
      self
        .apply(kind, Transition::failed(FailureReason::DeadlineExceeded))
        .await?;
    }

    Ok(())
  }

  /// Applies a transition and emits the resulting event.
  ///
  /// A rejected transition is a defect: the generator is stopped and the
  /// artifact fails with an internal reason, unless it is already terminal.
  async fn apply(&mut self, kind: ArtifactKind, transition: Transition) -> Emitted {
    let err = match self.tracker.transition(kind, transition) {
      Ok(state) => return self.emitter.artifact(kind, &state).await,
      Err(err) => err,
    };

    log::error!("{}", err);

    self.in_flight.remove(&kind);
    if let Some(signal) = self.generator_signals.remove(&kind) {
      let _ = signal.cancel();
    }

    let terminal = self
      .tracker
      .state()
      .artifact(kind)
      .map_or(true, |artifact| artifact.is_terminal());
    if terminal {
      return Ok(());
    }

    let reason = FailureReason::internal(err.to_string());
    match self.tracker.transition(kind, Transition::failed(reason)) {
      Ok(state) => self.emitter.artifact(kind, &state).await,
      Err(err) => {
        log::error!("{}", err);
        Ok(())
      }
    }
  }

  fn abort(&mut self, interrupt: Interrupt) {
    let state = self.tracker.state();

    match interrupt {
      Interrupt::Cancelled => {
        log::warn!("Job {} run {} was cancelled", state.job_id, state.run_id);
      }
      Interrupt::Disconnected => {
        log::warn!(
          "Event consumer of job {} run {} went away, cancelling",
          state.job_id,
          state.run_id
        );
        let _ = self.signal.cancel();
      }
    }

    self.queue.clear();
    self.in_flight.clear();
    for (_, signal) in self.generator_signals.drain() {
      let _ = signal.cancel();
    }
  }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
  match deadline {
    Some(deadline) => tokio::time::sleep_until(deadline).await,
    None => std::future::pending().await,
  }
}
