use crate::{
  codec::EventCodec, ArtifactKind, ArtifactRef, ArtifactStatus, Error, ErrorEvent,
  FailureReason, JobId, JobRunState, OverallStatus, ProgressEvent, Result, RunId,
};
use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio_stream::{Stream, StreamExt};
use tokio_util::{codec::FramedRead, io::StreamReader};

/// What a client knows about one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactView {
  pub kind: ArtifactKind,
  pub status: ArtifactStatus,
  pub progress: u8,
  pub message: String,
  pub artifact_ref: Option<ArtifactRef>,
  pub failure_reason: Option<FailureReason>,
}

/// Client-side picture of a job, rebuilt from decoded events.
#[derive(Debug, Clone, Default)]
pub struct JobView {
  job_id: Option<JobId>,
  run_id: Option<RunId>,
  artifacts: Vec<ArtifactView>,
  overall_status: Option<OverallStatus>,
  overall_progress: u8,
  last_seq: Option<u64>,
  summary_seen: bool,
  error: Option<ErrorEvent>,
  closed: bool,
}

impl JobView {
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from a known state, e.g. the prior state of a retry, so that
  /// artifacts the retry never touches still show up.
  pub fn from_state(state: &JobRunState) -> Self {
    JobView {
      job_id: Some(state.job_id.clone()),
      artifacts: state
        .artifacts
        .iter()
        .map(|artifact| ArtifactView {
          kind: artifact.kind,
          status: artifact.status,
          progress: artifact.progress,
          message: artifact.message.clone(),
          artifact_ref: artifact.artifact_ref.clone(),
          failure_reason: artifact.failure_reason.clone(),
        })
        .collect(),
      overall_status: Some(state.overall_status),
      overall_progress: state.overall_progress,
      ..Self::default()
    }
  }

  /// Folds one event into the view.
  ///
  /// Rejects events that go back in sequence, belong to another job or run,
  /// or arrive after the stream was finished.
  pub fn apply(&mut self, event: &ProgressEvent) -> Result<()> {
    if self.is_finished() {
      return Err(Error::codec_error(format!(
        "Event #{} arrived after the stream finished",
        event.seq()
      )));
    }

    if let Some(last) = self.last_seq {
      if event.seq() <= last {
        return Err(Error::codec_error(format!(
          "Event #{} arrived after #{}",
          event.seq(),
          last
        )));
      }
    }

    match &self.job_id {
      Some(job_id) if job_id != event.job_id() => {
        return Err(Error::codec_error(format!(
          "Event for job {} on the stream of job {}",
          event.job_id(),
          job_id
        )));
      }
      Some(_) => {}
      None => self.job_id = Some(event.job_id().clone()),
    }

    match event {
      ProgressEvent::Progress(event) => {
        self.check_run(&event.run_id)?;

        let view = ArtifactView {
          kind: event.kind,
          status: event.status,
          progress: event.progress,
          message: event.message.clone(),
          artifact_ref: event.artifact_ref.clone(),
          failure_reason: event.failure_reason.clone(),
        };
        match self.artifacts.iter_mut().find(|a| a.kind == event.kind) {
          Some(existing) => *existing = view,
          None => self.artifacts.push(view),
        }

        self.overall_status = Some(event.overall_status);
        self.overall_progress = event.overall_progress;
      }
      ProgressEvent::Summary(event) => {
        self.check_run(&event.run_id)?;

        self.overall_status = Some(event.overall_status);
        self.overall_progress = event.overall_progress;
        self.summary_seen = true;
      }
      ProgressEvent::Error(event) => {
        self.error = Some(event.clone());
      }
    }

    self.last_seq = Some(event.seq());

    Ok(())
  }

  fn check_run(&mut self, run_id: &RunId) -> Result<()> {
    match &self.run_id {
      Some(current) if current != run_id => Err(Error::codec_error(format!(
        "Event of run {} on the stream of run {}",
        run_id, current
      ))),
      Some(_) => Ok(()),
      None => {
        self.run_id = Some(run_id.clone());
        Ok(())
      }
    }
  }

  /// Marks the transport as closed.
  pub fn close(&mut self) {
    self.closed = true;
  }

  /// A summary or an error event was received.
  pub fn is_finished(&self) -> bool {
    self.summary_seen || self.error.is_some()
  }

  /// The stream closed without a summary: outcome unknown, resumable by retry.
  pub fn is_cancelled(&self) -> bool {
    self.closed && !self.is_finished()
  }

  pub fn error(&self) -> Option<&ErrorEvent> {
    self.error.as_ref()
  }

  pub fn job_id(&self) -> Option<&JobId> {
    self.job_id.as_ref()
  }

  pub fn run_id(&self) -> Option<&RunId> {
    self.run_id.as_ref()
  }

  pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactView> {
    self.artifacts.iter().find(|a| a.kind == kind)
  }

  pub fn artifacts(&self) -> &[ArtifactView] {
    &self.artifacts
  }

  pub fn overall_status(&self) -> Option<OverallStatus> {
    self.overall_status
  }

  pub fn overall_progress(&self) -> u8 {
    self.overall_progress
  }

  pub fn last_seq(&self) -> Option<u64> {
    self.last_seq
  }

  /// Reads frames from `reader` until it ends, applying each event as soon as
  /// it is complete.
  pub async fn follow<R>(mut self, reader: R) -> Result<JobView>
  where
    R: AsyncRead + Unpin,
  {
    let mut frames = FramedRead::new(reader, EventCodec::new());

    while let Some(event) = frames.next().await {
      let event = event?;
      log::trace!("Received {} event #{}", event.event_type(), event.seq());
      self.apply(&event)?;
    }

    self.close();

    Ok(self)
  }
}

pub async fn consume<R>(reader: R) -> Result<JobView>
where
  R: AsyncRead + Unpin,
{
  JobView::new().follow(reader).await
}

/// Same as [`consume`] for a chunked body such as an HTTP response stream.
pub async fn consume_stream<S>(stream: S) -> Result<JobView>
where
  S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
  JobView::new().follow(StreamReader::new(stream)).await
}
