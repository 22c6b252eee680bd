use crate::{DocstreamServer, ServerError};
use axum::{
  body::{Body, Bytes},
  extract::{Path, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use docstream::{JobId, JobRun, JobRunState, RunSignal};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

type Frame = docstream::Result<Bytes>;

fn parse_job_id(job_id: String) -> Result<JobId, ServerError> {
  JobId::try_from(job_id.as_str()).map_err(|_| ServerError::InvalidJobId(job_id))
}

pub(crate) async fn generate(
  Path(job_id): Path<String>,
  State(server): State<DocstreamServer>,
) -> Result<Response, ServerError> {
  let job_id = parse_job_id(job_id)?;

  let signal = server.claim(&job_id)?;
  let run = server.orchestrator.run_with_signal(job_id.clone(), signal);
  let run = server.started(&job_id, run)?;

  Ok(server.stream(run))
}

pub(crate) async fn retry(
  Path(job_id): Path<String>,
  State(server): State<DocstreamServer>,
) -> Result<Response, ServerError> {
  let job_id = parse_job_id(job_id)?;
  if server.signals.is_running(&job_id) {
    return Err(ServerError::Conflict(job_id.to_string()));
  }

  let prior = server
    .store
    .load(&job_id)
    .await?
    .ok_or_else(|| ServerError::NotFound(job_id.to_string()))?;

  let signal = server.claim(&job_id)?;
  let run = server.orchestrator.retry_with_signal(&prior, signal);
  let run = server.started(&job_id, run)?;

  Ok(server.stream(run))
}

pub(crate) async fn cancel(
  Path(job_id): Path<String>,
  State(server): State<DocstreamServer>,
) -> Result<StatusCode, ServerError> {
  let job_id = parse_job_id(job_id)?;

  let signal = server
    .signals
    .get_signal(&job_id)
    .ok_or_else(|| ServerError::NotFound(job_id.to_string()))?;

  log::info!("Cancelling job {}", job_id);
  if let Err(err) = signal.cancel() {
    log::trace!("Job {} is already stopping: {}", job_id, err);
  }

  Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn state(
  Path(job_id): Path<String>,
  State(server): State<DocstreamServer>,
) -> Result<Json<JobRunState>, ServerError> {
  let job_id = parse_job_id(job_id)?;

  let state = server
    .store
    .load(&job_id)
    .await?
    .ok_or_else(|| ServerError::NotFound(job_id.to_string()))?;

  Ok(Json(state))
}

impl DocstreamServer {
  /// Registers the signal of the next run of `job_id`, before it exists.
  fn claim(&self, job_id: &JobId) -> Result<RunSignal, ServerError> {
    let signal = RunSignal::new();
    if !self.signals.register_signal(job_id.clone(), signal.clone()) {
      return Err(ServerError::Conflict(job_id.to_string()));
    }

    Ok(signal)
  }

  /// Releases the claim when the run could not be started.
  fn started(
    &self,
    job_id: &JobId,
    run: docstream::Result<JobRun>,
  ) -> Result<JobRun, ServerError> {
    run.map_err(|err| {
      self.signals.unregister_signal(job_id);
      ServerError::from(err)
    })
  }

  fn stream(&self, run: JobRun) -> Response {
    log::info!("Streaming run {} of job {}", run.run_id, run.job_id);

    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(self.clone().forward(run, tx));

    let headers = [
      (header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
      (header::CACHE_CONTROL, "no-store"),
    ];

    (headers, Body::from_stream(ReceiverStream::new(rx))).into_response()
  }

  /// Copies frames into the response body. The body ends only after the
  /// outcome is saved, so a client that saw the end can retry right away.
  async fn forward(self, run: JobRun, tx: mpsc::Sender<Frame>) {
    let JobRun {
      job_id,
      run_id,
      events,
      signal,
      outcome,
    } = run;
    let mut frames = Box::pin(events.framed());

    loop {
      tokio::select! {
        frame = frames.next() => match frame {
          Some(frame) => {
            if tx.send(frame).await.is_err() {
              break;
            }
          }
          None => break,
        },
        _ = tx.closed() => break,
      }
    }

    if tx.is_closed() {
      log::info!("Client of job {} disconnected", job_id);
      if let Err(err) = signal.cancel() {
        log::trace!("Job {} is already stopping: {}", job_id, err);
      }
    }
    drop(frames);

    match outcome.await {
      Ok(outcome) => {
        if outcome.is_cancelled() {
          log::info!("Run {} of job {} was cancelled", run_id, job_id);
        }

        if let Err(err) = self.store.save(outcome.into_state()).await {
          log::error!("Failed to save state of job {}: {}", job_id, err);
        }
      }
      Err(err) => {
        log::error!("Run {} of job {} did not finish: {}", run_id, job_id, err);
      }
    }

    self.signals.unregister_signal(&job_id);
  }
}
