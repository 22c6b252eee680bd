use crate::{GeneratorUpdate, ProgressReceiver};
use std::{
  future::Future,
  pin::Pin,
  task::{Context, Poll},
  time::Duration,
};
use tokio::time::{Instant, Sleep};
use tokio_stream::Stream;

#[derive(Debug, PartialEq)]
pub(crate) enum Supervision {
  Update(GeneratorUpdate),
  /// The per-kind timeout elapsed before a result arrived.
  TimedOut(Duration),
  /// The generator dropped its sender without a result.
  Ended,
}

/// Progress of one in-flight generator, bounded by its deadline.
///
/// Yields at most one of `TimedOut`/`Ended`/a terminal update and then ends.
pub(crate) struct Supervised {
  receiver: ProgressReceiver,
  sleep: Pin<Box<Sleep>>,
  timeout: Duration,
  finished: bool,
}

impl Supervised {
  pub fn new(receiver: ProgressReceiver, deadline: Instant, timeout: Duration) -> Self {
    Supervised {
      receiver,
      sleep: Box::pin(tokio::time::sleep_until(deadline)),
      timeout,
      finished: false,
    }
  }
}

impl Stream for Supervised {
  type Item = Supervision;

  fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    if self.finished {
      return Poll::Ready(None);
    }

    if self.sleep.as_mut().poll(cx).is_ready() {
      self.finished = true;
      return Poll::Ready(Some(Supervision::TimedOut(self.timeout)));
    }

    match Pin::new(&mut self.receiver).poll_next(cx) {
      Poll::Ready(Some(update)) => {
        if update.is_terminal() {
          self.finished = true;
        }
        Poll::Ready(Some(Supervision::Update(update)))
      }
      Poll::Ready(None) => {
        self.finished = true;
        Poll::Ready(Some(Supervision::Ended))
      }
      Poll::Pending => Poll::Pending,
    }
  }
}
