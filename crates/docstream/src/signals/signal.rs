use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
  fmt,
  future::Future,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll, Waker},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
  Cancel,
  Timeout,
}

#[derive(Debug)]
struct SignalState {
  signal: Option<Signal>,
  wakers: Vec<Waker>,
}

/// Resolves once the signal is raised. Can be awaited any number of times.
pub struct Receiver<'a> {
  signal: &'a RunSignal,
}

/// One-shot stop signal shared between the orchestrator and whoever it
/// needs to stop: a whole job run, or one in-flight generator.
#[derive(Clone, Debug)]
pub struct RunSignal {
  state: Arc<Mutex<SignalState>>,
}

impl RunSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn recv(&self) -> Receiver<'_> {
    Receiver { signal: self }
  }

  pub fn cancel(&self) -> Result<()> {
    self.raise(Signal::Cancel)
  }

  pub fn timeout(&self) -> Result<()> {
    self.raise(Signal::Timeout)
  }

  pub fn signal(&self) -> Option<Signal> {
    self.state.lock().signal
  }

  pub fn is_cancelled(&self) -> bool {
    self.signal() == Some(Signal::Cancel)
  }

  pub fn is_timeout(&self) -> bool {
    self.signal() == Some(Signal::Timeout)
  }

  fn raise(&self, signal: Signal) -> Result<()> {
    let wakers = {
      let mut state = self.state.lock();
      if state.signal.is_some() {
        return Err(Error::signal_error("Signal has been cancelled or timeout."));
      }

      state.signal = Some(signal);
      std::mem::take(&mut state.wakers)
    };

    for waker in wakers {
      waker.wake();
    }

    Ok(())
  }
}

impl<'a> Future for Receiver<'a> {
  type Output = Signal;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.signal.state.lock();

    if let Some(signal) = state.signal {
      return Poll::Ready(signal);
    }

    if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
      state.wakers.push(cx.waker().clone());
    }

    Poll::Pending
  }
}

impl fmt::Display for Signal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Signal::Cancel => write!(f, "cancel"),
      Signal::Timeout => write!(f, "timeout"),
    }
  }
}

impl TryFrom<&str> for Signal {
  type Error = Error;

  fn try_from(s: &str) -> Result<Self> {
    match s {
      "cancel" => Ok(Signal::Cancel),
      "timeout" => Ok(Signal::Timeout),
      _ => Err(Error::signal_error(format!("Invalid signal: {}", s))),
    }
  }
}

impl Default for RunSignal {
  fn default() -> Self {
    Self {
      state: Arc::new(Mutex::new(SignalState {
        signal: None,
        wakers: Vec::new(),
      })),
    }
  }
}
