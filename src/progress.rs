//! Stage-transition notifications for long-running flows (generation, PDF export).
//!
//! Producers call `on_stage` in order; observers decide what to do with it
//! (forward over a WebSocket, record for tests, drop).

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

pub trait ProgressObserver<S>: Send + Sync {
  fn on_stage(&self, stage: S, percent: u8);
}

/// Closures work as observers.
impl<S, F> ProgressObserver<S> for F
where
  F: Fn(S, u8) + Send + Sync,
{
  fn on_stage(&self, stage: S, percent: u8) {
    self(stage, percent)
  }
}

/// Drops every notification.
pub struct NoProgress;

impl<S> ProgressObserver<S> for NoProgress {
  fn on_stage(&self, _stage: S, _percent: u8) {}
}

/// Forwards notifications into a channel; a closed receiver is ignored.
pub struct ChannelObserver<S> {
  tx: UnboundedSender<(S, u8)>,
}

impl<S> ChannelObserver<S> {
  pub fn new(tx: UnboundedSender<(S, u8)>) -> Self {
    Self { tx }
  }
}

impl<S: Send> ProgressObserver<S> for ChannelObserver<S> {
  fn on_stage(&self, stage: S, percent: u8) {
    let _ = self.tx.send((stage, percent));
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
  Validating,
  CheckingCache,
  Generating,
  Finalizing,
  Complete,
}

impl GenerationStage {
  pub fn percent(&self) -> u8 {
    match self {
      Self::Validating => 10,
      Self::CheckingCache => 20,
      Self::Generating => 40,
      Self::Finalizing => 90,
      Self::Complete => 100,
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
  Preparing,
  Capturing,
  Converting,
  Metadata,
  Finalizing,
  Complete,
}

impl ExportStage {
  pub fn percent(&self) -> u8 {
    match self {
      Self::Preparing => 10,
      Self::Capturing => 30,
      Self::Converting => 60,
      Self::Metadata => 80,
      Self::Finalizing => 95,
      Self::Complete => 100,
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::Mutex;

  /// Keeps every notification for later assertions.
  pub(crate) struct Recorder<S>(pub Mutex<Vec<(S, u8)>>);

  impl<S: Clone> Recorder<S> {
    pub(crate) fn new() -> Self {
      Recorder(Mutex::new(Vec::new()))
    }

    pub(crate) fn stages(&self) -> Vec<S> {
      self.0.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
  }

  impl<S: Send> ProgressObserver<S> for Recorder<S> {
    fn on_stage(&self, stage: S, percent: u8) {
      self.0.lock().unwrap().push((stage, percent));
    }
  }

  #[tokio::test]
  async fn channel_observer_forwards_in_order() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let obs = ChannelObserver::new(tx);
    obs.on_stage(ExportStage::Preparing, ExportStage::Preparing.percent());
    obs.on_stage(ExportStage::Capturing, ExportStage::Capturing.percent());
    assert_eq!(rx.recv().await, Some((ExportStage::Preparing, 10)));
    assert_eq!(rx.recv().await, Some((ExportStage::Capturing, 30)));
  }

  #[test]
  fn closures_are_observers() {
    let seen = Mutex::new(0u8);
    let f = |_: GenerationStage, p: u8| *seen.lock().unwrap() = p;
    f.on_stage(GenerationStage::Complete, 100);
    assert_eq!(*seen.lock().unwrap(), 100);
  }
}
