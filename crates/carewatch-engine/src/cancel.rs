//! Cooperative cancellation for batch runs.
//!
//! A [`CancelHandle`] trips every [`CancelToken`] cloned from its pair.
//! Tokens are only polled between units of work; nothing in flight is
//! interrupted.

use tokio::sync::watch;

/// Create a connected handle/token pair.
pub fn cancellation() -> (CancelHandle, CancelToken) {
  let (tx, rx) = watch::channel(false);
  (CancelHandle { tx }, CancelToken { rx })
}

#[derive(Debug)]
pub struct CancelHandle {
  tx: watch::Sender<bool>,
}

impl CancelHandle {
  /// Request cancellation. Idempotent.
  pub fn cancel(&self) { self.tx.send_replace(true); }

  pub fn is_cancelled(&self) -> bool { *self.tx.borrow() }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
  rx: watch::Receiver<bool>,
}

impl CancelToken {
  /// A token that is never cancelled.
  pub fn never() -> Self {
    let (_, rx) = watch::channel(false);
    Self { rx }
  }

  pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }

  /// Resolves once cancellation is requested. Pends forever if the handle
  /// is dropped without cancelling.
  pub async fn cancelled(&mut self) {
    if self.rx.wait_for(|c| *c).await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}
