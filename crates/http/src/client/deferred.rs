use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::client::RequestHandle;

/// The task driving an exchange went away without fulfilling its result.
#[derive(Debug, Clone, Copy, Error)]
#[error("exchange was dropped before it finished")]
pub struct Canceled;

/// Result of [`HttpClient::post`](crate::client::HttpClient::post), fulfilled
/// exactly once with the handle in a terminal status.
///
/// Await it from async code or call [`Deferred::wait`] from a thread outside the
/// runtime.
#[derive(Debug)]
pub struct Deferred {
    rx: oneshot::Receiver<RequestHandle>,
}

/// Producing half of a [`Deferred`]; consumed by fulfilling it.
#[derive(Debug)]
pub(crate) struct Fulfil {
    tx: oneshot::Sender<RequestHandle>,
}

pub(crate) fn channel() -> (Fulfil, Deferred) {
    let (tx, rx) = oneshot::channel();
    (Fulfil { tx }, Deferred { rx })
}

impl Fulfil {
    pub(crate) fn fulfil(self, handle: RequestHandle) {
        if self.tx.send(handle).is_err() {
            tracing::debug!("deferred result dropped before fulfilment");
        }
    }
}

impl Deferred {
    /// Blocks the current thread until the exchange ends.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn wait(self) -> Result<RequestHandle, Canceled> {
        self.rx.blocking_recv().map_err(|_e| Canceled)
    }
}

impl Future for Deferred {
    type Output = Result<RequestHandle, Canceled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map_err(|_e| Canceled)
    }
}
