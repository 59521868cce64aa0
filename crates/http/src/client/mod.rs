//! Client request engine.
//!
//! An exchange is described by a [`RequestHandle`] and started with
//! [`HttpClient::post`], which returns a [`Deferred`] fulfilled exactly once when
//! the exchange reaches a terminal [`RequestStatus`]:
//!
//! - `Succeeded`: the whole response body was received
//! - `ConnectFailed`: the transport could not be established
//! - `RequestFailed`: the request could not be sent
//! - `ResponseFailed`: the response was missing, malformed or incomplete
//!
//! A failure after connecting is retried once on a fresh connection with a
//! re-stamped request. Failures are never returned as errors; they only show up
//! in the status handed to the completion callback and the deferred result.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use micro_transfer::client::{HttpClient, RequestHandle, RequestStatus};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::plain();
//! let request = Request::get("/index.html").body(Bytes::new())?;
//! let handle = RequestHandle::builder("127.0.0.1:8080".parse()?, request).build();
//!
//! let handle = client.post(handle).await?;
//! if handle.status() == RequestStatus::Succeeded {
//!     println!("{} bytes", handle.response_body().len());
//! }
//! # Ok(())
//! # }
//! ```

mod deferred;
mod events;
mod handle;
mod status;

pub use deferred::{Canceled, Deferred};
pub use handle::{
    BodyReader, BodyWriter, CompletionCallback, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RESPONSE_TIMEOUT, RequestHandle, RequestHandleBuilder, Timeouts,
};
pub use status::RequestStatus;

use std::sync::Arc;

use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tracing::{debug, info, warn};

use crate::context::{Connector, Context, EventHandler, Exit, TcpConnector, TlsConnector};
use events::ExchangeEvents;

/// Posts exchanges over plaintext or TLS transports.
#[derive(Clone)]
pub struct HttpClient {
    connector: Arc<dyn Connector>,
}

impl HttpClient {
    /// A client connecting over plain TCP.
    pub fn plain() -> Self {
        Self::with_connector(Arc::new(TcpConnector))
    }

    /// A client negotiating TLS with `server_name` on every new connection.
    pub fn tls(config: Arc<ClientConfig>, server_name: ServerName<'static>) -> Self {
        Self::with_connector(Arc::new(TlsConnector::new(config, server_name)))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Starts the exchange described by `handle` on the current tokio runtime.
    ///
    /// A handle still holding a kept-alive connection sends over it, otherwise a
    /// new connection is made.
    pub fn post(&self, handle: RequestHandle) -> Deferred {
        let (fulfil, deferred) = deferred::channel();
        let connector = Arc::clone(&self.connector);
        tokio::spawn(async move {
            let handle = exchange(connector.as_ref(), handle).await;
            fulfil.fulfil(handle);
        });
        deferred
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

/// Runs attempts until the handle is terminal.
async fn exchange(connector: &dyn Connector, mut handle: RequestHandle) -> RequestHandle {
    handle.tried_times = 0;
    handle.preprocess();

    loop {
        let address = handle.address();
        let parked = handle.context.take().filter(Context::is_open);
        let reused = parked.is_some();
        let mut ctx = match parked {
            Some(ctx) => ctx.attach(handle).0,
            None => Context::pending(handle),
        };

        let exit = if reused {
            debug!(%address, "reuse kept-alive connection");
            let operation = ExchangeEvents.on_connected(&mut ctx);
            ctx.drive(&ExchangeEvents, operation).await
        } else {
            ctx.dial(connector, address, &ExchangeEvents).await
        };

        let (ctx, mut handle_back) = ctx.detach();
        if exit == Exit::Parked {
            handle_back.context = Some(ctx);
        }
        handle = handle_back;

        if !teardown(&mut handle) {
            return handle;
        }
        handle.preprocess();
    }
}

/// Settles the status after the context was released, returning whether the
/// exchange is attempted again.
fn teardown(handle: &mut RequestHandle) -> bool {
    if handle.status == RequestStatus::Succeeded {
        return false;
    }

    let failed = handle.status.on_teardown();
    handle.status = failed;
    handle.tried_times += 1;

    if handle.tried_times == 1 && failed != RequestStatus::ConnectFailed {
        info!(status = %failed, address = %handle.address(), "exchange failed, retry once");
        return true;
    }

    warn!(status = %failed, address = %handle.address(), tried_times = handle.tried_times, "exchange failed");
    handle.invoke_callback();
    false
}
