//! Fetches a path, optionally a byte range of it, twice over one connection.
//!
//! ```text
//! cargo run --example fetch -- 127.0.0.1:8080 /some/file 'bytes=0-99'
//! ```

use std::error::Error;

use bytes::Bytes;
use http::{Request, header};
use micro_transfer::client::{HttpClient, RequestHandle};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "127.0.0.1:8080".to_owned()).parse()?;
    let path = args.next().unwrap_or_else(|| "/".to_owned());
    let range = args.next();

    let mut builder = Request::get(path.as_str());
    if let Some(range) = &range {
        builder = builder.header(header::RANGE, range.as_str());
    }
    let request = builder.body(Bytes::new())?;

    let client = HttpClient::plain();
    let mut handle = RequestHandle::builder(address, request)
        .on_complete(|handle| info!(status = %handle.status(), bytes = handle.response_body_handled(), "completed"))
        .build();

    for round in 1..=2 {
        handle = client.post(handle).await?;
        if let Some(response) = handle.response() {
            info!(round, status = %response.status(), headers = ?response.headers(), reused = handle.has_connection(), "response");
        }
    }
    Ok(())
}
