//! Serves a directory with range support.
//!
//! ```text
//! cargo run --example file_server -- ./public 127.0.0.1:8080
//! curl -H 'Range: bytes=0-99,200-299' http://127.0.0.1:8080/some/file
//! ```

use std::error::Error;

use micro_transfer::server::{FileDispatcher, HttpServer};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut args = std::env::args().skip(1);
    let root = args.next().unwrap_or_else(|| ".".to_owned());
    let address = args.next().unwrap_or_else(|| "127.0.0.1:8080".to_owned());

    let mut server = HttpServer::builder().address(address.as_str()).dispatcher(FileDispatcher::new(&root)).build()?;
    let local_addr = server.startup().await?;
    info!(%local_addr, root = %root, "serving files, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}
