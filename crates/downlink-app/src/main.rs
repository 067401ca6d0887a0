#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint: wires the downlink node's services together and
//! serves the HTTP API until shutdown.

use anyhow::Result;

/// Bootstraps the downlink node and blocks until the server shuts down.
#[tokio::main]
async fn main() -> Result<()> {
    downlink_app::run_app().await.map_err(Into::into)
}
