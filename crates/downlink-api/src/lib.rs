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

//! HTTP router, middleware, and handlers for the downlink node.
//!
//! [`http::router::ApiServer`] assembles the public, API-key gated, and
//! federation-server routes behind [`state::ApiState`]. `downlink-app` owns
//! constructing that state and calling [`ApiServer::serve`].

pub mod error;
pub mod http;
pub mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use state::{ApiState, ApiStaticConfig};
