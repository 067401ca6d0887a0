//! HTTP surface modules (router, middleware, handlers).

/// Authentication middleware and helpers.
pub mod auth;
/// Shared constants and header names for HTTP surfaces.
pub mod constants;
/// Problem response helpers and error types.
pub mod errors;
/// Route handlers, one module per resource group.
pub mod handlers;
/// Router construction and server host.
pub mod router;
/// Metrics middleware for HTTP requests.
pub mod telemetry;
