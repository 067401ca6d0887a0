//! HTTP handler modules for the API surface.
//!
//! # Design
//! - Keep handlers scoped to a single resource group.
//! - Delegate shared concerns (auth, error mapping) to `http::auth`/`http::errors`.

pub mod config;
pub mod downloads;
pub mod federation;
pub mod health;
pub mod keys;
pub mod libraries;
pub mod networking;
pub mod peers;
pub mod system;
