//! # Design
//!
//! - One constant-message variant per failure class; the gateway's own
//!   message is carried in `reason`, never interpolated into `#[error]`.

use thiserror::Error;

/// Result type for NAT/UPnP operations.
pub type NatResult<T> = Result<T, NatError>;

/// Errors produced while discovering a gateway or managing a port mapping.
#[derive(Debug, Error)]
pub enum NatError {
    /// No UPnP-capable gateway answered the search.
    #[error("no upnp gateway found")]
    GatewayNotFound {
        /// The gateway client's own error message.
        reason: String,
    },
    /// The gateway rejected the port mapping request.
    #[error("upnp port mapping request failed")]
    MappingFailed {
        /// Port the mapping was attempted for.
        port: u16,
        /// The gateway client's own error message.
        reason: String,
    },
    /// The gateway could not report its external IP address.
    #[error("upnp external ip query failed")]
    ExternalIpFailed {
        /// The gateway client's own error message.
        reason: String,
    },
}
