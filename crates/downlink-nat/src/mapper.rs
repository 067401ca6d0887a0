//! The gateway client boundary, injectable the way `revaer-torrent-libt`
//! injects `Box<dyn LibtSession>` behind a small trait so the state machine
//! can be driven by a stub in tests instead of a real UPnP search.

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::NatResult;

/// Performs UPnP IGD port mapping and external-IP queries.
#[async_trait]
pub trait PortMapper: Send + Sync {
    /// Maps `external_port` to `local_addr`, with `description` and
    /// `lease_seconds` (`0` = permanent), after first removing any stale
    /// mapping on the same port.
    async fn map_port(&self, external_port: u16, local_addr: SocketAddr, description: &str, lease_seconds: u32) -> NatResult<()>;

    /// Removes a previously created mapping. Best-effort: callers ignore errors.
    async fn unmap_port(&self, external_port: u16) -> NatResult<()>;

    /// Queries the gateway's external IPv4 address.
    async fn external_ip(&self) -> NatResult<std::net::Ipv4Addr>;
}

/// Real UPnP IGD client, backed by `igd-next`'s async tokio gateway search.
pub struct IgdPortMapper;

#[async_trait]
impl PortMapper for IgdPortMapper {
    async fn map_port(&self, external_port: u16, local_addr: SocketAddr, description: &str, lease_seconds: u32) -> NatResult<()> {
        use crate::error::NatError;
        use igd_next::{aio::tokio::search_gateway, PortMappingProtocol, SearchOptions};

        let gateway = search_gateway(SearchOptions::default())
            .await
            .map_err(|err| NatError::GatewayNotFound { reason: err.to_string() })?;

        let _ = gateway.remove_port(PortMappingProtocol::TCP, external_port).await;

        gateway
            .add_port(PortMappingProtocol::TCP, external_port, local_addr, lease_seconds, description)
            .await
            .map_err(|err| NatError::MappingFailed {
                port: external_port,
                reason: err.to_string(),
            })
    }

    async fn unmap_port(&self, external_port: u16) -> NatResult<()> {
        use crate::error::NatError;
        use igd_next::{aio::tokio::search_gateway, PortMappingProtocol, SearchOptions};

        let gateway = search_gateway(SearchOptions::default())
            .await
            .map_err(|err| NatError::GatewayNotFound { reason: err.to_string() })?;
        gateway
            .remove_port(PortMappingProtocol::TCP, external_port)
            .await
            .map_err(|err| NatError::MappingFailed {
                port: external_port,
                reason: err.to_string(),
            })
    }

    async fn external_ip(&self) -> NatResult<std::net::Ipv4Addr> {
        use crate::error::NatError;
        use igd_next::{aio::tokio::search_gateway, SearchOptions};

        let gateway = search_gateway(SearchOptions::default())
            .await
            .map_err(|err| NatError::GatewayNotFound { reason: err.to_string() })?;
        gateway
            .get_external_ip()
            .await
            .map_err(|err| NatError::ExternalIpFailed { reason: err.to_string() })
    }
}
