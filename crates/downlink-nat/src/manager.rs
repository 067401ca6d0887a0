//! Drives the NAT/UPnP state machine: startup mapping attempt, a renewal
//! loop at ≈⅓ of the lease TTL, and a synchronous retry API (§4.3).

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use downlink_events::{Event, EventBus};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::mapper::PortMapper;
use crate::state::NatState;

/// Mapping description advertised to the gateway.
const MAPPING_DESCRIPTION: &str = "AnimeDB";
/// Default lease TTL in seconds; `0` requests a permanent mapping.
const DEFAULT_LEASE_SECONDS: u32 = 3600;

/// Owns the current [`NatState`] and the background renewal loop.
#[derive(Clone)]
pub struct NatManager {
    mapper: Arc<dyn PortMapper>,
    events: EventBus,
    state: Arc<Mutex<NatState>>,
    manual_override: Arc<Mutex<Option<String>>>,
    shutdown: Arc<Notify>,
}

impl NatManager {
    /// Builds a manager around `mapper`, publishing state changes on `events`.
    #[must_use]
    pub fn new(mapper: Arc<dyn PortMapper>, events: EventBus) -> Self {
        Self {
            mapper,
            events,
            state: Arc::new(Mutex::new(NatState::Idle)),
            manual_override: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Current state snapshot, independent of any runtime manual override.
    pub async fn state(&self) -> NatState {
        self.state.lock().await.clone()
    }

    /// The URL peers should be told to reach this node at: the runtime
    /// manual override if one is set via [`Self::set_manual_external_url`],
    /// otherwise whatever the current [`NatState`] reports.
    pub async fn external_url(&self) -> Option<String> {
        if let Some(url) = self.manual_override.lock().await.clone() {
            return Some(url);
        }
        self.state().await.external_url().map(str::to_string)
    }

    /// Sets or clears the runtime manual override (`PUT /networking/external-url`).
    /// `None` falls back to the UPnP-discovered URL, if any, without touching
    /// the underlying mapping or the renewal loop.
    pub async fn set_manual_external_url(&self, url: Option<String>) {
        *self.manual_override.lock().await = url;
        let external_url = self.external_url().await;
        if let Err(err) = self.events.send(Event::NatStateChanged { state: "manual_override", external_url }) {
            warn!(%err, "failed to publish manual override change");
        }
    }

    /// Runs the startup algorithm (§4.3 step 1-3). If `manual_url` is set,
    /// enters `manual` without touching UPnP; otherwise attempts a mapping
    /// on `port` and spawns the renewal loop on success.
    pub async fn start(&self, manual_url: Option<String>, local_addr: SocketAddr, port: u16) -> Option<JoinHandle<()>> {
        if let Some(url) = manual_url {
            self.set_state(NatState::Manual { external_url: url }).await;
            return None;
        }
        self.attempt_mapping(local_addr, port).await;
        if matches!(self.state().await, NatState::Active { .. }) {
            Some(self.spawn_renewal_loop(local_addr, port))
        } else {
            None
        }
    }

    /// Re-runs the mapping algorithm for `port` and returns the resulting
    /// state once the attempt completes (§4.3's synchronous retry API).
    pub async fn retry_upnp(&self, local_addr: SocketAddr, port: u16) -> NatState {
        self.attempt_mapping(local_addr, port).await;
        self.state().await
    }

    /// Removes the mapping (best-effort) and stops the renewal loop.
    pub async fn shutdown(&self, port: u16) {
        self.shutdown.notify_waiters();
        let _ = self.mapper.unmap_port(port).await;
    }

    async fn attempt_mapping(&self, local_addr: SocketAddr, port: u16) {
        self.set_state(NatState::Mapping).await;
        let _ = self.mapper.unmap_port(port).await;

        let mapped = self
            .mapper
            .map_port(port, local_addr, MAPPING_DESCRIPTION, DEFAULT_LEASE_SECONDS)
            .await;
        if let Err(err) = mapped {
            warn!(error = %err, "upnp mapping attempt failed");
            self.set_state(NatState::Failed { reason: err.to_string() }).await;
            return;
        }

        match self.mapper.external_ip().await {
            Ok(ip) => {
                self.set_state(NatState::Active {
                    external_url: external_url(ip, port),
                    lease_seconds: DEFAULT_LEASE_SECONDS,
                })
                .await;
            }
            Err(err) => {
                warn!(error = %err, "upnp external ip query failed");
                self.set_state(NatState::Failed { reason: err.to_string() }).await;
            }
        }
    }

    fn spawn_renewal_loop(&self, local_addr: SocketAddr, port: u16) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                let interval = {
                    match &*manager.state.lock().await {
                        NatState::Active { lease_seconds, .. } if *lease_seconds > 0 => {
                            Duration::from_secs(u64::from(*lease_seconds) / 3)
                        }
                        _ => return,
                    }
                };
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = manager.shutdown.notified() => return,
                }
                let previous_ip = match manager.state().await {
                    NatState::Active { external_url, .. } => external_url,
                    _ => return,
                };
                manager.attempt_mapping(local_addr, port).await;
                if let NatState::Active { external_url, .. } = manager.state().await {
                    if external_url != previous_ip {
                        info!(%external_url, "upnp external ip changed, firing renew callback");
                        if let Err(err) = manager.events.send(Event::NatStateChanged {
                            state: "active",
                            external_url: Some(external_url),
                        }) {
                            warn!(%err, "failed to publish nat renewal event");
                        }
                    }
                }
            }
        })
    }

    async fn set_state(&self, state: NatState) {
        let label = state.label();
        let external_url = state.external_url().map(str::to_string);
        *self.state.lock().await = state;
        if let Err(err) = self.events.send(Event::NatStateChanged { state: label, external_url }) {
            warn!(%err, "failed to publish nat state change");
        }
    }
}

fn external_url(ip: Ipv4Addr, port: u16) -> String {
    format!("http://{ip}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NatError, NatResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubMapper {
        ip: Ipv4Addr,
        fail_mapping: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PortMapper for StubMapper {
        async fn map_port(&self, _port: u16, _addr: SocketAddr, _desc: &str, _lease: u32) -> NatResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_mapping {
                return Err(NatError::MappingFailed {
                    port: 0,
                    reason: "denied".into(),
                });
            }
            Ok(())
        }

        async fn unmap_port(&self, _port: u16) -> NatResult<()> {
            Ok(())
        }

        async fn external_ip(&self) -> NatResult<Ipv4Addr> {
            Ok(self.ip)
        }
    }

    fn local_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[tokio::test]
    async fn manual_url_skips_upnp_entirely() {
        let mapper = Arc::new(StubMapper {
            ip: Ipv4Addr::new(1, 2, 3, 4),
            fail_mapping: false,
            calls: AtomicU32::new(0),
        });
        let manager = NatManager::new(mapper.clone(), EventBus::new());

        manager
            .start(Some("http://manual.example:9999".to_string()), local_addr(), 8080)
            .await;

        assert_eq!(manager.state().await, NatState::Manual {
            external_url: "http://manual.example:9999".to_string(),
        });
        assert_eq!(mapper.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_mapping_enters_active_with_external_url() {
        let mapper = Arc::new(StubMapper {
            ip: Ipv4Addr::new(203, 0, 113, 9),
            fail_mapping: false,
            calls: AtomicU32::new(0),
        });
        let manager = NatManager::new(mapper, EventBus::new());

        let renewal = manager.start(None, local_addr(), 8080).await;
        assert_eq!(
            manager.state().await,
            NatState::Active {
                external_url: "http://203.0.113.9:8080".to_string(),
                lease_seconds: DEFAULT_LEASE_SECONDS,
            }
        );
        if let Some(handle) = renewal {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn failed_mapping_enters_failed_and_does_not_panic() {
        let mapper = Arc::new(StubMapper {
            ip: Ipv4Addr::new(0, 0, 0, 0),
            fail_mapping: true,
            calls: AtomicU32::new(0),
        });
        let manager = NatManager::new(mapper, EventBus::new());

        manager.start(None, local_addr(), 8080).await;
        assert!(matches!(manager.state().await, NatState::Failed { .. }));
    }

    #[tokio::test]
    async fn manual_override_takes_priority_then_falls_back_on_clear() {
        let mapper = Arc::new(StubMapper {
            ip: Ipv4Addr::new(203, 0, 113, 42),
            fail_mapping: false,
            calls: AtomicU32::new(0),
        });
        let manager = NatManager::new(mapper, EventBus::new());
        manager.start(None, local_addr(), 3000).await;
        assert_eq!(manager.external_url().await, Some("http://203.0.113.42:3000".to_string()));

        manager.set_manual_external_url(Some("https://custom.example".to_string())).await;
        assert_eq!(manager.external_url().await, Some("https://custom.example".to_string()));

        manager.set_manual_external_url(None).await;
        assert_eq!(manager.external_url().await, Some("http://203.0.113.42:3000".to_string()));
    }

    #[tokio::test]
    async fn retry_upnp_returns_new_state_synchronously() {
        let mapper = Arc::new(StubMapper {
            ip: Ipv4Addr::new(198, 51, 100, 1),
            fail_mapping: false,
            calls: AtomicU32::new(0),
        });
        let manager = NatManager::new(mapper, EventBus::new());

        let state = manager.retry_upnp(local_addr(), 9090).await;
        assert_eq!(
            state,
            NatState::Active {
                external_url: "http://198.51.100.1:9090".to_string(),
                lease_seconds: DEFAULT_LEASE_SECONDS,
            }
        );
    }
}
