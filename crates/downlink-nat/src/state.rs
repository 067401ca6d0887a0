//! NAT/UPnP state machine (§4.3): `idle` at rest, `manual` when a user URL
//! overrides discovery, `mapping` while a UPnP attempt is in flight, `active`
//! once a mapping and external IP are confirmed, `failed` otherwise.

/// Current reachability state of this node's external endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NatState {
    /// No mapping attempted yet and no manual URL configured.
    Idle,
    /// A user-supplied external URL overrides UPnP entirely.
    Manual { external_url: String },
    /// A UPnP mapping attempt is in progress.
    Mapping,
    /// A mapping is live; `external_url` is reachable from peers.
    Active {
        external_url: String,
        lease_seconds: u32,
    },
    /// The last mapping attempt failed; `reason` is the gateway's message.
    Failed { reason: String },
}

impl NatState {
    /// The `&'static str` label used in [`downlink_events::Event::NatStateChanged`].
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Manual { .. } => "manual",
            Self::Mapping => "mapping",
            Self::Active { .. } => "active",
            Self::Failed { .. } => "failed",
        }
    }

    /// The externally reachable URL, if this state has one.
    #[must_use]
    pub fn external_url(&self) -> Option<&str> {
        match self {
            Self::Manual { external_url } | Self::Active { external_url, .. } => Some(external_url),
            Self::Idle | Self::Mapping | Self::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_matches_each_variant() {
        assert_eq!(NatState::Idle.label(), "idle");
        assert_eq!(
            NatState::Manual {
                external_url: "http://example.com".into()
            }
            .label(),
            "manual"
        );
        assert_eq!(NatState::Mapping.label(), "mapping");
        assert_eq!(
            NatState::Active {
                external_url: "http://1.2.3.4:8080".into(),
                lease_seconds: 3600
            }
            .label(),
            "active"
        );
        assert_eq!(
            NatState::Failed {
                reason: "timeout".into()
            }
            .label(),
            "failed"
        );
    }

    #[test]
    fn external_url_present_only_for_manual_and_active() {
        assert_eq!(NatState::Idle.external_url(), None);
        assert_eq!(NatState::Mapping.external_url(), None);
        assert_eq!(
            NatState::Failed {
                reason: "x".into()
            }
            .external_url(),
            None
        );
        assert_eq!(
            NatState::Active {
                external_url: "http://1.2.3.4:8080".into(),
                lease_seconds: 0
            }
            .external_url(),
            Some("http://1.2.3.4:8080")
        );
    }
}
