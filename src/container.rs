//! The container snapshot model consumed by [`crate::synth`] (spec.md §2).
//!
//! This is an engine-facing value type, not a runtime client — populating it
//! from a real container runtime (Docker, Podman, containerd) is out of scope
//! (spec.md Non-goals) and left to whatever implements [`crate::runtime::ContainerRuntime`].

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

/// One host-side binding for a published container port: the host IP the
/// runtime bound it to (may be `0.0.0.0`, meaning "all interfaces", which is
/// not usable as a publication address) and the host port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBinding {
    pub host_ip: Ipv4Addr,
    pub host_port: u16,
}

/// A point-in-time view of one container, as handed to the synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    /// Host-mapped ports, keyed by container-internal port (spec.md §3:
    /// "map from container-port → list of host bindings each carrying
    /// host-ip and host-port").
    pub published_ports: BTreeMap<u16, Vec<HostBinding>>,
    /// `None` while the container is running; `Some(code)` once it has
    /// exited.
    pub exit_code: Option<i64>,
    /// Whether the exit was requested by the operator (stop/restart) rather
    /// than a crash — governs whether records are withdrawn immediately or
    /// left in place pending a restart (spec.md §6 exit-record retention).
    pub stopped_by_request: bool,
}

impl Container {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.exit_code.is_none()
    }

    /// Exited non-gracefully: process died without the operator asking for
    /// it to stop. Per spec.md §6, such containers keep their records
    /// published (on the assumption of a supervisor-driven restart) rather
    /// than being withdrawn immediately like a graceful stop.
    #[must_use]
    pub fn exited_ungracefully(&self) -> bool {
        self.exit_code.is_some_and(|code| code != 0) && !self.stopped_by_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Container {
        Container {
            id: "abc123".into(),
            name: "web1".into(),
            labels: BTreeMap::new(),
            ipv4: Some(Ipv4Addr::new(10, 0, 0, 5)),
            ipv6: None,
            published_ports: BTreeMap::new(),
            exit_code: None,
            stopped_by_request: false,
        }
    }

    #[test]
    fn running_container_is_not_exited_ungracefully() {
        assert!(!base().exited_ungracefully());
    }

    #[test]
    fn crash_is_ungraceful() {
        let c = Container {
            exit_code: Some(137),
            stopped_by_request: false,
            ..base()
        };
        assert!(c.exited_ungracefully());
    }

    #[test]
    fn requested_stop_is_not_ungraceful() {
        let c = Container {
            exit_code: Some(0),
            stopped_by_request: true,
            ..base()
        };
        assert!(!c.exited_ungracefully());
    }

    #[test]
    fn clean_exit_without_request_is_not_ungraceful() {
        let c = Container {
            exit_code: Some(0),
            stopped_by_request: false,
            ..base()
        };
        assert!(!c.exited_ungracefully());
    }
}
