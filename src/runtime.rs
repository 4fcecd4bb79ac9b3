//! Container-runtime interface (spec.md §1 Out-of-scope: "the
//! container-runtime client library — only its observable event stream and
//! container introspection are specified").
//!
//! No concrete Docker/Podman/containerd client is implemented here; this
//! module only defines the trait and event shape the Event Processor drives,
//! the same way bindy's reconcilers depend on `kube::Client` as a trait
//! object boundary rather than embedding an HTTP client of their own.

use crate::container::Container;
use async_trait::async_trait;

/// One event observed on the runtime's event stream (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A container transitioned to running.
    Started { container_id: String },
    /// A container stopped; `exit_code` and `requested` determine whether
    /// its records are withdrawn or retained (spec.md §6 exit semantics).
    Stopped {
        container_id: String,
        exit_code: i64,
        requested: bool,
    },
    /// Any event this agent does not classify as start/stop — tallied as
    /// ignored (spec.md §4.7: "other events: tally as ignored").
    Other { kind: String },
}

/// The operations the Event Processor needs from a container runtime
/// client. A real implementation (Docker over a unix socket, at
/// `DOCKER_HOST`) is out of scope; tests exercise the Event Processor
/// against an in-memory fake.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Block until the next runtime event is available.
    async fn next_event(&self) -> Option<RuntimeEvent>;

    /// Fetch a full snapshot of one container's current state, including its
    /// parsed labels (spec.md §4.7: "on container start: fetch container
    /// details"). Returns `None` if the container has already disappeared.
    async fn inspect(&self, container_id: &str) -> Option<Container>;

    /// Every currently-running container, used once at startup by the
    /// Reconciler (spec.md §4.6).
    async fn list_running(&self) -> Vec<Container>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{Container, ContainerRuntime, RuntimeEvent};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// An in-memory `ContainerRuntime` double: a fixed event queue plus a
    /// map of known containers, used to drive the Event Processor in tests
    /// without a real runtime socket.
    #[derive(Default)]
    pub struct FakeRuntime {
        pub events: Mutex<VecDeque<RuntimeEvent>>,
        pub containers: Mutex<Vec<Container>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn next_event(&self) -> Option<RuntimeEvent> {
            self.events.lock().unwrap().pop_front()
        }

        async fn inspect(&self, container_id: &str) -> Option<Container> {
            self.containers
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == container_id)
                .cloned()
        }

        async fn list_running(&self) -> Vec<Container> {
            self.containers
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.is_running())
                .cloned()
                .collect()
        }
    }
}
