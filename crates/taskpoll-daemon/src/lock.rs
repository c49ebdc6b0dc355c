//! Single-instance guard: an exclusively bound loopback port held for the
//! process lifetime. The socket never accepts connections.

use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;

pub struct InstanceLock {
    _listener: TcpListener,
}

impl InstanceLock {
    /// Try to take the lock. `None` means another instance already holds it.
    pub fn acquire(port: u16) -> Option<Self> {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => {
                debug!(port, "instance lock acquired");
                Some(Self {
                    _listener: listener,
                })
            }
            Err(e) => {
                debug!(port, "instance lock unavailable: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_first_is_dropped() {
        // Reserve a free port, then release it for the lock under test.
        let port = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let first = InstanceLock::acquire(port).expect("first acquire");
        assert!(InstanceLock::acquire(port).is_none());

        drop(first);
        assert!(InstanceLock::acquire(port).is_some());
    }
}
