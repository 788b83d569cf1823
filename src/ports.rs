//! Host port allocation
//!
//! Tracks which host ports this process has handed out to projects and probes
//! the OS with real binds. The probe is best-effort: a port that passes may be
//! taken by another process before the container publishes it, and ports held
//! by other processes are only ever detected, never reserved in advance.

use std::collections::HashSet;
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Ports scanned when the preferred one is taken
pub const SCAN_RANGE: RangeInclusive<u16> = 3000..=9000;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("Port {0} is not available")]
    Unavailable(u16),

    #[error("No free port left: {0}")]
    Exhausted(#[source] io::Error),

    #[error("Port {0} leaves no port for the frontend service")]
    NoFrontendPort(u16),
}

impl PortError {
    pub fn help_message(&self) -> String {
        match self {
            PortError::Unavailable(port) => format!(
                "Error: Port {} is not available\n\n\
                Help: Another managed project or another process already uses it.\n\
                Pick a different port, or stop whatever is listening on {}.",
                port, port
            ),
            PortError::Exhausted(e) => format!(
                "Error: The OS refused to hand out an ephemeral port\n\nDetails: {}",
                e
            ),
            PortError::NoFrontendPort(port) => format!(
                "Error: Port {} is the last port\n\n\
                Help: Full-stack projects publish the frontend on the port after the\n\
                backend. Pick a backend port below {}.",
                port, port
            ),
        }
    }
}

/// In-memory claimed-port set shared by every project of one orchestrator
#[derive(Debug)]
pub struct PortAllocator {
    claimed: Mutex<HashSet<u16>>,
    range: RangeInclusive<u16>,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::with_range(SCAN_RANGE)
    }

    pub fn with_range(range: RangeInclusive<u16>) -> Self {
        Self {
            claimed: Mutex::new(HashSet::new()),
            range,
        }
    }

    fn claimed_set(&self) -> MutexGuard<'_, HashSet<u16>> {
        // The set holds plain integers, so a poisoned lock is still consistent
        self.claimed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims `preferred` when possible, otherwise the first free port in the
    /// scan range, otherwise an OS-assigned ephemeral port
    pub fn find_available(&self, preferred: u16) -> Result<u16, PortError> {
        let mut claimed = self.claimed_set();

        if !claimed.contains(&preferred) && is_available(preferred) {
            claimed.insert(preferred);
            debug!("Allocated preferred port {}", preferred);
            return Ok(preferred);
        }

        if let Some(port) = self
            .range
            .clone()
            .find(|port| !claimed.contains(port) && is_available(*port))
        {
            claimed.insert(port);
            info!("Port {} unavailable, allocated {}", preferred, port);
            return Ok(port);
        }

        // An OS-chosen port may in theory collide with a claimed one
        loop {
            let port = ephemeral_port().map_err(PortError::Exhausted)?;
            if claimed.insert(port) {
                warn!(
                    "No free port in {}-{}, using ephemeral port {}",
                    self.range.start(),
                    self.range.end(),
                    port
                );
                return Ok(port);
            }
        }
    }

    /// Claims `port` if it is unclaimed and passes the bind test
    pub fn reserve(&self, port: u16) -> bool {
        let mut claimed = self.claimed_set();
        if claimed.contains(&port) || !is_available(port) {
            return false;
        }
        claimed.insert(port)
    }

    pub fn release(&self, port: u16) {
        if self.claimed_set().remove(&port) {
            debug!("Released port {}", port);
        }
    }

    /// Moves a project from `old` to `new`
    ///
    /// On failure the claimed set is untouched, so `old` stays claimed.
    pub fn update_assignment(&self, old: u16, new: u16) -> bool {
        if old == new {
            return true;
        }

        let mut claimed = self.claimed_set();
        if claimed.contains(&new) || !is_available(new) {
            return false;
        }
        claimed.remove(&old);
        claimed.insert(new);
        true
    }

    pub fn is_claimed(&self, port: u16) -> bool {
        self.claimed_set().contains(&port)
    }

    /// Snapshot of the claimed ports, sorted
    pub fn claimed(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.claimed_set().iter().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn clear(&self) {
        self.claimed_set().clear();
    }
}

/// Whether a TCP listener can bind `port` on all interfaces right now
///
/// Port 0 is rejected; the listener is dropped immediately.
pub fn is_available(port: u16) -> bool {
    if port == 0 {
        return false;
    }
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
}

fn ephemeral_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Binds an OS-chosen port and keeps it held
    fn occupied() -> (TcpListener, u16) {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_port_zero_is_never_available() {
        assert!(!is_available(0));
    }

    #[test]
    fn test_bound_port_is_unavailable() {
        let (_listener, port) = occupied();
        assert!(!is_available(port));
    }

    #[test]
    fn test_reserve_rejects_claimed_port() {
        let allocator = PortAllocator::new();
        let port = allocator.find_available(0).unwrap();

        assert!(allocator.is_claimed(port));
        assert!(!allocator.reserve(port));
    }

    #[test]
    fn test_reserve_rejects_bound_port() {
        let allocator = PortAllocator::new();
        let (_listener, port) = occupied();
        assert!(!allocator.reserve(port));
        assert!(allocator.claimed().is_empty());
    }

    #[test]
    fn test_release_is_noop_when_absent() {
        let allocator = PortAllocator::new();
        allocator.release(4321);
        assert!(allocator.claimed().is_empty());
    }

    #[test]
    fn test_update_same_port_succeeds() {
        let allocator = PortAllocator::new();
        assert!(allocator.update_assignment(4000, 4000));
    }

    #[test]
    fn test_ephemeral_fallback_when_range_exhausted() {
        let (_listener, port) = occupied();
        let allocator = PortAllocator::with_range(port..=port);

        let allocated = allocator.find_available(port).unwrap();
        assert_ne!(allocated, port);
        assert!(allocator.is_claimed(allocated));
    }

    #[test]
    fn test_clear() {
        let allocator = PortAllocator::new();
        allocator.find_available(0).unwrap();
        allocator.clear();
        assert!(allocator.claimed().is_empty());
    }
}
