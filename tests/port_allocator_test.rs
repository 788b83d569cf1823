use dockhand::ports::is_available;
use dockhand::PortAllocator;
use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::Arc;
use std::thread;

/// A port the OS just handed out and released again
fn free_port() -> u16 {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
    listener.local_addr().unwrap().port()
}

fn allocator_near(port: u16) -> PortAllocator {
    PortAllocator::with_range(port..=port.saturating_add(200))
}

#[test]
fn test_preferred_port_when_free() {
    let port = free_port();
    let ports = allocator_near(port);

    assert_eq!(ports.find_available(port).unwrap(), port);
    assert!(ports.is_claimed(port));
}

#[test]
fn test_claimed_preferred_port_is_skipped() {
    let port = free_port();
    let ports = allocator_near(port);

    let first = ports.find_available(port).unwrap();
    let second = ports.find_available(port).unwrap();

    assert_eq!(first, port);
    assert_ne!(second, port);
    assert!(ports.is_claimed(second));
}

#[test]
fn test_bound_preferred_port_is_skipped() {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
    let bound = listener.local_addr().unwrap().port();
    let ports = allocator_near(bound);

    let port = ports.find_available(bound).unwrap();

    assert_ne!(port, bound);
    assert!(!ports.is_claimed(bound));
    drop(listener);
}

#[test]
fn test_release_then_reserve() {
    let port = free_port();
    let ports = PortAllocator::new();

    assert!(ports.reserve(port));
    assert!(!ports.reserve(port));

    ports.release(port);
    assert!(!ports.is_claimed(port));
    assert!(ports.reserve(port));
}

#[test]
fn test_failed_update_leaves_claims_unchanged() {
    let ports = PortAllocator::new();
    let a = free_port();
    let b = loop {
        let candidate = free_port();
        if candidate != a {
            break candidate;
        }
    };
    assert!(ports.reserve(a));
    assert!(ports.reserve(b));
    let before = ports.claimed();

    assert!(!ports.update_assignment(a, b));
    assert_eq!(ports.claimed(), before);
}

#[test]
fn test_successful_update_moves_claim() {
    let ports = PortAllocator::new();
    let old = free_port();
    assert!(ports.reserve(old));

    let new = loop {
        let candidate = free_port();
        if candidate != old {
            break candidate;
        }
    };
    assert!(ports.update_assignment(old, new));
    assert!(!ports.is_claimed(old));
    assert!(ports.is_claimed(new));
}

#[test]
fn test_concurrent_allocations_are_distinct() {
    let port = free_port();
    let ports = Arc::new(allocator_near(port));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ports = Arc::clone(&ports);
            thread::spawn(move || ports.find_available(port).unwrap())
        })
        .collect();

    let allocated: HashSet<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(allocated.len(), 8);
}

#[test]
fn test_claiming_does_not_bind() {
    let port = free_port();
    let ports = PortAllocator::new();
    assert!(ports.reserve(port));

    // The claim is bookkeeping only; the socket stays free for the container
    assert!(is_available(port));
}
