//! Bounded host-port pool.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Mutex;

/// Hands out host ports for admitted deploys and takes them back on stop.
///
/// The free set is ordered, so the lowest released port is handed out next.
/// Exhaustion is a hard error for the caller, not a retry condition.
pub struct PortPool {
    range: RangeInclusive<u16>,
    free: Mutex<BTreeSet<u16>>,
}

impl PortPool {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            free: Mutex::new(range.clone().collect()),
            range,
        }
    }

    /// `None` when the pool is exhausted.
    pub fn allocate(&self) -> Option<u16> {
        self.free.lock().unwrap().pop_first()
    }

    /// Return a port to the pool. Ports outside the configured range are
    /// ignored.
    pub fn release(&self, port: u16) {
        if self.range.contains(&port) {
            self.free.lock().unwrap().insert(port);
        }
    }

    /// Take a specific port out of the pool (reconciliation re-adopting a
    /// container that already holds it). False when it is not free.
    pub fn claim(&self, port: u16) -> bool {
        self.free.lock().unwrap().remove(&port)
    }

    pub fn available(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}
