//! Listening port allocation for per-session torrent engines.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::PortConfig;

/// Hands out listening ports and remembers which ones are leased.
///
/// Draws random ports from the primary range, retrying on collision. When
/// every draw collides the allocator falls back to a random port from the
/// fallback range without checking it, so allocation never fails but two
/// sessions can, rarely, end up with the same fallback port. Leases are
/// counted per port; a shared port stays leased until its last holder
/// releases it.
#[derive(Debug)]
pub struct PortAllocator {
    config: PortConfig,
    leased: Mutex<HashMap<u16, usize>>,
}

impl PortAllocator {
    pub fn new(config: PortConfig) -> Self {
        Self {
            config,
            leased: Mutex::new(HashMap::new()),
        }
    }

    /// Leases a port and returns it. Pair with [`Self::release`].
    pub fn allocate(&self) -> u16 {
        let mut leased = self.leased.lock();
        let mut rng = rand::rng();

        if !self.config.primary.is_empty() {
            for _ in 0..self.config.max_attempts {
                let port = rng.random_range(self.config.primary.clone());
                if let Entry::Vacant(slot) = leased.entry(port) {
                    slot.insert(1);
                    tracing::trace!(port, "Leased listening port");
                    return port;
                }
            }
        }

        let port = if self.config.fallback.is_empty() {
            self.config.fallback.start
        } else {
            rng.random_range(self.config.fallback.clone())
        };
        let holders = leased.entry(port).or_insert(0);
        *holders += 1;
        tracing::warn!(
            port,
            shared = *holders > 1,
            attempts = self.config.max_attempts,
            "Primary port range exhausted, using fallback port"
        );
        port
    }

    /// Drops one lease on a port. The port returns to the pool once no
    /// holder is left. Releasing an unleased port is a no-op.
    pub fn release(&self, port: u16) {
        let mut leased = self.leased.lock();
        let Entry::Occupied(mut holders) = leased.entry(port) else {
            return;
        };
        *holders.get_mut() -= 1;
        if *holders.get() == 0 {
            holders.remove();
            tracing::trace!(port, "Released listening port");
        }
    }

    /// Leases a port that is released when the returned guard drops.
    pub fn allocate_lease(self: &Arc<Self>) -> PortLease {
        PortLease {
            port: self.allocate(),
            allocator: Arc::clone(self),
        }
    }

    pub fn is_leased(&self, port: u16) -> bool {
        self.leased.lock().contains_key(&port)
    }

    /// Number of distinct ports currently leased.
    pub fn leased_count(&self) -> usize {
        self.leased.lock().len()
    }
}

/// A leased port, released back to its allocator on drop.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    allocator: Arc<PortAllocator>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.allocator.release(self.port);
    }
}
