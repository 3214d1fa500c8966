//! Set of peers that completed the handshake.
//!
//! Only a server populates this. Lookups and updates lock one shard for the
//! duration of the single call and never across a send.

use dashmap::DashSet;
use modgate_network::PeerHandle;

#[derive(Debug, Default)]
pub struct ValidatedPeers {
    peers: DashSet<PeerHandle>,
}

impl ValidatedPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the peer was not already present.
    pub fn add(&self, peer: PeerHandle) -> bool {
        self.peers.insert(peer)
    }

    /// Returns `true` if the peer was present.
    pub fn remove(&self, peer: PeerHandle) -> bool {
        self.peers.remove(&peer).is_some()
    }

    pub fn contains(&self, peer: PeerHandle) -> bool {
        self.peers.contains(&peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Copy of the current members, for broadcasting.
    pub fn snapshot(&self) -> Vec<PeerHandle> {
        let mut peers: Vec<_> = self.peers.iter().map(|peer| *peer).collect();
        peers.sort();
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let registry = ValidatedPeers::new();
        let peer = PeerHandle::new(1);

        assert!(registry.add(peer));
        assert!(!registry.add(peer));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(peer));

        assert!(registry.remove(peer));
        assert!(!registry.remove(peer));
        assert!(!registry.contains(peer));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removing_unknown_peer_is_noop() {
        let registry = ValidatedPeers::new();
        registry.add(PeerHandle::new(1));

        assert!(!registry.remove(PeerHandle::new(2)));
        assert_eq!(registry.snapshot(), vec![PeerHandle::new(1)]);
    }

    #[test]
    fn test_concurrent_peers_leave_no_stale_entries() {
        let registry = Arc::new(ValidatedPeers::new());
        let workers: Vec<_> = (0..16u64)
            .map(|worker| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for round in 0..500u64 {
                        let peer = PeerHandle::new(worker * 1_000 + round);
                        registry.add(peer);
                        assert!(registry.contains(peer));
                        registry.remove(peer);
                        assert!(!registry.contains(peer));
                    }
                    // Every worker keeps exactly one peer connected.
                    registry.add(PeerHandle::new(worker * 1_000 + 999));
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 16);
        for worker in 0..16u64 {
            assert!(registry.contains(PeerHandle::new(worker * 1_000 + 999)));
            assert!(!registry.contains(PeerHandle::new(worker * 1_000)));
        }
    }
}
