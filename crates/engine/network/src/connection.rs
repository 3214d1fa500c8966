//! Connection state management.
//!
//! Tracks where each live connection stands in the compatibility handshake
//! and publishes every transition to subscribers.

use crate::peer::PeerHandle;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Capacity of the state-change broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Handshake progress of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport accepted the connection; nothing sent yet.
    Connected,
    /// Our fingerprint is on its way; waiting for the peer's.
    ChallengeSent,
    /// Fingerprints matched.
    Validated,
    /// Fingerprints differed, could not be decoded, or a gated RPC arrived
    /// too early.
    Rejected,
    /// Terminal.
    Disconnected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::ChallengeSent => write!(f, "ChallengeSent"),
            Self::Validated => write!(f, "Validated"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Emitted on every state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub peer: PeerHandle,
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Information about one tracked connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub remote_address: Option<String>,
    pub connected_at: Instant,
}

/// Live connections and their handshake state.
///
/// Closed connections are dropped from the table, so a handle that is no
/// longer present is treated as disconnected and cannot be revived.
#[derive(Clone)]
pub struct ConnectionTable {
    peers: Arc<DashMap<PeerHandle, ConnectionInfo>>,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            peers: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Start tracking `peer` in [`ConnectionState::Connected`].
    pub fn open(&self, peer: PeerHandle, remote_address: Option<String>) {
        self.peers.insert(
            peer,
            ConnectionInfo {
                state: ConnectionState::Connected,
                remote_address,
                connected_at: Instant::now(),
            },
        );
    }

    /// Move `peer` to `to`, returning the previous state.
    ///
    /// Returns `None` without recording anything if `peer` is not tracked.
    pub fn transition(&self, peer: PeerHandle, to: ConnectionState) -> Option<ConnectionState> {
        let from = {
            let mut info = self.peers.get_mut(&peer)?;
            std::mem::replace(&mut info.state, to)
        };
        tracing::debug!("{} {} -> {}", peer, from, to);
        let _ = self.events.send(ConnectionEvent { peer, from, to });
        Some(from)
    }

    /// Move `peer` from `from` to `to` only if it is still in `from`.
    ///
    /// The check and the write happen under the entry lock, so of two racing
    /// callers expecting the same state at most one succeeds.
    pub fn advance(&self, peer: PeerHandle, from: ConnectionState, to: ConnectionState) -> bool {
        {
            let Some(mut info) = self.peers.get_mut(&peer) else {
                return false;
            };
            if info.state != from {
                tracing::debug!("{} is {}, not moving to {}", peer, info.state, to);
                return false;
            }
            info.state = to;
        }
        tracing::debug!("{} {} -> {}", peer, from, to);
        let _ = self.events.send(ConnectionEvent { peer, from, to });
        true
    }

    /// Stop tracking `peer`, publishing the move to
    /// [`ConnectionState::Disconnected`]. Returns the last state held.
    pub fn close(&self, peer: PeerHandle) -> Option<ConnectionState> {
        let (_, info) = self.peers.remove(&peer)?;
        tracing::debug!("{} {} -> {}", peer, info.state, ConnectionState::Disconnected);
        let _ = self.events.send(ConnectionEvent {
            peer,
            from: info.state,
            to: ConnectionState::Disconnected,
        });
        Some(info.state)
    }

    pub fn state(&self, peer: PeerHandle) -> Option<ConnectionState> {
        self.peers.get(&peer).map(|info| info.state)
    }

    pub fn info(&self, peer: PeerHandle) -> Option<ConnectionInfo> {
        self.peers.get(&peer).map(|info| info.clone())
    }

    pub fn is_open(&self, peer: PeerHandle) -> bool {
        self.peers.contains_key(&peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_transitions() {
        let table = ConnectionTable::new();
        let peer = PeerHandle::new(1);
        let mut events = table.subscribe();

        table.open(peer, Some("127.0.0.1:2456".to_string()));
        assert_eq!(table.state(peer), Some(ConnectionState::Connected));

        assert_eq!(
            table.transition(peer, ConnectionState::ChallengeSent),
            Some(ConnectionState::Connected)
        );
        assert_eq!(
            table.transition(peer, ConnectionState::Validated),
            Some(ConnectionState::ChallengeSent)
        );

        let info = table.info(peer).unwrap();
        assert_eq!(info.remote_address.as_deref(), Some("127.0.0.1:2456"));

        assert_eq!(table.close(peer), Some(ConnectionState::Validated));
        assert_eq!(table.state(peer), None);

        let seen: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.to)
            .collect();
        assert_eq!(
            seen,
            vec![
                ConnectionState::ChallengeSent,
                ConnectionState::Validated,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[test]
    fn test_advance_requires_expected_state() {
        let table = ConnectionTable::new();
        let peer = PeerHandle::new(3);
        table.open(peer, None);
        table.transition(peer, ConnectionState::ChallengeSent);

        assert!(table.advance(peer, ConnectionState::ChallengeSent, ConnectionState::Rejected));
        assert!(!table.advance(peer, ConnectionState::ChallengeSent, ConnectionState::Validated));
        assert_eq!(table.state(peer), Some(ConnectionState::Rejected));

        table.close(peer);
        assert!(!table.advance(peer, ConnectionState::Rejected, ConnectionState::Validated));
    }

    #[test]
    fn test_closed_connection_cannot_be_revived() {
        let table = ConnectionTable::new();
        let peer = PeerHandle::new(2);

        table.open(peer, None);
        table.close(peer);

        assert_eq!(table.transition(peer, ConnectionState::Validated), None);
        assert_eq!(table.close(peer), None);
        assert!(!table.is_open(peer));
        assert!(table.is_empty());
    }
}
