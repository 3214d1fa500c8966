//! Per-connection version handshake.
//!
//! Both sides send their [`Fingerprint`] as soon as a connection opens and
//! compare what they receive against their own. Only a server acts on the
//! result: it records validated peers, drops mismatched ones and refuses the
//! peer info exchange from anyone who has not validated yet. A client just
//! records the diagnostic and leaves enforcement to the server.
//!
//! There are no retries and no reply timeout. A peer that never answers stays
//! in `ChallengeSent` until it disconnects, and any gated RPC it sends in the
//! meantime gets it dropped. `Validated` and `Rejected` are final for the
//! connection: later version checks are ignored.

use crate::connection_error::ConnectionErrorSlot;
use crate::error::HandshakeError;
use crate::fingerprint::Fingerprint;
use crate::identity::ModIdentity;
use crate::metrics::HandshakeMetrics;
use crate::protocol::{decode_fingerprint, encode_fingerprint, REQUEST_ADMIN_SYNC};
use crate::registry::ValidatedPeers;
use modgate_network::{
    ConnectionState, ConnectionTable, DisconnectReason, Gate, Package, PeerHandle, RouteTarget,
    RpcHandler, Transport, PEER_INFO,
};
use std::sync::Arc;

/// Result of processing one received version check.
#[derive(Debug)]
pub enum HandshakeOutcome {
    Validated,
    Rejected(HandshakeError),
    /// The connection was not waiting for a version check.
    Ignored,
}

impl HandshakeOutcome {
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated)
    }
}

pub struct VersionHandshake {
    identity: ModIdentity,
    local: Fingerprint,
    transport: Arc<dyn Transport>,
    registry: Arc<ValidatedPeers>,
    connection_error: ConnectionErrorSlot,
    connections: ConnectionTable,
    metrics: Arc<HandshakeMetrics>,
}

impl VersionHandshake {
    pub fn new(
        identity: ModIdentity,
        local: Fingerprint,
        transport: Arc<dyn Transport>,
        registry: Arc<ValidatedPeers>,
        connection_error: ConnectionErrorSlot,
        connections: ConnectionTable,
        metrics: Arc<HandshakeMetrics>,
    ) -> Self {
        Self {
            identity,
            local,
            transport,
            registry,
            connection_error,
            connections,
            metrics,
        }
    }

    pub fn local(&self) -> &Fingerprint {
        &self.local
    }

    pub fn identity(&self) -> &ModIdentity {
        &self.identity
    }

    /// Connected -> ChallengeSent.
    ///
    /// Registers the version check handler for `peer`, then sends our own
    /// fingerprint over the same RPC.
    pub fn begin(self: &Arc<Self>, peer: PeerHandle) {
        self.connections.open(peer, self.transport.remote_address(peer));

        let rpc = self.identity.version_check_rpc();
        tracing::debug!("Registering version RPC handler for {}", peer);

        let handshake = Arc::downgrade(self);
        let handler: RpcHandler = Arc::new(move |peer: PeerHandle, payload: Package| {
            if let Some(handshake) = handshake.upgrade() {
                handshake.on_version_check(peer, payload);
            }
        });
        if let Err(err) = self.transport.register_handler(peer, &rpc, handler) {
            tracing::warn!("Cannot register {} for {}: {}", rpc, peer, err);
            return;
        }

        self.connections.transition(peer, ConnectionState::ChallengeSent);
        tracing::info!("Invoking version check on {}", self.describe(peer));
        match self.transport.send(peer, &rpc, encode_fingerprint(&self.local)) {
            Ok(()) => HandshakeMetrics::record(&self.metrics.challenges_sent),
            Err(err) => tracing::warn!("Failed to send version check to {}: {}", peer, err),
        }
    }

    /// ChallengeSent -> Validated | Rejected.
    pub fn on_version_check(&self, peer: PeerHandle, payload: Package) -> HandshakeOutcome {
        match self.connections.state(peer) {
            Some(ConnectionState::ChallengeSent) => {}
            state => {
                tracing::debug!("Ignoring version check from {} in state {:?}", peer, state);
                return HandshakeOutcome::Ignored;
            }
        }

        let verdict = decode_fingerprint(payload).and_then(|remote| {
            tracing::info!("Version check, local: {}, remote: {}", self.local, remote);
            self.compare(remote)
        });

        match verdict {
            Ok(()) => self.accept(peer),
            Err(err) => self.reject(peer, err),
        }
    }

    /// Gate for the protocol's peer info exchange.
    ///
    /// A server refuses the exchange from any peer that has not validated and
    /// drops the connection. Clients and validated peers pass.
    pub fn gate_peer_info(&self, peer: PeerHandle) -> Gate {
        self.gate(peer, PEER_INFO)
    }

    /// Gate for routed RPCs arriving from a remote peer, with the same rule
    /// as [`Self::gate_peer_info`].
    pub fn gate_routed(&self, peer: PeerHandle, name: &str) -> Gate {
        self.gate(peer, name)
    }

    fn gate(&self, peer: PeerHandle, rpc: &str) -> Gate {
        if !self.transport.is_server() || self.registry.contains(peer) {
            return Gate::Allow;
        }

        let err = HandshakeError::UnvalidatedPeerRpc(peer);
        tracing::warn!(
            "Peer ({}) sent {} without a valid version check, disconnecting: {}",
            self.describe(peer),
            rpc,
            err
        );
        HandshakeMetrics::record(&self.metrics.gated_denials);
        self.connections.transition(peer, ConnectionState::Rejected);
        self.disconnect(peer);
        Gate::Deny
    }

    /// Any -> Disconnected.
    pub fn end(&self, peer: PeerHandle) {
        self.connections.close(peer);
        HandshakeMetrics::record(&self.metrics.disconnects);
        if self.registry.remove(peer) {
            tracing::info!("Peer ({}) disconnected, removing from validated list", peer);
        }
    }

    /// Text shown to the user when `err` rejected the connection.
    pub fn error_message(&self, err: &HandshakeError) -> String {
        let needed = match err.remote() {
            Some(remote) => remote.to_string(),
            None => "<malformed handshake>".to_string(),
        };
        format!(
            "{} Installed: {}\n Needed: {}",
            self.identity.name, self.local, needed
        )
    }

    fn compare(&self, remote: Fingerprint) -> Result<(), HandshakeError> {
        if remote.version != self.local.version {
            return Err(HandshakeError::VersionMismatch {
                local: self.local.clone(),
                remote,
            });
        }
        if remote.content_hash != self.local.content_hash {
            return Err(HandshakeError::HashMismatch {
                local: self.local.clone(),
                remote,
            });
        }
        Ok(())
    }

    fn accept(&self, peer: PeerHandle) -> HandshakeOutcome {
        let validated = self.connections.advance(
            peer,
            ConnectionState::ChallengeSent,
            ConnectionState::Validated,
        );
        if !validated {
            return HandshakeOutcome::Ignored;
        }
        HandshakeMetrics::record(&self.metrics.validated);

        if !self.transport.is_server() {
            tracing::info!("Received same version from server!");
            return HandshakeOutcome::Validated;
        }

        tracing::info!("Adding peer ({}) to validated list", self.describe(peer));
        self.registry.add(peer);
        // end() closes before it removes, so re-checking after the insert
        // never leaves a disconnected peer in the registry.
        if !self.connections.is_open(peer) {
            self.registry.remove(peer);
            return HandshakeOutcome::Validated;
        }

        let (target, payload) = (RouteTarget::Server, Package::new());
        if let Err(err) = self.transport.invoke_routed(target, REQUEST_ADMIN_SYNC, payload) {
            tracing::warn!("Failed to request admin sync: {}", err);
        }
        HandshakeOutcome::Validated
    }

    fn reject(&self, peer: PeerHandle, err: HandshakeError) -> HandshakeOutcome {
        let rejected = self.connections.advance(
            peer,
            ConnectionState::ChallengeSent,
            ConnectionState::Rejected,
        );
        if !rejected {
            return HandshakeOutcome::Ignored;
        }
        HandshakeMetrics::record(&self.metrics.rejected);
        if matches!(err, HandshakeError::MalformedHandshake(_)) {
            HandshakeMetrics::record(&self.metrics.malformed);
        }

        self.connection_error.record(self.error_message(&err));

        if self.transport.is_server() {
            self.registry.remove(peer);
            tracing::warn!(
                "Peer ({}) has incompatible version, disconnecting: {}",
                self.describe(peer),
                err
            );
            self.disconnect(peer);
        } else {
            tracing::warn!("Server has incompatible version: {}", err);
        }
        HandshakeOutcome::Rejected(err)
    }

    fn disconnect(&self, peer: PeerHandle) {
        let reason = DisconnectReason::IncompatibleVersion;
        if let Err(err) = self.transport.force_disconnect(peer, reason) {
            tracing::debug!("Force disconnect of {} failed: {}", peer, err);
        }
    }

    fn describe(&self, peer: PeerHandle) -> String {
        match self.transport.remote_address(peer) {
            Some(address) => format!("{peer} {address}"),
            None => peer.to_string(),
        }
    }
}
