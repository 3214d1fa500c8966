//! Adapters from transport connection events to the handshake.

use crate::admin_sync::AdminSync;
use crate::version_handshake::VersionHandshake;
use modgate_network::{ConnectionHooks, Gate, Package, PeerHandle};
use std::sync::Arc;

pub struct LifecycleHooks {
    handshake: Arc<VersionHandshake>,
    admin_sync: Arc<AdminSync>,
    is_server: bool,
}

impl LifecycleHooks {
    pub fn new(
        handshake: Arc<VersionHandshake>,
        admin_sync: Arc<AdminSync>,
        is_server: bool,
    ) -> Self {
        Self {
            handshake,
            admin_sync,
            is_server,
        }
    }
}

impl ConnectionHooks for LifecycleHooks {
    fn on_new_connection(&self, peer: PeerHandle) {
        self.handshake.begin(peer);
        if !self.is_server {
            self.admin_sync.listen(peer);
        }
    }

    fn on_disconnect(&self, peer: PeerHandle) {
        self.handshake.end(peer);
    }

    fn on_peer_info(&self, peer: PeerHandle, _payload: &Package) -> Gate {
        self.handshake.gate_peer_info(peer)
    }

    fn on_routed_rpc(&self, peer: PeerHandle, name: &str) -> Gate {
        self.handshake.gate_routed(peer, name)
    }
}
