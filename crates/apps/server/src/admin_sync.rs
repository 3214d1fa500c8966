//! Admin list sync, the follow-up to a successful handshake.
//!
//! A server answers every routed `RequestAdminSync` by sending the current
//! admin list to all validated peers. Clients keep the last list received.

use crate::protocol::{decode_admin_list, encode_admin_list, ADMIN_LIST, REQUEST_ADMIN_SYNC};
use crate::registry::ValidatedPeers;
use modgate_network::{Package, PeerHandle, RpcHandler, Transport};
use parking_lot::RwLock;
use std::sync::Arc;

pub struct AdminSync {
    transport: Arc<dyn Transport>,
    registry: Arc<ValidatedPeers>,
    admins: Vec<String>,
    received: RwLock<Option<Vec<String>>>,
}

impl AdminSync {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<ValidatedPeers>,
        admins: Vec<String>,
    ) -> Self {
        Self {
            transport,
            registry,
            admins,
            received: RwLock::new(None),
        }
    }

    /// Register the routed `RequestAdminSync` handler. Servers only.
    pub fn install(self: &Arc<Self>) {
        if !self.transport.is_server() {
            return;
        }
        let sync = Arc::downgrade(self);
        let handler: RpcHandler = Arc::new(move |sender: PeerHandle, _payload: Package| {
            if let Some(sync) = sync.upgrade() {
                tracing::debug!("Admin sync requested by {}", sender);
                sync.broadcast();
            }
        });
        self.transport.register_routed(REQUEST_ADMIN_SYNC, handler);
    }

    /// Accept `AdminList` messages from the server behind `peer`.
    pub fn listen(self: &Arc<Self>, peer: PeerHandle) {
        let sync = Arc::downgrade(self);
        let handler: RpcHandler = Arc::new(move |peer: PeerHandle, payload: Package| {
            let Some(sync) = sync.upgrade() else {
                return;
            };
            match decode_admin_list(payload) {
                Ok(admins) => {
                    tracing::info!("Received {} admins from {}", admins.len(), peer);
                    *sync.received.write() = Some(admins);
                }
                Err(err) => tracing::warn!("Ignoring malformed admin list from {}: {}", peer, err),
            }
        });
        if let Err(err) = self.transport.register_handler(peer, ADMIN_LIST, handler) {
            tracing::warn!("Cannot register {} for {}: {}", ADMIN_LIST, peer, err);
        }
    }

    /// Send the admin list to every validated peer. Returns how many sends
    /// were queued.
    pub fn broadcast(&self) -> usize {
        let payload = encode_admin_list(&self.admins);
        self.registry
            .snapshot()
            .into_iter()
            .filter(|peer| match self.transport.send(*peer, ADMIN_LIST, payload.clone()) {
                Ok(()) => true,
                Err(err) => {
                    tracing::debug!("Admin list not sent to {}: {}", peer, err);
                    false
                }
            })
            .count()
    }

    /// The admin list most recently received from a server.
    pub fn received(&self) -> Option<Vec<String>> {
        self.received.read().clone()
    }
}
