//! Named RPC handler tables.

use crate::package::Package;
use crate::peer::PeerHandle;
use dashmap::DashMap;
use std::sync::Arc;

/// Callback invoked with the sending peer and the received package.
pub type RpcHandler = Arc<dyn Fn(PeerHandle, Package) + Send + Sync>;

/// Handlers keyed by RPC name.
#[derive(Clone, Default)]
pub struct RpcTable {
    handlers: Arc<DashMap<String, RpcHandler>>,
}

impl RpcTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register(&self, name: &str, handler: RpcHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Run the handler for `name`. Returns `false` when none is registered.
    pub fn dispatch(&self, name: &str, sender: PeerHandle, payload: Package) -> bool {
        // Clone out of the map so handlers may register further RPCs.
        let handler = match self.handlers.get(name) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        handler(sender, payload);
        true
    }
}

/// One [`RpcTable`] per connected peer.
#[derive(Clone, Default)]
pub struct PeerRpcTables {
    tables: Arc<DashMap<PeerHandle, RpcTable>>,
}

impl PeerRpcTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, peer: PeerHandle, name: &str, handler: RpcHandler) {
        let table = self.tables.entry(peer).or_default().clone();
        table.register(name, handler);
    }

    pub fn is_registered(&self, peer: PeerHandle, name: &str) -> bool {
        self.tables
            .get(&peer)
            .map(|table| table.is_registered(name))
            .unwrap_or(false)
    }

    pub fn dispatch(&self, peer: PeerHandle, name: &str, payload: Package) -> bool {
        let table = match self.tables.get(&peer) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        table.dispatch(name, peer, payload)
    }

    /// Drop every handler registered for `peer`.
    pub fn remove_peer(&self, peer: PeerHandle) {
        self.tables.remove(&peer);
    }
}
