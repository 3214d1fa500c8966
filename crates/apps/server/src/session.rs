//! Top-level owner of the handshake state for one process.

use crate::admin_sync::AdminSync;
use crate::config::ServerConfig;
use crate::connection_error::ConnectionErrorSlot;
use crate::error::HandshakeError;
use crate::fingerprint::{Fingerprint, FingerprintComputer};
use crate::hooks::LifecycleHooks;
use crate::identity::ModIdentity;
use crate::metrics::HandshakeMetrics;
use crate::registry::ValidatedPeers;
use crate::version_handshake::VersionHandshake;
use modgate_network::{ConnectionTable, Transport};
use std::sync::Arc;

/// Everything the handshake needs, wired to one transport.
///
/// Each session owns its own registry and error slot, so several sessions
/// (for example a server and a client in one test) never share state.
pub struct ServerSession {
    handshake: Arc<VersionHandshake>,
    admin_sync: Arc<AdminSync>,
    registry: Arc<ValidatedPeers>,
    connection_error: ConnectionErrorSlot,
    connections: ConnectionTable,
    metrics: Arc<HandshakeMetrics>,
    is_server: bool,
}

impl ServerSession {
    pub fn new(
        identity: ModIdentity,
        local: Fingerprint,
        transport: Arc<dyn Transport>,
        admins: Vec<String>,
    ) -> Self {
        let registry = Arc::new(ValidatedPeers::new());
        let connection_error = ConnectionErrorSlot::new();
        let connections = ConnectionTable::new();
        let metrics = Arc::new(HandshakeMetrics::default());
        let is_server = transport.is_server();

        let handshake = Arc::new(VersionHandshake::new(
            identity,
            local,
            transport.clone(),
            registry.clone(),
            connection_error.clone(),
            connections.clone(),
            metrics.clone(),
        ));

        let admin_sync = Arc::new(AdminSync::new(transport, registry.clone(), admins));
        admin_sync.install();

        Self {
            handshake,
            admin_sync,
            registry,
            connection_error,
            connections,
            metrics,
            is_server,
        }
    }

    /// Compute the local fingerprint once and build the session around it.
    ///
    /// Fails with [`HandshakeError::LocalFingerprintUnreadable`] when the
    /// artifact cannot be read.
    pub fn from_config(
        config: &ServerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, HandshakeError> {
        let version = config.identity.version.clone();
        let computer = match &config.fingerprint_path {
            Some(path) => FingerprintComputer::new(version, path),
            None => FingerprintComputer::for_current_exe(version)?,
        };
        let local = computer.compute()?;
        tracing::info!(
            "{} local fingerprint {} from {}",
            config.identity.guid(),
            local,
            computer.source().display()
        );

        Ok(Self::new(
            config.identity.clone(),
            local,
            transport,
            config.admins.clone(),
        ))
    }

    /// Hooks to hand to the transport.
    pub fn hooks(&self) -> Arc<LifecycleHooks> {
        Arc::new(LifecycleHooks::new(
            self.handshake.clone(),
            self.admin_sync.clone(),
            self.is_server,
        ))
    }

    pub fn handshake(&self) -> &Arc<VersionHandshake> {
        &self.handshake
    }

    pub fn admin_sync(&self) -> &Arc<AdminSync> {
        &self.admin_sync
    }

    pub fn registry(&self) -> &Arc<ValidatedPeers> {
        &self.registry
    }

    pub fn connection_error(&self) -> &ConnectionErrorSlot {
        &self.connection_error
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn metrics(&self) -> &Arc<HandshakeMetrics> {
        &self.metrics
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }
}
