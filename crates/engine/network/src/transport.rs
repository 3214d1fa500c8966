//! Transport traits.
//!
//! This module defines the seam between a concrete network transport and the
//! protocol logic running on top of it. The transport owns sockets, framing
//! and per-peer RPC tables; the protocol side only sees peer handles and
//! named packages.
//!
//! All outbound operations are fire-and-forget: they queue work and return
//! without waiting on the network.

use crate::error::NetworkResult;
use crate::package::Package;
use crate::peer::{DisconnectReason, PeerHandle, Role, RouteTarget};
use crate::rpc::RpcHandler;

/// Outbound operations the protocol layer may request from a transport.
pub trait Transport: Send + Sync {
    /// The role this process plays on the network.
    fn role(&self) -> Role;

    /// Shorthand for `role() == Role::Server`.
    fn is_server(&self) -> bool {
        self.role() == Role::Server
    }

    /// Register `handler` for RPCs named `name` arriving from `peer`.
    fn register_handler(&self, peer: PeerHandle, name: &str, handler: RpcHandler)
        -> NetworkResult<()>;

    /// Register `handler` for routed RPCs named `name`, regardless of sender.
    fn register_routed(&self, name: &str, handler: RpcHandler);

    /// Queue a named RPC to `peer`.
    fn send(&self, peer: PeerHandle, name: &str, payload: Package) -> NetworkResult<()>;

    /// Queue a routed RPC. A server targeting [`RouteTarget::Server`] invokes
    /// its own routed handler.
    fn invoke_routed(&self, target: RouteTarget, name: &str, payload: Package)
        -> NetworkResult<()>;

    /// Tell `peer` why it is being dropped, then close the connection.
    fn force_disconnect(&self, peer: PeerHandle, reason: DisconnectReason) -> NetworkResult<()>;

    /// Human-readable remote address, for logging.
    fn remote_address(&self, peer: PeerHandle) -> Option<String>;
}

/// Verdict of a gate hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Deny,
}

/// Inbound connection events a transport reports to the protocol layer.
///
/// Named messages are not part of this trait: they reach the protocol through
/// the handlers registered with [`Transport::register_handler`].
pub trait ConnectionHooks: Send + Sync {
    /// A connection was accepted (server) or established (client). Runs
    /// before any frame from `peer` is dispatched.
    fn on_new_connection(&self, peer: PeerHandle);

    /// The connection to `peer` is gone. Runs exactly once per peer.
    fn on_disconnect(&self, peer: PeerHandle);

    /// The peer started the protocol's peer info exchange.
    fn on_peer_info(&self, peer: PeerHandle, payload: &Package) -> Gate;

    /// A routed RPC named `name` arrived from the remote `peer`. Runs before
    /// the routed handler; `Gate::Deny` drops the frame.
    fn on_routed_rpc(&self, peer: PeerHandle, name: &str) -> Gate;
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address to connect to (for client) or bind to (for server).
    pub address: String,

    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Largest accepted frame, in bytes.
    pub max_frame_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:2456".to_string(),
            connect_timeout_ms: 10_000,
            max_frame_len: 1024 * 1024,
        }
    }
}
