//! Network transport abstractions for modgate.
//!
//! This crate provides:
//! - Opaque peer handles, process roles and disconnect reason codes
//! - The ordered binary parameter package carried by every RPC
//! - Wire frames and per-peer named RPC handler tables
//! - Transport and connection-hook traits
//! - Per-connection handshake state tracking

pub mod connection;
pub mod error;
pub mod message;
pub mod package;
pub mod peer;
pub mod rpc;
pub mod transport;

pub use connection::{ConnectionEvent, ConnectionInfo, ConnectionState, ConnectionTable};
pub use error::{NetworkError, NetworkResult};
pub use message::{Frame, ERROR, PEER_INFO};
pub use package::{Package, PackageError};
pub use peer::{DisconnectReason, HandleAllocator, PeerHandle, Role, RouteTarget};
pub use rpc::{PeerRpcTables, RpcHandler, RpcTable};
pub use transport::{ConnectionHooks, Gate, Transport, TransportConfig};
