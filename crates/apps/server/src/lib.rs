pub mod admin_sync;
pub mod config;
pub mod connection_error;
pub mod error;
pub mod fingerprint;
pub mod hooks;
pub mod identity;
pub mod metrics;
pub mod net;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod version_handshake;

pub use admin_sync::AdminSync;
pub use config::ServerConfig;
pub use connection_error::{connect_failed_text, ConnectionErrorSlot};
pub use error::HandshakeError;
pub use fingerprint::{Fingerprint, FingerprintComputer, FingerprintError};
pub use hooks::LifecycleHooks;
pub use identity::ModIdentity;
pub use metrics::HandshakeMetrics;
pub use net::TcpTransport;
pub use registry::ValidatedPeers;
pub use session::ServerSession;
pub use version_handshake::{HandshakeOutcome, VersionHandshake};
