//! Peer identifiers, process roles and disconnect reason codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle for a live connection.
///
/// Handles are only compared and hashed. A transport never hands out the same
/// handle twice, so a handle that outlives its connection simply stops
/// matching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerHandle(u64);

impl PeerHandle {
    /// Handle used as the sender of RPCs invoked locally on this process.
    pub const LOCAL: PeerHandle = PeerHandle(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Hands out increasing peer handles, starting after [`PeerHandle::LOCAL`].
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> PeerHandle {
        PeerHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side of the connection this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Destination of a routed RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Whichever process holds the server role.
    Server,
    /// One specific connected peer.
    Peer(PeerHandle),
}

/// Reason codes carried by the `Error` RPC before a forced disconnect.
///
/// The numeric values are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum DisconnectReason {
    IncompatibleVersion = 3,
    Disconnected = 4,
    ConnectFailed = 5,
    WrongPassword = 6,
    AlreadyConnected = 7,
    Banned = 8,
    ServerFull = 9,
}

impl DisconnectReason {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            3 => Some(Self::IncompatibleVersion),
            4 => Some(Self::Disconnected),
            5 => Some(Self::ConnectFailed),
            6 => Some(Self::WrongPassword),
            7 => Some(Self::AlreadyConnected),
            8 => Some(Self::Banned),
            9 => Some(Self::ServerFull),
            _ => None,
        }
    }

    /// Status line shown to a user whose connection failed for this reason.
    pub fn description(self) -> &'static str {
        match self {
            Self::IncompatibleVersion => "Incompatible version",
            Self::Disconnected => "Disconnected",
            Self::ConnectFailed => "Failed to connect",
            Self::WrongPassword => "Wrong password",
            Self::AlreadyConnected => "Already connected",
            Self::Banned => "Banned",
            Self::ServerFull => "Server is full",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
