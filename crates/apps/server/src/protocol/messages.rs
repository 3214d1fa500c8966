//! Follow-up messages exchanged after a successful handshake.

use modgate_network::{Package, PackageError};

/// Routed to the server once a peer validates.
pub const REQUEST_ADMIN_SYNC: &str = "RequestAdminSync";

/// Server -> peer list of admin identifiers.
pub const ADMIN_LIST: &str = "AdminList";

pub fn encode_admin_list(admins: &[String]) -> Package {
    let mut package = Package::new();
    package.write_i32(admins.len() as i32);
    for admin in admins {
        package.write_string(admin);
    }
    package
}

pub fn decode_admin_list(mut package: Package) -> Result<Vec<String>, PackageError> {
    let count = package.read_i32()?.max(0) as usize;
    // Each entry needs at least its one-byte length prefix.
    let mut admins = Vec::with_capacity(count.min(package.remaining()));
    for _ in 0..count {
        admins.push(package.read_string()?);
    }
    Ok(admins)
}
