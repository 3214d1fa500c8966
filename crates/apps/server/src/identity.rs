//! Identity of the mod taking part in the handshake.

/// Name, version and author of the running mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModIdentity {
    pub name: String,
    pub version: String,
    pub author: String,
}

impl ModIdentity {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: author.into(),
        }
    }

    /// Globally unique identifier, `author.name`.
    pub fn guid(&self) -> String {
        format!("{}.{}", self.author, self.name)
    }

    /// Name of the handshake RPC, scoped to this mod so several mods can run
    /// their own checks over one connection.
    pub fn version_check_rpc(&self) -> String {
        format!("{}_VersionCheck", self.name)
    }
}

impl Default for ModIdentity {
    /// Identity of this build, taken from the package metadata.
    fn default() -> Self {
        let author = env!("CARGO_PKG_AUTHORS")
            .split(':')
            .next()
            .unwrap_or_default();
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_name_is_scoped_to_mod() {
        let identity = ModIdentity::new("LocationManager", "1.0.0", "azumatt");
        assert_eq!(identity.version_check_rpc(), "LocationManager_VersionCheck");
        assert_eq!(identity.guid(), "azumatt.LocationManager");
    }

    #[test]
    fn test_default_identity_uses_package_metadata() {
        let identity = ModIdentity::default();
        assert_eq!(identity.name, "modgate-server");
        assert_eq!(identity.version, env!("CARGO_PKG_VERSION"));
        assert!(!identity.author.is_empty());
    }
}
