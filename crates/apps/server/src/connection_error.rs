//! Last handshake failure, kept for display.
//!
//! The slot is advisory text for humans. A newer failure overwrites an older
//! unread one and nothing makes decisions based on it.

use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ConnectionErrorSlot {
    message: Arc<RwLock<Option<String>>>,
}

impl ConnectionErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: impl Into<String>) {
        *self.message.write() = Some(message.into());
    }

    pub fn get(&self) -> Option<String> {
        self.message.read().clone()
    }

    pub fn take(&self) -> Option<String> {
        self.message.write().take()
    }

    pub fn clear(&self) {
        *self.message.write() = None;
    }
}

/// Text for the connection-failed panel: the transport's own status line,
/// followed by the handshake diagnostic when there is one.
pub fn connect_failed_text(status: &str, slot: &ConnectionErrorSlot) -> String {
    match slot.get() {
        Some(message) if !message.is_empty() => format!("{status}\n{message}"),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_writer_wins() {
        let slot = ConnectionErrorSlot::new();
        assert_eq!(slot.get(), None);

        slot.record("first");
        slot.clone().record("second");

        assert_eq!(slot.get().as_deref(), Some("second"));
        assert_eq!(slot.take().as_deref(), Some("second"));
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn test_connect_failed_text_appends_diagnostic() {
        let slot = ConnectionErrorSlot::new();
        assert_eq!(
            connect_failed_text("Incompatible version", &slot),
            "Incompatible version"
        );

        slot.record("Mod Installed: 1.0.0 (AAAA)\n Needed: 0.9.0 (AAAA)");
        assert_eq!(
            connect_failed_text("Incompatible version", &slot),
            "Incompatible version\nMod Installed: 1.0.0 (AAAA)\n Needed: 0.9.0 (AAAA)"
        );

        slot.clear();
        assert_eq!(connect_failed_text("Disconnected", &slot), "Disconnected");
    }
}
