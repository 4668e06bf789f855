//! Connection session data structures.

/// Bookkeeping for one connection attempt.
///
/// A session becomes active when `connect()` is accepted and records the
/// target address once a scan result matches. It is cleared on disconnect
/// or failure. Only the connection state machine mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSession {
    /// Address of the matched trainer, once one was found.
    pub target_address: Option<String>,

    /// Whether a connection attempt or connection is in progress.
    pub active: bool,
}

impl ConnectionSession {
    /// A freshly started session with no target yet.
    pub fn started() -> Self {
        Self {
            target_address: None,
            active: true,
        }
    }

    /// Record the address of the matched trainer.
    pub fn with_target(mut self, address: impl Into<String>) -> Self {
        self.target_address = Some(address.into());
        self
    }

    /// Check if a target address has been recorded.
    pub fn has_target(&self) -> bool {
        self.target_address.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_default_is_inactive() {
        let session = ConnectionSession::default();
        assert!(!session.active);
        assert!(!session.has_target());
    }

    #[test]
    fn test_session_with_target() {
        let session = ConnectionSession::started().with_target("AA:BB:CC:DD");
        assert!(session.active);
        assert_eq!(session.target_address.as_deref(), Some("AA:BB:CC:DD"));
    }
}
