use std::net::SocketAddr;

use crate::game::craft::CraftId;

/// Connection identifier, assigned by the connection manager
pub type ConnectionId = u64;

/// Per-connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no craft registered yet
    Unregistered,
    /// Bound to exactly one craft id
    Registered,
    /// Transport closed
    Closed,
}

/// Result of binding a craft id to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// First registration on this connection
    Bound,
    /// Session was already bound to this same id
    AlreadyBound,
    /// Session is bound to a different craft; the new id was not bound
    Conflict { bound: CraftId },
    /// Session is closed
    Closed,
}

/// Server-side view of one live connection.
///
/// The craft id is bound lazily by the first `craftRegistration` received,
/// not at connect time. A session is registered exactly when it holds an id.
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub remote_addr: SocketAddr,
    craft_id: Option<CraftId>,
    closed: bool,
}

impl Session {
    pub fn new(connection_id: ConnectionId, remote_addr: SocketAddr) -> Self {
        Self {
            connection_id,
            remote_addr,
            craft_id: None,
            closed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.craft_id.is_some() {
            SessionState::Registered
        } else {
            SessionState::Unregistered
        }
    }

    pub fn craft_id(&self) -> Option<&str> {
        self.craft_id.as_deref()
    }

    /// Bind this session to a craft id (Unregistered -> Registered)
    pub fn bind(&mut self, craft_id: &str) -> BindOutcome {
        if self.closed {
            return BindOutcome::Closed;
        }
        match &self.craft_id {
            Some(bound) if bound == craft_id => BindOutcome::AlreadyBound,
            Some(bound) => BindOutcome::Conflict { bound: bound.clone() },
            None => {
                self.craft_id = Some(craft_id.to_string());
                BindOutcome::Bound
            }
        }
    }

    /// Close the session, returning the craft it owned if it had registered.
    ///
    /// Only the first close yields the craft.
    pub fn close(&mut self) -> Option<CraftId> {
        self.closed = true;
        self.craft_id.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn session() -> Session {
        Session::new(7, SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000))
    }

    #[test]
    fn test_starts_unregistered() {
        let s = session();
        assert_eq!(s.state(), SessionState::Unregistered);
        assert!(s.craft_id().is_none());
    }

    #[test]
    fn test_first_bind_registers() {
        let mut s = session();
        assert_eq!(s.bind("a1"), BindOutcome::Bound);
        assert_eq!(s.state(), SessionState::Registered);
        assert_eq!(s.craft_id(), Some("a1"));
    }

    #[test]
    fn test_rebind_same_id() {
        let mut s = session();
        s.bind("a1");
        assert_eq!(s.bind("a1"), BindOutcome::AlreadyBound);
        assert_eq!(s.craft_id(), Some("a1"));
    }

    #[test]
    fn test_bind_other_id_conflicts() {
        let mut s = session();
        s.bind("a1");
        assert_eq!(s.bind("b2"), BindOutcome::Conflict { bound: "a1".to_string() });
        assert_eq!(s.craft_id(), Some("a1"));
    }

    #[test]
    fn test_close_registered_returns_craft() {
        let mut s = session();
        s.bind("a1");
        assert_eq!(s.close(), Some("a1".to_string()));
        assert_eq!(s.state(), SessionState::Closed);
        assert_eq!(s.bind("a1"), BindOutcome::Closed);
    }

    #[test]
    fn test_close_unregistered_returns_none() {
        let mut s = session();
        assert_eq!(s.close(), None);
        assert_eq!(s.state(), SessionState::Closed);
    }

    #[test]
    fn test_close_yields_craft_once() {
        let mut s = session();
        s.bind("a1");
        assert_eq!(s.close(), Some("a1".to_string()));
        assert_eq!(s.close(), None);
        assert!(s.craft_id().is_none());
        assert_eq!(s.state(), SessionState::Closed);
    }
}
