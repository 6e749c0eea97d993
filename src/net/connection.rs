use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::net::session::{ConnectionId, Session};

/// Outbound half of a live connection.
///
/// Text frames pushed here are written to the socket by the connection's
/// writer task; pushing never blocks.
#[derive(Debug)]
pub struct Connection {
    pub session: Session,
    outbound: UnboundedSender<String>,
}

impl Connection {
    pub fn new(session: Session, outbound: UnboundedSender<String>) -> Self {
        Self { session, outbound }
    }

    /// Queue a text frame. Returns false if the writer has already gone away.
    pub fn send(&self, text: String) -> bool {
        match self.outbound.send(text) {
            Ok(()) => true,
            Err(_) => {
                debug!(
                    "Connection {}: writer closed, dropping frame",
                    self.session.connection_id
                );
                false
            }
        }
    }
}

/// Live connections indexed by id
pub struct ConnectionManager {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Add a connection under a fresh random id
    pub fn create(&mut self, remote_addr: SocketAddr, outbound: UnboundedSender<String>) -> ConnectionId {
        // Generate random connection ID (avoid collisions)
        let id = loop {
            let candidate = rand::random::<ConnectionId>();
            if !self.connections.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Session::new(id, remote_addr);
        self.connections.insert(id, Connection::new(session, outbound));
        id
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// True if any live session is bound to this craft
    pub fn is_bound(&self, craft_id: &str) -> bool {
        self.connections
            .values()
            .any(|conn| conn.session.craft_id() == Some(craft_id))
    }

    /// Queue the same frame on every connection. Returns how many accepted it.
    pub fn broadcast(&self, text: &str) -> usize {
        self.connections
            .values()
            .map(|conn| conn.send(text.to_string()))
            .filter(|sent| *sent)
            .count()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
