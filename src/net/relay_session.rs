//! Relay session manager - owns the canonical craft registry and fans out
//! every accepted mutation to all live connections.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::constants::net::WELCOME_MESSAGE;
use crate::game::craft::{Craft, CraftId};
use crate::game::registry::{ChangeOutcome, CraftRegistry, RegisterOutcome};
use crate::metrics::Metrics;
use crate::net::connection::ConnectionManager;
use crate::net::protocol::{decode, encode, Message};
use crate::net::session::{BindOutcome, ConnectionId};

/// Canonical registry plus the set of live connections.
///
/// Every method runs to completion under the caller's exclusive access, so
/// registry mutations never interleave with each other or with a snapshot.
/// Sends only queue frames; socket writes happen in per-connection tasks.
///
/// There is no authentication or ownership check. Any connection may
/// register, update or shadow any craft id it names, and the relay applies
/// and rebroadcasts it as sent. Closing that gap is out of scope here.
pub struct RelaySession {
    registry: CraftRegistry,
    connections: ConnectionManager,
    metrics: Arc<Metrics>,
}

impl RelaySession {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            registry: CraftRegistry::new(),
            connections: ConnectionManager::new(),
            metrics,
        }
    }

    /// Accept a new connection: queue `welcome`, then one `craftRegistration`
    /// per known craft.
    ///
    /// Both happen before the connection can see any broadcast, so a late
    /// joiner always learns every craft before the next `craftUpdateAll`.
    pub fn connect(&mut self, remote_addr: SocketAddr, outbound: UnboundedSender<String>) -> ConnectionId {
        let conn_id = self.connections.create(remote_addr, outbound);
        Metrics::incr(&self.metrics.connections_total);
        self.metrics
            .connections_active
            .store(self.connections.count() as u64, Ordering::Relaxed);

        info!(
            "Connection {} from {} ({} connected)",
            conn_id,
            remote_addr,
            self.connections.count()
        );

        self.send_to(conn_id, &Message::welcome(WELCOME_MESSAGE));
        for craft in self.registry.snapshot() {
            self.send_to(conn_id, &Message::registration(craft));
        }

        conn_id
    }

    /// Apply one inbound text frame from a connection
    pub fn handle_text(&mut self, conn_id: ConnectionId, text: &str) {
        Metrics::incr(&self.metrics.messages_received);
        Metrics::add(&self.metrics.bytes_received, text.len() as u64);

        if self.connections.get(conn_id).is_none() {
            debug!("Message for unknown connection {}, dropping", conn_id);
            return;
        }

        let message = match decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed message from {}: {}", conn_id, e);
                Metrics::incr(&self.metrics.malformed_dropped);
                return;
            }
        };

        if message.is_server_only() {
            debug!("Ignoring server-only {} from connection {}", message.kind(), conn_id);
            Metrics::incr(&self.metrics.server_only_dropped);
            return;
        }

        match message {
            Message::CraftRegistration { craft_data } => self.handle_registration(conn_id, craft_data, text),
            Message::CraftUpdate { craft_data } => self.handle_update(craft_data, text),
            Message::Welcome { .. } | Message::CraftUpdateAll { .. } | Message::CraftRemoval { .. } => {}
        }
    }

    /// Bind the sender to the craft id it claims, store the craft and echo it.
    ///
    /// The claimed id is taken at face value; only a second, different id on
    /// the same connection is refused.
    fn handle_registration(&mut self, conn_id: ConnectionId, craft: Craft, raw: &str) {
        let Some(conn) = self.connections.get_mut(conn_id) else {
            return;
        };

        match conn.session.bind(&craft.id) {
            BindOutcome::Bound => {
                info!("Connection {} registered craft {} ({})", conn_id, craft.id, craft.name);
            }
            BindOutcome::AlreadyBound => {}
            BindOutcome::Conflict { bound } => {
                warn!(
                    "Connection {} already owns craft {}, dropping registration for {}",
                    conn_id, bound, craft.id
                );
                Metrics::incr(&self.metrics.conflicting_registrations);
                return;
            }
            BindOutcome::Closed => return,
        }

        if self.registry.register(craft) == RegisterOutcome::Duplicate {
            Metrics::incr(&self.metrics.duplicate_registrations);
        }
        self.sync_registry_gauge();

        // Echo to everyone, sender included
        self.broadcast_text(raw);
    }

    /// Replace the stored craft and echo the frame.
    ///
    /// The sender is trusted: an update for a craft bound to another
    /// connection is applied like any other.
    fn handle_update(&mut self, craft: Craft, raw: &str) {
        if self.registry.update(craft) == ChangeOutcome::UnknownId {
            Metrics::incr(&self.metrics.unknown_updates);
        }
        self.broadcast_text(raw);
    }

    /// Drop a connection; if it owned a craft, remove it and tell everyone left
    pub fn disconnect(&mut self, conn_id: ConnectionId) {
        let Some(mut conn) = self.connections.remove(conn_id) else {
            return;
        };
        self.metrics
            .connections_active
            .store(self.connections.count() as u64, Ordering::Relaxed);

        let Some(craft_id) = conn.session.close() else {
            info!("Connection {} closed before registering", conn_id);
            return;
        };

        if self.connections.is_bound(&craft_id) {
            info!(
                "Connection {} closed; craft {} still owned by another connection",
                conn_id, craft_id
            );
            return;
        }

        info!(
            "Connection {} ({}) closed, removing craft {}",
            conn_id, conn.session.remote_addr, craft_id
        );
        self.registry.remove(&craft_id);
        self.sync_registry_gauge();
        self.broadcast(&Message::removal(craft_id));
    }

    /// Broadcast the full snapshot to every connection
    pub fn reconcile(&self) {
        let start = std::time::Instant::now();
        let message = Message::update_all(self.registry.snapshot());
        let sent = self.broadcast(&message);
        self.metrics.record_reconcile(start.elapsed());
        debug!("Reconcile: {} crafts to {} connections", self.registry.len(), sent);
    }

    /// Encode once and queue on every connection
    pub fn broadcast(&self, message: &Message) -> usize {
        match encode(message) {
            Ok(text) => self.broadcast_text(&text),
            Err(e) => {
                warn!("Failed to encode {} for broadcast: {}", message.kind(), e);
                0
            }
        }
    }

    fn broadcast_text(&self, text: &str) -> usize {
        let sent = self.connections.broadcast(text);
        Metrics::add(&self.metrics.messages_sent, sent as u64);
        Metrics::add(&self.metrics.bytes_sent, (sent * text.len()) as u64);
        sent
    }

    fn send_to(&self, conn_id: ConnectionId, message: &Message) {
        let text = match encode(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {} for {}: {}", message.kind(), conn_id, e);
                return;
            }
        };
        let len = text.len() as u64;
        if let Some(conn) = self.connections.get(conn_id) {
            if conn.send(text) {
                Metrics::incr(&self.metrics.messages_sent);
                Metrics::add(&self.metrics.bytes_sent, len);
            }
        }
    }

    fn sync_registry_gauge(&self) {
        self.metrics
            .crafts_registered
            .store(self.registry.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Vec<Craft> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &CraftRegistry {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.connections.count()
    }

    /// Craft bound to a connection, if it has registered
    pub fn craft_of(&self, conn_id: ConnectionId) -> Option<CraftId> {
        self.connections
            .get(conn_id)
            .and_then(|conn| conn.session.craft_id().map(str::to_string))
    }
}

/// Start the periodic reconciliation broadcast.
///
/// The first broadcast happens one period after start.
pub fn start_reconcile_loop(session: Arc<RwLock<RelaySession>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Reconcile loop started, period {:?}", period);

        loop {
            ticker.tick().await;
            session.read().await.reconcile();
        }
    })
}
