//! Prometheus-compatible metrics endpoint
//!
//! Exposes relay counters in Prometheus text format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Samples kept for reconcile fan-out percentiles
const HISTORY_LEN: usize = 300;

/// Metrics registry for the relay
#[derive(Debug)]
pub struct Metrics {
    // Registry
    pub crafts_registered: AtomicU64,
    pub duplicate_registrations: AtomicU64,
    pub conflicting_registrations: AtomicU64,
    pub unknown_updates: AtomicU64,

    // Network stats
    pub connections_active: AtomicU64,
    pub connections_total: AtomicU64,
    pub messages_received: AtomicU64,
    pub messages_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub malformed_dropped: AtomicU64,
    pub server_only_dropped: AtomicU64,

    // Reconciliation broadcast timing (microseconds)
    pub reconcile_broadcasts: AtomicU64,
    pub reconcile_time_us: AtomicU64,
    pub reconcile_time_p95_us: AtomicU64,
    pub reconcile_time_max_us: AtomicU64,

    start_time: Instant,
    reconcile_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            crafts_registered: AtomicU64::new(0),
            duplicate_registrations: AtomicU64::new(0),
            conflicting_registrations: AtomicU64::new(0),
            unknown_updates: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            malformed_dropped: AtomicU64::new(0),
            server_only_dropped: AtomicU64::new(0),
            reconcile_broadcasts: AtomicU64::new(0),
            reconcile_time_us: AtomicU64::new(0),
            reconcile_time_p95_us: AtomicU64::new(0),
            reconcile_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            reconcile_history: RwLock::new(VecDeque::with_capacity(HISTORY_LEN)),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    /// Record how long one reconcile broadcast took and update percentiles
    pub fn record_reconcile(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.reconcile_time_us.store(us, Ordering::Relaxed);
        self.reconcile_broadcasts.fetch_add(1, Ordering::Relaxed);

        let mut history = self.reconcile_history.write();
        history.push_back(us);
        while history.len() > HISTORY_LEN {
            history.pop_front();
        }

        let mut sorted: Vec<u64> = history.iter().copied().collect();
        sorted.sort_unstable();
        let p95_idx = (sorted.len() as f32 * 0.95) as usize;
        self.reconcile_time_p95_us
            .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
        self.reconcile_time_max_us
            .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("craft_relay_crafts_registered", "Crafts in the canonical registry", "gauge",
            self.crafts_registered.load(Ordering::Relaxed));
        metric!("craft_relay_duplicate_registrations_total", "Registrations dropped as duplicates", "counter",
            self.duplicate_registrations.load(Ordering::Relaxed));
        metric!("craft_relay_conflicting_registrations_total", "Registrations for a second craft on one session", "counter",
            self.conflicting_registrations.load(Ordering::Relaxed));
        metric!("craft_relay_unknown_updates_total", "Updates for unregistered craft ids", "counter",
            self.unknown_updates.load(Ordering::Relaxed));

        metric!("craft_relay_connections_active", "Active WebSocket connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("craft_relay_connections_total", "Connections accepted since start", "counter",
            self.connections_total.load(Ordering::Relaxed));
        metric!("craft_relay_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("craft_relay_messages_sent_total", "Total messages queued for sending", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("craft_relay_bytes_received_total", "Total bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("craft_relay_bytes_sent_total", "Total bytes queued for sending", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("craft_relay_malformed_dropped_total", "Unparseable messages dropped", "counter",
            self.malformed_dropped.load(Ordering::Relaxed));
        metric!("craft_relay_server_only_dropped_total", "Relay-only message types received from clients", "counter",
            self.server_only_dropped.load(Ordering::Relaxed));

        metric!("craft_relay_reconcile_broadcasts_total", "Full snapshot broadcasts", "counter",
            self.reconcile_broadcasts.load(Ordering::Relaxed));
        metric!("craft_relay_reconcile_time_microseconds", "Last snapshot broadcast time", "gauge",
            self.reconcile_time_us.load(Ordering::Relaxed));
        metric!("craft_relay_reconcile_time_p95_microseconds", "95th percentile snapshot broadcast time", "gauge",
            self.reconcile_time_p95_us.load(Ordering::Relaxed));
        metric!("craft_relay_reconcile_time_max_microseconds", "Maximum snapshot broadcast time", "gauge",
            self.reconcile_time_max_us.load(Ordering::Relaxed));

        metric!("craft_relay_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON format metrics (alternative for direct API access)
    pub fn to_json(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        serde_json::json!({
            "registry": {
                "crafts": load(&self.crafts_registered),
                "duplicate_registrations": load(&self.duplicate_registrations),
                "conflicting_registrations": load(&self.conflicting_registrations),
                "unknown_updates": load(&self.unknown_updates),
            },
            "network": {
                "connections": load(&self.connections_active),
                "connections_total": load(&self.connections_total),
                "messages_received": load(&self.messages_received),
                "messages_sent": load(&self.messages_sent),
                "bytes_received": load(&self.bytes_received),
                "bytes_sent": load(&self.bytes_sent),
                "malformed_dropped": load(&self.malformed_dropped),
                "server_only_dropped": load(&self.server_only_dropped),
            },
            "reconcile": {
                "broadcasts": load(&self.reconcile_broadcasts),
                "time_us": load(&self.reconcile_time_us),
                "time_p95_us": load(&self.reconcile_time_p95_us),
                "time_max_us": load(&self.reconcile_time_max_us),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

/// Build the HTTP response for one request
fn respond(metrics: &Metrics, request: &str) -> String {
    let ok = |content_type: &str, body: &str| {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            content_type,
            body.len(),
            body
        )
    };

    // Most specific path first
    if request.starts_with("GET /metrics/json") {
        ok("application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ok("text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") {
        ok("text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}
