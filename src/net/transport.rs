//! WebSocket relay server
//!
//! Accepts plain `ws://` connections and feeds every text frame into the
//! shared [`RelaySession`]. Each connection gets a writer task draining an
//! unbounded queue, so the session never waits on a slow socket.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::net::relay_session::{start_reconcile_loop, RelaySession};

/// Relay server bound to its listen socket
pub struct RelayServer {
    config: ServerConfig,
    listener: TcpListener,
    session: Arc<RwLock<RelaySession>>,
}

impl RelayServer {
    /// Bind the listen socket. Failure here is fatal for the process.
    pub async fn bind(config: ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        let session = Arc::new(RwLock::new(RelaySession::new(metrics)));

        Ok(Self {
            config,
            listener,
            session,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the relay state
    pub fn session(&self) -> Arc<RwLock<RelaySession>> {
        self.session.clone()
    }

    /// Run the reconcile loop and accept connections until the task is dropped
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Relay listening on ws://{}", self.local_addr()?);

        let reconcile = start_reconcile_loop(self.session.clone(), self.config.reconcile_interval());

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let result: anyhow::Result<()> = loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => break Err(e.into()),
            };

            let session = self.session.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, remote_addr, session, ws_config).await {
                    warn!("Connection error from {}: {}", remote_addr, e);
                }
            });
        };

        reconcile.abort();
        result
    }
}

/// Drive one WebSocket connection from handshake to close
async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    session: Arc<RwLock<RelaySession>>,
    ws_config: WebSocketConfig,
) -> anyhow::Result<()> {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set nodelay for {}: {}", remote_addr, e);
    }

    let socket = tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await?;
    let (mut sink, mut inbound) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = sink.send(WsMessage::Text(text)).await {
                debug!("Error sending to {}: {}", remote_addr, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Welcome and snapshot replay are queued before any broadcast can reach us
    let conn_id = session.write().await.connect(remote_addr, outbound_tx);

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                session.write().await.handle_text(conn_id, &text);
            }
            Ok(WsMessage::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => session.write().await.handle_text(conn_id, text),
                Err(_) => debug!("Dropping non-UTF-8 binary frame from {}", conn_id),
            },
            Ok(WsMessage::Close(_)) => break,
            // Ping/pong is answered by tungstenite
            Ok(_) => {}
            Err(e) => {
                debug!("Read error on connection {}: {}", conn_id, e);
                break;
            }
        }
    }

    // Removing the connection drops its sender, which ends the writer task
    session.write().await.disconnect(conn_id);
    let _ = writer.await;

    Ok(())
}
