use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::agent::SyncAgent;
use crate::config::ClientConfig;
use crate::game::systems::burn::ControlState;
use crate::net::protocol::{decode, encode, EncodeError, Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client connector failures
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("connection writer closed")]
    WriterClosed,
}

/// WebSocket connection to a relay
pub struct CraftClient {
    socket: Socket,
}

impl CraftClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        info!("Connected to {}", url);
        Ok(Self { socket })
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        let text = encode(message)?;
        self.socket.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    /// Next relay message. `None` once the server has closed the connection.
    ///
    /// Frames that do not decode are logged and skipped.
    pub async fn recv(&mut self) -> Result<Option<Message>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            let frame = frame?;
            if frame.is_close() {
                break;
            }
            if let Some(message) = parse_frame(frame) {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }

    /// Fly `agent` against the relay until the server closes the connection.
    ///
    /// Outbound frames go through a writer task, so a slow socket never
    /// holds up ticks or inbound handling.
    pub async fn run(
        self,
        agent: &mut SyncAgent,
        controls: watch::Receiver<ControlState>,
        config: &ClientConfig,
    ) -> Result<(), ClientError> {
        let (sink, inbound) = self.socket.split();
        let (outbound, writer) = spawn_writer(sink);

        let result = drive(agent, inbound, &outbound, controls, config).await;

        // Dropping the last sender lets the writer flush and close
        drop(outbound);
        let _ = writer.await;
        result
    }
}

fn spawn_writer(mut sink: SplitSink<Socket, WsMessage>) -> (UnboundedSender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let handle = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(WsMessage::Text(text)).await {
                debug!("Error sending to relay: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    (tx, handle)
}

fn queue(outbound: &UnboundedSender<String>, message: &Message) -> Result<(), ClientError> {
    let text = encode(message)?;
    outbound.send(text).map_err(|_| ClientError::WriterClosed)
}

/// Sends the registration, then multiplexes the simulation tick, the
/// periodic `craftUpdate`, control changes and inbound frames on one task.
async fn drive<S>(
    agent: &mut SyncAgent,
    mut inbound: S,
    outbound: &UnboundedSender<String>,
    mut controls: watch::Receiver<ControlState>,
    config: &ClientConfig,
) -> Result<(), ClientError>
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    if let Some(registration) = agent.registration_message() {
        queue(outbound, &registration)?;
    }

    let tick_interval = config.tick_interval();
    let dt = tick_interval.as_secs_f64();

    let mut tick = interval(tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut update = interval(config.update_interval());
    update.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut controls_open = true;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                agent.tick(dt);
            }
            _ = update.tick() => {
                if let Some(message) = agent.update_message() {
                    queue(outbound, &message)?;
                }
            }
            changed = controls.changed(), if controls_open => {
                match changed {
                    Ok(()) => agent.set_controls(*controls.borrow_and_update()),
                    Err(_) => {
                        debug!("Control input closed, holding last controls");
                        controls_open = false;
                    }
                }
            }
            frame = inbound.next() => {
                match frame {
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                    Some(Ok(frame)) => {
                        if let Some(message) = parse_frame(frame) {
                            agent.handle(message);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }
}

/// Decode a text (or UTF-8 binary) frame; anything else yields `None`
fn parse_frame(frame: WsMessage) -> Option<Message> {
    let text = match frame {
        WsMessage::Text(text) => text,
        WsMessage::Binary(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                debug!("Dropping non-UTF-8 binary frame");
                return None;
            }
        },
        _ => return None,
    };

    match decode(&text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Dropping malformed message from server: {}", e);
            None
        }
    }
}
