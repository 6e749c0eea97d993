//! End-to-end relay tests over real WebSocket connections on localhost.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use craft_relay_server::client::{CraftClient, SyncAgent};
use craft_relay_server::config::{ClientConfig, ServerConfig};
use craft_relay_server::game::craft::Craft;
use craft_relay_server::game::systems::burn::ControlState;
use craft_relay_server::metrics::Metrics;
use craft_relay_server::net::protocol::{decode, encode, Message};
use craft_relay_server::net::relay_session::RelaySession;
use craft_relay_server::net::transport::RelayServer;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    session: Arc<RwLock<RelaySession>>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(reconcile_interval_ms: u64) -> TestServer {
    let config = ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        reconcile_interval_ms,
        metrics_port: 0,
        ..Default::default()
    };
    let server = RelayServer::bind(config, Arc::new(Metrics::new())).await.unwrap();
    let addr = server.local_addr().unwrap();
    let session = server.session();
    let handle = tokio::spawn(server.run());

    TestServer { addr, session, handle }
}

async fn connect(addr: SocketAddr) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, message: &Message) {
    ws.send(WsMessage::Text(encode(message).unwrap())).await.unwrap();
}

/// Next decoded relay message
async fn recv(ws: &mut Ws) -> Message {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return decode(&text).unwrap();
        }
    }
}

/// Next message that is not a periodic snapshot
async fn recv_event(ws: &mut Ws) -> Message {
    loop {
        match recv(ws).await {
            Message::CraftUpdateAll { .. } => continue,
            other => return other,
        }
    }
}

/// Next periodic snapshot
async fn recv_snapshot(ws: &mut Ws) -> Vec<Craft> {
    loop {
        if let Message::CraftUpdateAll { craft_data } = recv(ws).await {
            return craft_data;
        }
    }
}

fn a1() -> Craft {
    Craft::new("a1", "SwiftEagle1", 30.0, 0.002).with_eccentricity(0.05)
}

/// Connect, consume the welcome and register `craft`, waiting for the echo
async fn join_with(addr: SocketAddr, craft: &Craft) -> Ws {
    let mut ws = connect(addr).await;
    assert!(matches!(recv(&mut ws).await, Message::Welcome { .. }));
    send(&mut ws, &Message::registration(craft.clone())).await;
    assert_eq!(recv_event(&mut ws).await, Message::registration(craft.clone()));
    ws
}

#[tokio::test]
async fn welcome_on_connect() {
    let server = start_server(1000).await;
    let mut ws = connect(server.addr).await;

    assert_eq!(recv(&mut ws).await, Message::welcome("Welcome client!"));
}

#[tokio::test]
async fn late_joiner_learns_crafts_before_snapshot() {
    let server = start_server(100).await;
    let _a = join_with(server.addr, &a1()).await;

    assert_eq!(server.session.read().await.snapshot(), vec![a1()]);

    let mut b = connect(server.addr).await;
    assert!(matches!(recv(&mut b).await, Message::Welcome { .. }));
    assert_eq!(recv(&mut b).await, Message::registration(a1()));
    assert_eq!(recv(&mut b).await, Message::update_all(vec![a1()]));
}

#[tokio::test]
async fn update_is_relayed_to_everyone() {
    let server = start_server(1000).await;
    let mut a = join_with(server.addr, &a1()).await;

    let mut b = connect(server.addr).await;
    recv(&mut b).await;
    assert_eq!(recv(&mut b).await, Message::registration(a1()));

    let mut moved = a1();
    moved.semi_major_axis = 31.0;
    send(&mut a, &Message::update(moved.clone())).await;

    assert_eq!(recv_event(&mut b).await, Message::update(moved.clone()));
    assert_eq!(recv_event(&mut a).await, Message::update(moved.clone()));
    assert_eq!(server.session.read().await.snapshot(), vec![moved]);
}

#[tokio::test]
async fn disconnect_removes_craft() {
    let server = start_server(100).await;
    let mut a = join_with(server.addr, &a1()).await;

    let mut b = connect(server.addr).await;
    recv(&mut b).await;
    recv(&mut b).await;

    assert_ok!(a.close(None).await);
    drop(a);

    assert_eq!(recv_event(&mut b).await, Message::removal("a1"));
    assert!(recv_snapshot(&mut b).await.is_empty());
}

#[tokio::test]
async fn malformed_message_keeps_connection() {
    let server = start_server(1000).await;
    let mut ws = connect(server.addr).await;
    recv(&mut ws).await;

    ws.send(WsMessage::Text("{not json".to_string())).await.unwrap();
    ws.send(WsMessage::Text(r#"{"type":"craftWarp"}"#.to_string())).await.unwrap();
    send(&mut ws, &Message::registration(a1())).await;

    assert_eq!(recv_event(&mut ws).await, Message::registration(a1()));
    assert_eq!(server.session.read().await.connection_count(), 1);
}

#[tokio::test]
async fn craft_client_mirrors_relay() {
    let server = start_server(100).await;
    let _a = join_with(server.addr, &a1()).await;

    let own = Craft::new("me", "HappyLion7", 36.0, 0.004);
    let mut agent = SyncAgent::new(own.clone());
    let mut client = assert_ok!(CraftClient::connect(&format!("ws://{}", server.addr)).await);
    assert_ok!(client.send(&agent.registration_message().unwrap()).await);

    // Welcome, replayed a1, our own echo, then a snapshot
    loop {
        let message = timeout(WAIT, client.recv()).await.unwrap().unwrap().unwrap();
        let is_snapshot = matches!(message, Message::CraftUpdateAll { .. });
        agent.handle(message);
        if is_snapshot {
            break;
        }
    }

    assert_eq!(agent.craft_count(), 2);
    assert_eq!(agent.mirror().get("a1"), Some(&a1()));
    assert_eq!(agent.own_craft(), Some(&own));
}

#[tokio::test]
async fn craft_client_run_publishes_updates() {
    let server = start_server(1000).await;
    let mut observer = connect(server.addr).await;
    recv(&mut observer).await;

    let own = Craft::new("pilot", "MightyDonkey9", 32.0, 0.003);
    let config = ClientConfig {
        server_url: format!("ws://{}", server.addr),
        update_interval_ms: 50,
        ..Default::default()
    };
    let (controls_tx, controls_rx) = watch::channel(ControlState::default());

    let client = CraftClient::connect(&config.server_url).await.unwrap();
    let run = tokio::spawn({
        let own = own.clone();
        async move {
            let mut agent = SyncAgent::new(own);
            client.run(&mut agent, controls_rx, &config).await
        }
    });

    assert_eq!(recv_event(&mut observer).await, Message::registration(own.clone()));

    controls_tx
        .send(ControlState {
            main_engine: true,
            ..Default::default()
        })
        .unwrap();

    // Updates keep flowing and eventually show the main engine burning fuel
    let mut burned = false;
    for _ in 0..100 {
        if let Message::CraftUpdate { craft_data } = recv_event(&mut observer).await {
            assert_eq!(craft_data.id, "pilot");
            if craft_data.main_fuel < own.main_fuel {
                assert!(craft_data.semi_major_axis > own.semi_major_axis);
                burned = true;
                break;
            }
        }
    }
    assert!(burned);

    run.abort();
}
