//! Headless craft client.
//!
//! Spawns a random craft, connects to the relay and flies it from stdin.
//! Each line names the held controls: `w` prograde, `s` retrograde, `a` and
//! `d` lateral, `m` main engine. An empty line releases everything.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use craft_relay_server::client::{CraftClient, SyncAgent};
use craft_relay_server::config::ClientConfig;
use craft_relay_server::game::craft::Craft;
use craft_relay_server::game::systems::burn::ControlState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = ClientConfig::load_or_default();
    config.validate()?;

    let craft = Craft::generate(&mut rand::thread_rng());
    info!("Flying {} ({}) at a = {:.2}", craft.name, craft.id, craft.semi_major_axis);

    let mut agent = SyncAgent::new(craft);
    let (controls_tx, controls_rx) = watch::channel(ControlState::default());

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_keys(&line) {
                    Some(controls) => {
                        if controls_tx.send(controls).is_err() {
                            break;
                        }
                    }
                    None => warn!("Unknown keys '{}', expected some of w s a d m", line.trim()),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    let client = CraftClient::connect(&config.server_url).await?;

    tokio::select! {
        result = client.run(&mut agent, controls_rx, &config) => {
            if let Err(e) = result {
                error!("Connection error: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    }

    info!(
        "Stopped {} with {} crafts mirrored, last controls {:?}",
        agent.own_id(),
        agent.craft_count(),
        agent.controls()
    );

    Ok(())
}

/// Held controls from one input line; `None` on an unknown key
fn parse_keys(line: &str) -> Option<ControlState> {
    let mut controls = ControlState::default();
    for key in line.chars().filter(|c| !c.is_whitespace()) {
        match key.to_ascii_lowercase() {
            'w' => controls.prograde = true,
            's' => controls.retrograde = true,
            'a' => controls.lateral_left = true,
            'd' => controls.lateral_right = true,
            'm' => controls.main_engine = true,
            _ => return None,
        }
    }
    Some(controls)
}
