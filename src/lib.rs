//! Craft Relay Server Library
//!
//! Real-time state relay for orbiting craft. Clients announce one craft each
//! over a WebSocket, the relay keeps the canonical registry and fans every
//! change back out, and a full snapshot goes to everyone once per second.
//!
//! # Modules
//!
//! - `game` - orbital model, craft registry and burn controls
//! - `net` - wire protocol, sessions and the relay server
//! - `client` - sync agent that mirrors the relay and flies one craft

pub mod client;
pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
