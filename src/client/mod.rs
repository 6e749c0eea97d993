pub mod agent;
pub mod connection;

pub use agent::SyncAgent;
pub use connection::{ClientError, CraftClient};
