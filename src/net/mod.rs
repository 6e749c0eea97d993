pub mod connection;
pub mod protocol;
pub mod relay_session;
pub mod session;
pub mod transport;
