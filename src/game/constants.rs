//! Simulation and protocol constants shared by server and client.

/// Orbital model constants
pub mod orbit {
    /// True-anomaly step used to estimate heading by finite difference
    pub const HEADING_EPSILON: f64 = 0.001;
    /// Default number of segments when sampling an orbit ellipse
    pub const PATH_SEGMENTS: usize = 64;
}

/// Control/burn constants
pub mod burn {
    /// orbitSpeed change per second of tangential (prograde/retrograde) burn
    pub const TANGENTIAL_RATE: f64 = 0.0005;
    /// omega change per second of lateral burn
    pub const LATERAL_RATE: f64 = 0.0005;
    /// Thruster fuel consumed per unit of element change
    pub const THRUSTER_FUEL_PER_UNIT: f64 = 1000.0;
    /// Semi-major axis gained per tick of main engine burn
    pub const MAIN_ENGINE_INCREMENT: f64 = 0.01;
    /// Main fuel consumed per tick of main engine burn
    pub const MAIN_ENGINE_FUEL_PER_TICK: f64 = 0.1;
    /// Full tank for both fuel pools
    pub const FUEL_CAPACITY: f64 = 100.0;
}

/// Randomized craft generation for new clients
pub mod spawn {
    /// Prefix of generated craft ids
    pub const ID_PREFIX: &str = "client_";
    /// Number of base-36 characters after the prefix
    pub const ID_SUFFIX_LEN: usize = 9;
    /// Generated semi-major axes fall in [MIN, MIN + SPREAD)
    pub const MIN_ORBIT_RADIUS: f64 = 30.0;
    pub const ORBIT_RADIUS_SPREAD: f64 = 10.0;
    pub const MIN_ORBIT_SPEED: f64 = 0.001;
    pub const ORBIT_SPEED_SPREAD: f64 = 0.005;
    /// Generated orbits are near-circular
    pub const MAX_ECCENTRICITY: f64 = 0.1;
    /// Largest 24-bit RGB color
    pub const MAX_COLOR: u32 = 0xFF_FFFF;
    pub const NAME_ADJECTIVES: [&str; 5] = ["Menacing", "Happy", "Swift", "Wise", "Mighty"];
    pub const NAME_NOUNS: [&str; 5] = ["Donkey", "Eagle", "Lion", "Shark", "Tiger"];
    /// Names end with a number in 0..NAME_NUMBER_MAX
    pub const NAME_NUMBER_MAX: u32 = 100;
}

/// Relay protocol constants
pub mod net {
    /// Default listen port
    pub const DEFAULT_PORT: u16 = 8080;
    /// Full snapshot broadcast period
    pub const RECONCILE_INTERVAL_MS: u64 = 1000;
    /// Largest accepted inbound text frame
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Text of the `welcome` message sent on connect
    pub const WELCOME_MESSAGE: &str = "Welcome client!";
}

/// Client sync agent defaults
pub mod client {
    /// Local simulation ticks per second
    pub const TICK_RATE: u32 = 60;
    /// How often the client transmits its own craft
    pub const UPDATE_INTERVAL_MS: u64 = 100;
    /// Default relay address
    pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_tank_lasts_whole_ticks() {
        let ticks = burn::FUEL_CAPACITY / burn::MAIN_ENGINE_FUEL_PER_TICK;
        assert!((ticks - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_eccentricity_bound_is_elliptical() {
        assert!(spawn::MAX_ECCENTRICITY < 1.0);
    }
}
