use serde::{Deserialize, Serialize};

use crate::game::constants::burn::{
    LATERAL_RATE, MAIN_ENGINE_FUEL_PER_TICK, MAIN_ENGINE_INCREMENT, TANGENTIAL_RATE,
    THRUSTER_FUEL_PER_UNIT,
};
use crate::game::craft::Craft;

/// Currently held controls for the locally owned craft.
///
/// Produced by whatever input layer drives the client; the burn model only
/// reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    /// Tangential burn raising orbitSpeed
    pub prograde: bool,
    /// Tangential burn lowering orbitSpeed
    pub retrograde: bool,
    /// Lateral burn rotating the orbit by -omega
    pub lateral_left: bool,
    /// Lateral burn rotating the orbit by +omega
    pub lateral_right: bool,
    /// Primary engine raising the semi-major axis
    pub main_engine: bool,
}

impl ControlState {
    pub fn any(&self) -> bool {
        self.prograde || self.retrograde || self.lateral_left || self.lateral_right || self.main_engine
    }
}

/// Apply one tick of burns to the owned craft.
///
/// Each control is gated independently on its own fuel pool and evaluated
/// against the state left by the previous one. Fuel never goes below zero
/// and is never replenished. Returns true if any burn fired.
pub fn apply_burns(craft: &mut Craft, controls: &ControlState, dt: f64) -> bool {
    let tangential = TANGENTIAL_RATE * dt;
    let lateral = LATERAL_RATE * dt;
    let mut fired = false;

    if controls.prograde && craft.has_thruster_fuel() {
        craft.orbit_speed += tangential;
        burn_thruster(craft, tangential);
        fired = true;
    }
    if controls.retrograde && craft.has_thruster_fuel() {
        craft.orbit_speed = (craft.orbit_speed - tangential).max(0.0);
        burn_thruster(craft, tangential);
        fired = true;
    }
    if controls.lateral_left && craft.has_thruster_fuel() {
        craft.argument_of_periapsis -= lateral;
        burn_thruster(craft, lateral);
        fired = true;
    }
    if controls.lateral_right && craft.has_thruster_fuel() {
        craft.argument_of_periapsis += lateral;
        burn_thruster(craft, lateral);
        fired = true;
    }

    if controls.main_engine && craft.has_main_fuel() {
        craft.semi_major_axis += MAIN_ENGINE_INCREMENT;
        craft.main_fuel = (craft.main_fuel - MAIN_ENGINE_FUEL_PER_TICK).max(0.0);
        fired = true;
    }

    fired
}

#[inline]
fn burn_thruster(craft: &mut Craft, magnitude: f64) {
    craft.thruster_fuel = (craft.thruster_fuel - magnitude * THRUSTER_FUEL_PER_UNIT).max(0.0);
}
