use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

use crate::game::constants::{burn, spawn};

/// Craft identifiers are chosen by the owning client
pub type CraftId = String;

/// One client-controlled orbiting craft and its serializable state.
///
/// Field names on the wire follow the browser client: the semi-major axis
/// travels as `orbitRadius`, the true anomaly as `angle`. Fields added after
/// the first clients shipped (`e`, `omega`, `angle`, fuel) default to zero
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Craft {
    pub id: CraftId,
    #[serde(default)]
    pub name: String,
    /// 24-bit RGB tag
    #[serde(default, deserialize_with = "deserialize_color")]
    pub color: u32,
    /// Semi-major axis (a)
    #[serde(rename = "orbitRadius", alias = "a", alias = "semiMajorAxis")]
    pub semi_major_axis: f64,
    /// Eccentricity (e)
    #[serde(rename = "e", default)]
    pub eccentricity: f64,
    /// Argument of periapsis (omega)
    #[serde(rename = "omega", default)]
    pub argument_of_periapsis: f64,
    /// True anomaly, advanced locally every tick
    #[serde(rename = "angle", default)]
    pub true_anomaly: f64,
    /// True-anomaly advance per tick
    pub orbit_speed: f64,
    #[serde(default)]
    pub thruster_fuel: f64,
    #[serde(default)]
    pub main_fuel: f64,
}

impl Craft {
    /// Create a craft with full tanks at true anomaly zero
    pub fn new(id: impl Into<CraftId>, name: impl Into<String>, semi_major_axis: f64, orbit_speed: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: 0xFF_FFFF,
            semi_major_axis,
            eccentricity: 0.0,
            argument_of_periapsis: 0.0,
            true_anomaly: 0.0,
            orbit_speed,
            thruster_fuel: burn::FUEL_CAPACITY,
            main_fuel: burn::FUEL_CAPACITY,
        }
    }

    pub fn with_eccentricity(mut self, eccentricity: f64) -> Self {
        self.eccentricity = eccentricity;
        self
    }

    /// Generate a fresh craft for a newly started client
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        Self {
            id: generate_id(rng),
            name: generate_name(rng),
            color: rng.gen_range(0..=spawn::MAX_COLOR),
            semi_major_axis: spawn::MIN_ORBIT_RADIUS + rng.gen::<f64>() * spawn::ORBIT_RADIUS_SPREAD,
            eccentricity: rng.gen::<f64>() * spawn::MAX_ECCENTRICITY,
            argument_of_periapsis: rng.gen::<f64>() * std::f64::consts::TAU,
            true_anomaly: rng.gen::<f64>() * std::f64::consts::TAU,
            orbit_speed: spawn::MIN_ORBIT_SPEED + rng.gen::<f64>() * spawn::ORBIT_SPEED_SPREAD,
            thruster_fuel: burn::FUEL_CAPACITY,
            main_fuel: burn::FUEL_CAPACITY,
        }
    }

    pub fn has_thruster_fuel(&self) -> bool {
        self.thruster_fuel > 0.0
    }

    pub fn has_main_fuel(&self) -> bool {
        self.main_fuel > 0.0
    }
}

/// `client_` followed by lowercase base-36 characters
pub fn generate_id<R: Rng>(rng: &mut R) -> CraftId {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let suffix: String = (0..spawn::ID_SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}", spawn::ID_PREFIX, suffix)
}

/// Display name such as `SwiftEagle42`
pub fn generate_name<R: Rng>(rng: &mut R) -> String {
    let adjective = spawn::NAME_ADJECTIVES[rng.gen_range(0..spawn::NAME_ADJECTIVES.len())];
    let noun = spawn::NAME_NOUNS[rng.gen_range(0..spawn::NAME_NOUNS.len())];
    let number = rng.gen_range(0..spawn::NAME_NUMBER_MAX);
    format!("{}{}{}", adjective, noun, number)
}

/// Browser clients send colors as arbitrary (often fractional) numbers
fn deserialize_color<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.clamp(0.0, spawn::MAX_COLOR as f64) as u32)
}
