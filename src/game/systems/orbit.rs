//! Keplerian orbit evaluation.
//!
//! Every craft moves on an ellipse with the central body at one focus,
//! confined to the y = 0 plane. Evaluation is pure so every client computes
//! the same position from the same elements.

use std::f64::consts::TAU;

use crate::game::constants::orbit::{HEADING_EPSILON, PATH_SEGMENTS};
use crate::game::craft::Craft;
use crate::util::vec3::Vec3;

/// Instantaneous position and facing of a craft
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CraftPose {
    pub position: Vec3,
    /// Unit vector along the direction of motion
    pub heading: Vec3,
}

/// Polar conic-section radius: r = a(1 - e^2) / (1 + e cos(theta))
#[inline]
pub fn radius(semi_major_axis: f64, eccentricity: f64, true_anomaly: f64) -> f64 {
    semi_major_axis * (1.0 - eccentricity * eccentricity) / (1.0 + eccentricity * true_anomaly.cos())
}

/// Position in the orbital plane, rotated by the argument of periapsis
pub fn position(semi_major_axis: f64, eccentricity: f64, argument_of_periapsis: f64, true_anomaly: f64) -> Vec3 {
    let r = radius(semi_major_axis, eccentricity, true_anomaly);
    Vec3::from_polar_xz(r, true_anomaly + argument_of_periapsis)
}

/// Direction of motion, estimated by a forward finite difference in true anomaly.
///
/// Good enough to orient a model; not a velocity.
pub fn heading(semi_major_axis: f64, eccentricity: f64, argument_of_periapsis: f64, true_anomaly: f64) -> Vec3 {
    let here = position(semi_major_axis, eccentricity, argument_of_periapsis, true_anomaly);
    let ahead = position(
        semi_major_axis,
        eccentricity,
        argument_of_periapsis,
        true_anomaly + HEADING_EPSILON,
    );
    (ahead - here).normalize()
}

/// Position and heading of a craft at its current true anomaly
pub fn pose(craft: &Craft) -> CraftPose {
    CraftPose {
        position: position(
            craft.semi_major_axis,
            craft.eccentricity,
            craft.argument_of_periapsis,
            craft.true_anomaly,
        ),
        heading: heading(
            craft.semi_major_axis,
            craft.eccentricity,
            craft.argument_of_periapsis,
            craft.true_anomaly,
        ),
    }
}

/// Sample the full ellipse as a closed loop of `segments + 1` points
pub fn orbit_path(semi_major_axis: f64, eccentricity: f64, argument_of_periapsis: f64, segments: usize) -> Vec<Vec3> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| {
            let theta = (i as f64 / segments as f64) * TAU;
            position(semi_major_axis, eccentricity, argument_of_periapsis, theta)
        })
        .collect()
}

/// Orbit path of a craft with the default resolution
pub fn craft_path(craft: &Craft) -> Vec<Vec3> {
    orbit_path(
        craft.semi_major_axis,
        craft.eccentricity,
        craft.argument_of_periapsis,
        PATH_SEGMENTS,
    )
}

/// Advance a craft by one simulation tick
#[inline]
pub fn advance(craft: &mut Craft) {
    craft.true_anomaly += craft.orbit_speed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_circular_radius_is_constant() {
        for i in 0..16 {
            let theta = i as f64 * PI / 8.0;
            assert!(approx_eq(radius(30.0, 0.0, theta), 30.0));
        }
    }

    #[test]
    fn test_periapsis_and_apoapsis() {
        let a = 30.0;
        let e = 0.05;
        // r(0) = a(1 - e), r(pi) = a(1 + e)
        assert!(approx_eq(radius(a, e, 0.0), a * (1.0 - e)));
        assert!(approx_eq(radius(a, e, PI), a * (1.0 + e)));
    }

    #[test]
    fn test_radius_is_deterministic() {
        let first = radius(33.3, 0.07, 1.234);
        for _ in 0..100 {
            assert_eq!(radius(33.3, 0.07, 1.234).to_bits(), first.to_bits());
        }
    }

    #[test]
    fn test_position_stays_in_plane() {
        let p = position(35.0, 0.08, 1.0, 2.0);
        assert_eq!(p.y, 0.0);
        assert!(approx_eq(p.length(), radius(35.0, 0.08, 2.0)));
    }

    #[test]
    fn test_periapsis_rotation() {
        // omega = pi/2 puts periapsis on the +z axis
        let p = position(30.0, 0.0, PI / 2.0, 0.0);
        assert!(approx_eq(p.x, 0.0));
        assert!(approx_eq(p.z, 30.0));
    }

    #[test]
    fn test_heading_is_tangent_on_circle() {
        let craft = Craft::new("c", "c", 30.0, 0.002);
        let pose = pose(&craft);

        assert!(approx_eq(pose.heading.length(), 1.0));
        // On a circle the tangent is nearly perpendicular to the radius
        assert!(pose.heading.dot(pose.position.normalize()).abs() < 1e-3);
        // Increasing true anomaly moves toward +z from the +x axis
        assert!(pose.heading.z > 0.99);
    }

    #[test]
    fn test_orbit_path_closes() {
        let path = orbit_path(30.0, 0.05, 0.3, 64);
        assert_eq!(path.len(), 65);

        let first = path[0];
        let last = path[64];
        assert!(first.distance_to(last) < 1e-9);
        assert!(path.iter().all(|p| p.y == 0.0));
    }

    #[test]
    fn test_orbit_path_zero_segments() {
        assert_eq!(orbit_path(30.0, 0.0, 0.0, 0).len(), 2);
    }

    #[test]
    fn test_advance() {
        let mut craft = Craft::new("c", "c", 30.0, 0.002);
        for _ in 0..10 {
            advance(&mut craft);
        }
        assert!(approx_eq(craft.true_anomaly, 0.02));
    }

    #[test]
    fn test_craft_path_default_resolution() {
        let craft = Craft::new("c", "c", 30.0, 0.002);
        assert_eq!(craft_path(&craft).len(), PATH_SEGMENTS + 1);
    }
}
