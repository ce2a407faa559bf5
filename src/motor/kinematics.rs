// Inverse kinematics for the two-motor belt-linkage arm
// Converts a planar pen position (x, y) to absolute motor step counts.
//
// Both motors sit on one shoulder axis. The two equal link segments and the
// pen-to-shoulder line form an isosceles triangle; its half-angle plus a bearing
// correction gives each motor's angle.

use std::f64::consts::PI;

use crate::config::GeometryConfig;

/// Error for pen positions the arm cannot reach
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Point ({x}, {y}) is {distance:.2} from the shoulder, beyond reach {reach:.2}")]
    OutOfReach {
        x: f64,
        y: f64,
        distance: f64,
        reach: f64,
    },

    #[error("Point ({x}, {y}) has no defined arm angles")]
    Undefined { x: f64, y: f64 },
}

/// Absolute step counts for the two motors, measured from the zero pose
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepPosition {
    pub a: i64,
    pub b: i64,
}

impl StepPosition {
    pub fn new(a: i64, b: i64) -> Self {
        Self { a, b }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Motor angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmAngles {
    pub a: f64,
    pub b: f64,
}

/// Solver bound to one arm geometry
#[derive(Debug, Clone)]
pub struct Kinematics {
    geometry: GeometryConfig,
    steps_per_radian: f64,
    reference: (i64, i64), // raw steps at the zero pose
}

impl Kinematics {
    /// Build a solver. Fails when the zero pose itself is out of reach.
    pub fn new(geometry: GeometryConfig) -> Result<Self, GeometryError> {
        let steps_per_radian = geometry.steps_per_degree * (180.0 / PI);
        let zero = arm_angles(&geometry, 0.0, 0.0)?;
        let reference = (
            (zero.a * steps_per_radian).round() as i64,
            (zero.b * steps_per_radian).round() as i64,
        );
        Ok(Self {
            geometry,
            steps_per_radian,
            reference,
        })
    }

    pub fn geometry(&self) -> &GeometryConfig {
        &self.geometry
    }

    /// Motor angles (radians) for a pen position
    pub fn angles(&self, x: f64, y: f64) -> Result<ArmAngles, GeometryError> {
        arm_angles(&self.geometry, x, y)
    }

    /// Absolute step counts for a pen position; the zero pose maps to (0, 0)
    pub fn solve(&self, x: f64, y: f64) -> Result<StepPosition, GeometryError> {
        let angles = self.angles(x, y)?;
        Ok(StepPosition {
            a: (angles.a * self.steps_per_radian).round() as i64 - self.reference.0,
            b: (angles.b * self.steps_per_radian).round() as i64 - self.reference.1,
        })
    }
}

fn arm_angles(geometry: &GeometryConfig, x: f64, y: f64) -> Result<ArmAngles, GeometryError> {
    let offset = geometry.shoulder_offset;
    let dx = x - offset;
    let dy = geometry.shoulder_height - y;
    let distance = (dx * dx + dy * dy).sqrt();
    let reach = 2.0 * geometry.link_length;

    if !distance.is_finite() {
        return Err(GeometryError::Undefined { x, y });
    }
    if distance > reach {
        return Err(GeometryError::OutOfReach {
            x,
            y,
            distance,
            reach,
        });
    }

    let half = (distance / reach).acos();
    let bearing = (dx / dy).atan();

    // Elbow selection depends on which side of the shoulder the pen is on.
    // The two branches differ across the domain; keep both.
    let (a, b) = if x > offset {
        (PI + bearing + half, PI + bearing - half)
    } else {
        (PI - bearing + half, PI - bearing - half)
    };

    if !(a.is_finite() && b.is_finite()) {
        return Err(GeometryError::Undefined { x, y });
    }
    Ok(ArmAngles { a, b })
}
