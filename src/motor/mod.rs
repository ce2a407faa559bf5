// Motor control module for the two-motor arm
//
// Provides:
// - Arm inverse kinematics (pen position -> absolute motor steps)
// - Actuator driver interface, simulated driver and serial step bridge
// - Dual-motor step scheduler

pub mod bridge;
mod driver;
pub mod kinematics;
pub mod scheduler;

pub use bridge::StepBridge;
pub use driver::{ActuatorDriver, Direction, DriverError, Motor, PenState, SimulatedDriver, StepMask};
pub use kinematics::{GeometryError, Kinematics, StepPosition};
pub use scheduler::{Clock, ManualClock, MonotonicClock, MotionError, MoveTiming, StepScheduler};
