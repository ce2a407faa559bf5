// Dual-motor step scheduler
//
// Each motor is a soft timer with its own step interval. A single polling loop
// checks both timers against the clock and fires one combined pulse event for
// whichever motors are due, so both motors finish a waypoint together.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::driver::{ActuatorDriver, Direction, DriverError, Motor, PenState, StepMask};
use super::kinematics::{GeometryError, Kinematics, StepPosition};
use crate::config::PenConfig;
use crate::raster::Point;

/// Microsecond time source polled by the scheduler
pub trait Clock {
    /// Current time in microseconds
    fn now_us(&mut self) -> u64;

    /// Block for the given number of microseconds
    fn delay_us(&mut self, us: u64);
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&mut self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn delay_us(&mut self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }
}

/// Simulated clock: every read advances time by a fixed tick
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: u64,
    tick: u64,
}

impl ManualClock {
    pub fn new(tick_us: u64) -> Self {
        Self {
            now: 0,
            tick: tick_us.max(1),
        }
    }

    /// Current time without advancing
    pub fn peek(&self) -> u64 {
        self.now
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Clock for ManualClock {
    fn now_us(&mut self) -> u64 {
        let now = self.now;
        self.now += self.tick;
        now
    }

    fn delay_us(&mut self, us: u64) {
        self.now += us;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Actuator failure: {0}")]
    Driver(#[from] DriverError),
}

/// Timing of one paced move, in clock microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveTiming {
    pub steps_a: u64,
    pub steps_b: u64,
    pub delay_a: u64,
    pub delay_b: u64,
    pub started_at: u64,
    /// Time of the last pulse of each motor (equal to `started_at` when it had no steps)
    pub finished_a: u64,
    pub finished_b: u64,
}

impl MoveTiming {
    pub fn duration_a(&self) -> u64 {
        self.finished_a - self.started_at
    }

    pub fn duration_b(&self) -> u64 {
        self.finished_b - self.started_at
    }
}

/// Per-axis step intervals so both axes take the same time.
/// The busier axis runs at `min_delay`; the other is stretched.
pub fn pacing_delays(delta_a: u64, delta_b: u64, min_delay: u64) -> (u64, u64) {
    let longest = delta_a.max(delta_b);
    let shortest = delta_a.min(delta_b);
    let stretched = (longest * min_delay) / shortest.max(1);
    if delta_a >= delta_b {
        (min_delay, stretched)
    } else {
        (stretched, min_delay)
    }
}

/// Owns the absolute motor position and paces both motors to each waypoint
pub struct StepScheduler<D, C> {
    kinematics: Kinematics,
    driver: D,
    clock: C,
    position: StepPosition,
    pen: PenConfig,
}

impl<D: ActuatorDriver, C: Clock> StepScheduler<D, C> {
    /// Create a scheduler that starts at the zero pose
    pub fn new(kinematics: Kinematics, pen: PenConfig, driver: D, clock: C) -> Self {
        Self {
            kinematics,
            driver,
            clock,
            position: StepPosition::zero(),
            pen,
        }
    }

    /// Absolute step position of both motors
    pub fn position(&self) -> StepPosition {
        self.position
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Move both motors to the step counts for `waypoint`.
    ///
    /// Blocks until both motors have finished. On a geometry error nothing moves.
    /// A driver error partway through leaves `position` behind the real motors;
    /// driver errors end the run, so the stale position is never used again.
    pub fn advance_to(&mut self, waypoint: Point) -> Result<MoveTiming, MotionError> {
        let target = self
            .kinematics
            .solve(waypoint.x as f64, waypoint.y as f64)?;
        let timing = self.pace(target.a - self.position.a, target.b - self.position.b)?;
        self.position = target;
        trace!(
            "Waypoint ({}, {}) -> steps ({}, {})",
            waypoint.x, waypoint.y, target.a, target.b
        );
        Ok(timing)
    }

    /// Emit signed step counts on both motors, paced to finish together.
    ///
    /// Does not touch the absolute position. A driver error partway through
    /// leaves some steps already emitted, which is tolerated only because
    /// driver errors are fatal to the run loop.
    fn pace(&mut self, delta_a: i64, delta_b: i64) -> Result<MoveTiming, MotionError> {
        let steps_a = delta_a.unsigned_abs();
        let steps_b = delta_b.unsigned_abs();
        let min_delay = self.kinematics.geometry().min_step_delay_us;
        let (delay_a, delay_b) = pacing_delays(steps_a, steps_b, min_delay);

        if steps_a > 0 {
            self.driver
                .set_direction(Motor::A, Direction::from_delta(delta_a))?;
        }
        if steps_b > 0 {
            self.driver
                .set_direction(Motor::B, Direction::from_delta(delta_b))?;
        }

        let started_at = self.clock.now_us();
        let mut timing = MoveTiming {
            steps_a,
            steps_b,
            delay_a,
            delay_b,
            started_at,
            finished_a: started_at,
            finished_b: started_at,
        };

        let mut owed_a = steps_a;
        let mut owed_b = steps_b;
        let mut last_a = started_at;
        let mut last_b = started_at;

        while owed_a > 0 || owed_b > 0 {
            let now = self.clock.now_us();
            let mask = StepMask {
                a: owed_a > 0 && now.saturating_sub(last_a) >= delay_a,
                b: owed_b > 0 && now.saturating_sub(last_b) >= delay_b,
            };
            if mask.is_empty() {
                std::hint::spin_loop();
                continue;
            }

            self.driver.pulse_step(mask)?;
            if mask.a {
                owed_a -= 1;
                last_a = now;
                timing.finished_a = now;
            }
            if mask.b {
                owed_b -= 1;
                last_b = now;
                timing.finished_b = now;
            }
        }

        if steps_a > 0 || steps_b > 0 {
            debug!(
                "Paced {} / {} steps at {}us / {}us",
                steps_a, steps_b, delay_a, delay_b
            );
        }
        Ok(timing)
    }

    /// Single step of one motor, outside of any waypoint (jog mode)
    pub fn nudge(&mut self, motor: Motor, direction: Direction) -> Result<(), MotionError> {
        self.driver.set_direction(motor, direction)?;
        self.driver.pulse_step(StepMask::only(motor))?;
        Ok(())
    }

    /// Declare the current physical pose to be the zero pose
    pub fn reset_reference(&mut self) {
        self.position = StepPosition::zero();
    }

    /// Drive the pen servo and wait for it to settle
    pub fn set_pen(&mut self, pen: PenState) -> Result<(), MotionError> {
        let duty = match pen {
            PenState::Up => self.pen.up_duty,
            PenState::Down => self.pen.down_duty,
        };
        self.driver.set_pen_duty(duty)?;
        self.clock.delay_us(self.pen.settle_ms * 1000);
        Ok(())
    }
}
