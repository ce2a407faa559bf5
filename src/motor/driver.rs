// Actuator driver interface for the two steppers and the pen servo
//
// The motion kernel only talks to this trait. Hardware back-ends implement it
// (see `bridge`), and `SimulatedDriver` stands in for tests and dry runs.

use tracing::debug;

/// Motor selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    A,
    B,
}

/// Rotation direction; `Forward` increases the absolute step count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn from_delta(delta: i64) -> Self {
        if delta < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }

    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

/// Motors that receive a pulse in one combined step event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepMask {
    pub a: bool,
    pub b: bool,
}

impl StepMask {
    pub const A: StepMask = StepMask { a: true, b: false };
    pub const B: StepMask = StepMask { a: false, b: true };
    pub const BOTH: StepMask = StepMask { a: true, b: true };

    pub fn only(motor: Motor) -> Self {
        match motor {
            Motor::A => Self::A,
            Motor::B => Self::B,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.a && !self.b
    }

    /// Bit 0 = motor A, bit 1 = motor B
    pub fn bits(&self) -> u8 {
        (self.a as u8) | ((self.b as u8) << 1)
    }
}

/// Pen lift state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PenState {
    #[default]
    Up,
    Down,
}

/// Error types for actuator back-ends
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Low-level actuator signals
pub trait ActuatorDriver {
    /// Latch the direction line for one motor
    fn set_direction(&mut self, motor: Motor, direction: Direction) -> Result<(), DriverError>;

    /// Emit one step pulse on every motor in the mask, simultaneously
    fn pulse_step(&mut self, mask: StepMask) -> Result<(), DriverError>;

    /// Write the pen servo duty cycle
    fn set_pen_duty(&mut self, duty: u8) -> Result<(), DriverError>;
}

/// In-memory driver that tracks where the motors would be
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    directions: [Direction; 2],
    net_steps: [i64; 2],
    pulses: [u64; 2],
    events: u64,
    combined_events: u64,
    pen_duty: Option<u8>,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Net signed steps per motor since creation, [A, B]
    pub fn net_steps(&self) -> [i64; 2] {
        self.net_steps
    }

    /// Total pulses per motor regardless of direction, [A, B]
    pub fn pulses(&self) -> [u64; 2] {
        self.pulses
    }

    /// Number of pulse events
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Number of pulse events that stepped both motors at once
    pub fn combined_events(&self) -> u64 {
        self.combined_events
    }

    pub fn pen_duty(&self) -> Option<u8> {
        self.pen_duty
    }
}

impl ActuatorDriver for SimulatedDriver {
    fn set_direction(&mut self, motor: Motor, direction: Direction) -> Result<(), DriverError> {
        self.directions[motor as usize] = direction;
        Ok(())
    }

    fn pulse_step(&mut self, mask: StepMask) -> Result<(), DriverError> {
        for (idx, stepped) in [mask.a, mask.b].into_iter().enumerate() {
            if stepped {
                self.net_steps[idx] += self.directions[idx].sign();
                self.pulses[idx] += 1;
            }
        }
        self.events += 1;
        if mask == StepMask::BOTH {
            self.combined_events += 1;
        }
        Ok(())
    }

    fn set_pen_duty(&mut self, duty: u8) -> Result<(), DriverError> {
        debug!("Simulated pen duty {}", duty);
        self.pen_duty = Some(duty);
        Ok(())
    }
}
