// Serial step bridge: a microcontroller that turns frames into step/dir/PWM signals
//
// Frame format: [0xA5, Opcode, Param, Checksum]
// Checksum is the inverted low byte of Opcode + Param.

use serialport::{self, SerialPort};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

use super::driver::{ActuatorDriver, Direction, DriverError, Motor, StepMask};

/// Serial read/write timeout for the bridge
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Frame start byte
const SYNC: u8 = 0xA5;

pub const FRAME_LEN: usize = 4;

/// Bridge opcodes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    Direction = 0x01, // param: bit0 = motor (0=A, 1=B), bit1 = 1 for backward
    Step = 0x02,      // param: bit0 = A, bit1 = B
    PenDuty = 0x03,   // param: PWM duty 0-255
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Step bridge connected over a serial port
pub struct StepBridge {
    port: Box<dyn SerialPort>,
}

impl StepBridge {
    /// Open a connection to the bridge at `baudrate`
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening step bridge on {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    fn checksum(opcode: u8, param: u8) -> u8 {
        !opcode.wrapping_add(param)
    }

    fn build_frame(opcode: Opcode, param: u8) -> [u8; FRAME_LEN] {
        let op = opcode as u8;
        [SYNC, op, param, Self::checksum(op, param)]
    }

    fn send_frame(&mut self, opcode: Opcode, param: u8) -> Result<()> {
        let frame = Self::build_frame(opcode, param);
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }
}

fn direction_param(motor: Motor, direction: Direction) -> u8 {
    let motor_bit = match motor {
        Motor::A => 0,
        Motor::B => 1,
    };
    let dir_bit = match direction {
        Direction::Forward => 0,
        Direction::Backward => 1 << 1,
    };
    motor_bit | dir_bit
}

impl ActuatorDriver for StepBridge {
    fn set_direction(&mut self, motor: Motor, direction: Direction) -> Result<()> {
        self.send_frame(Opcode::Direction, direction_param(motor, direction))
    }

    fn pulse_step(&mut self, mask: StepMask) -> Result<()> {
        if mask.is_empty() {
            return Ok(());
        }
        self.send_frame(Opcode::Step, mask.bits())
    }

    fn set_pen_duty(&mut self, duty: u8) -> Result<()> {
        debug!("Pen duty {}", duty);
        self.send_frame(Opcode::PenDuty, duty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        // !(0x02 + 0x03) = !0x05 = 0xFA
        assert_eq!(StepBridge::checksum(0x02, 0x03), 0xFA);
        // wraps instead of overflowing
        assert_eq!(StepBridge::checksum(0x03, 0xFF), !0x02);
    }

    #[test]
    fn test_build_step_frame() {
        let frame = StepBridge::build_frame(Opcode::Step, StepMask::BOTH.bits());
        assert_eq!(frame, [0xA5, 0x02, 0x03, 0xFA]);
    }

    #[test]
    fn test_direction_param() {
        assert_eq!(direction_param(Motor::A, Direction::Forward), 0b00);
        assert_eq!(direction_param(Motor::B, Direction::Forward), 0b01);
        assert_eq!(direction_param(Motor::A, Direction::Backward), 0b10);
        assert_eq!(direction_param(Motor::B, Direction::Backward), 0b11);
    }
}
