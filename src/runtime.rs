// Line-at-a-time command loop
//
// Reads one bounded line, runs it to completion, answers "ok" or "error: ...",
// then reads the next. Input is not read while a move is in progress.

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};

use crate::command::ParseError;
use crate::config::{MAX_LINE_LEN, PlotterConfig};
use crate::interpreter::{CommandError, Interpreter, MENU, Outcome};
use crate::jog::{ReaderKeys, TerminalKeys};
use crate::motor::{
    ActuatorDriver, Clock, Kinematics, ManualClock, MonotonicClock, SimulatedDriver, StepBridge,
    StepScheduler,
};

/// Drive a two-motor arm plotter from G-code style commands
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Command file to draw (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Serial port of the step bridge; without it motion is simulated
    #[arg(long)]
    pub bridge: Option<String>,

    /// Step bridge baud rate
    #[arg(long, default_value_t = crate::config::BRIDGE_BAUDRATE)]
    pub baud: u32,

    /// JSON file overriding the built-in geometry and pen settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// One input line, or why it was rejected
#[derive(Debug, PartialEq)]
pub enum LineRead {
    Line(String),
    TooLong,
    Eof,
}

/// Read a line of at most `max` bytes (excluding the newline).
///
/// An over-long line is consumed up to its newline and reported as `TooLong`.
pub fn read_bounded_line<R: BufRead>(reader: &mut R, max: usize) -> io::Result<LineRead> {
    // Room for the longest accepted line plus "\r\n"
    let limit = max as u64 + 2;
    let mut buf = Vec::new();
    let read = Read::take(&mut *reader, limit).read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if read as u64 == limit {
        // Drain the rest of the line
        let mut rest = Vec::new();
        reader.read_until(b'\n', &mut rest)?;
        return Ok(LineRead::TooLong);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if buf.len() > max {
        return Ok(LineRead::TooLong);
    }
    Ok(LineRead::Line(String::from_utf8_lossy(&buf).into_owned()))
}

/// Run commands from `reader` until it is exhausted or a fatal error occurs
pub fn serve<D, C, R, W>(
    interpreter: &mut Interpreter<D, C>,
    reader: &mut R,
    out: &mut W,
    interactive: bool,
) -> Result<(), CommandError>
where
    D: ActuatorDriver,
    C: Clock,
    R: BufRead,
    W: Write,
{
    loop {
        let line = match read_bounded_line(reader, MAX_LINE_LEN)? {
            LineRead::Eof => return Ok(()),
            LineRead::TooLong => {
                let err = ParseError::LineTooLong { max: MAX_LINE_LEN };
                warn!("Rejected line: {}", err);
                writeln!(out, "error: {}", err)?;
                continue;
            }
            LineRead::Line(line) => line,
        };
        if line.trim().is_empty() {
            continue;
        }

        let result = match interpreter.interpret(&line) {
            Ok(Outcome::Done) => Ok(()),
            Ok(Outcome::ShowMenu) => {
                writeln!(out, "{}", MENU)?;
                Ok(())
            }
            Ok(Outcome::EnterJog) => {
                writeln!(out, "jog: a/s motor A, k/l motor B, e to finish")?;
                out.flush()?;
                if interactive {
                    let mut keys = TerminalKeys::new()?;
                    interpreter.jog(&mut keys).map(|_| ())
                } else {
                    let mut keys = ReaderKeys::new(&mut *reader);
                    interpreter.jog(&mut keys).map(|_| ())
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => writeln!(out, "ok")?,
            Err(e) if e.is_fatal() => {
                error!("Fatal error on '{}': {}", line, e);
                return Err(e);
            }
            Err(e) => {
                warn!("Rejected '{}': {}", line, e);
                writeln!(out, "error: {}", e)?;
            }
        }
        out.flush()?;
    }
}

pub fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            PlotterConfig::load(path)?
        }
        None => PlotterConfig::default(),
    };
    let kinematics = Kinematics::new(config.geometry)?;

    match &args.bridge {
        Some(port) => {
            let bridge = StepBridge::open_with_baudrate(port, args.baud)?;
            let scheduler = StepScheduler::new(kinematics, config.pen, bridge, MonotonicClock::new());
            let mut interpreter = Interpreter::new(scheduler);
            drive(&mut interpreter, &args)
        }
        None => {
            info!("No step bridge given, simulating motion");
            let scheduler = StepScheduler::new(
                kinematics,
                config.pen,
                SimulatedDriver::new(),
                ManualClock::default(),
            );
            let mut interpreter = Interpreter::new(scheduler);
            drive(&mut interpreter, &args)?;
            let driver = interpreter.scheduler().driver();
            info!(
                "Simulation done: {} pulse events, net steps {:?}, final point {:?}",
                driver.events(),
                driver.net_steps(),
                interpreter.state().last_point
            );
            Ok(())
        }
    }
}

fn drive<D: ActuatorDriver, C: Clock>(
    interpreter: &mut Interpreter<D, C>,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &args.file {
        Some(path) => {
            info!("Drawing {}", path.display());
            let mut reader = BufReader::new(File::open(path)?);
            serve(interpreter, &mut reader, &mut out, false)?;
        }
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            if interactive {
                writeln!(out, "{}", MENU)?;
            }
            let mut reader = stdin.lock();
            serve(interpreter, &mut reader, &mut out, interactive)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, PenConfig};
    use crate::motor::StepPosition;
    use std::io::Cursor;

    fn interpreter() -> Interpreter<SimulatedDriver, ManualClock> {
        let kinematics = Kinematics::new(GeometryConfig::default()).unwrap();
        Interpreter::new(StepScheduler::new(
            kinematics,
            PenConfig::default(),
            SimulatedDriver::new(),
            ManualClock::default(),
        ))
    }

    fn run_script(script: &str) -> (Interpreter<SimulatedDriver, ManualClock>, String) {
        let mut interp = interpreter();
        let mut reader = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        serve(&mut interp, &mut reader, &mut out, false).unwrap();
        (interp, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_bounded_line() {
        let long = "X".repeat(10);
        let mut reader = Cursor::new(format!("G00 X1\r\n{}\nT3", long));
        assert_eq!(
            read_bounded_line(&mut reader, 8).unwrap(),
            LineRead::Line("G00 X1".into())
        );
        assert_eq!(read_bounded_line(&mut reader, 8).unwrap(), LineRead::TooLong);
        assert_eq!(
            read_bounded_line(&mut reader, 8).unwrap(),
            LineRead::Line("T3".into())
        );
        assert_eq!(read_bounded_line(&mut reader, 8).unwrap(), LineRead::Eof);
    }

    #[test]
    fn test_line_of_exactly_max_is_accepted() {
        let mut reader = Cursor::new("12345678\n");
        assert_eq!(
            read_bounded_line(&mut reader, 8).unwrap(),
            LineRead::Line("12345678".into())
        );
    }

    #[test]
    fn test_crlf_line_of_exactly_max_is_accepted() {
        let mut reader = Cursor::new("12345678\r\n123456789\r\nT4\n");
        assert_eq!(
            read_bounded_line(&mut reader, 8).unwrap(),
            LineRead::Line("12345678".into())
        );
        assert_eq!(read_bounded_line(&mut reader, 8).unwrap(), LineRead::TooLong);
        assert_eq!(
            read_bounded_line(&mut reader, 8).unwrap(),
            LineRead::Line("T4".into())
        );
    }

    #[test]
    fn test_errors_do_not_stop_the_loop() {
        let long = format!("G01 X1 Y1 ;{}\n", "x".repeat(MAX_LINE_LEN));
        let script = format!("G99\n{}T2\n\nG01 X10 Y10\n", long);
        let (interp, out) = run_script(&script);
        let replies: Vec<&str> = out.lines().collect();
        assert_eq!(replies.len(), 4);
        assert!(replies[0].starts_with("error: Unknown command"));
        assert!(replies[1].starts_with("error: Line exceeds"));
        assert!(replies[2].starts_with("error: Scale command"));
        assert_eq!(replies[3], "ok");
        assert_eq!(interp.state().last_point.x, 10);
    }

    #[test]
    fn test_jog_reads_keys_from_input() {
        let (interp, out) = run_script("G00 X20 Y20\nT1\nssle\nMENU\n");
        assert!(out.contains("jog:"));
        assert!(out.contains("Commands:"));
        assert_eq!(interp.scheduler().position(), StepPosition::zero());
        assert_eq!(interp.state().last_point.x, 0);
    }
}
