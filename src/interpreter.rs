// Command interpreter: owns the plotter state and runs one command at a time
//
// Moves are rasterized into waypoints and each waypoint is handed to the step
// scheduler. `last_point` only advances once the scheduler has reached a
// waypoint, so it always matches the scheduler's absolute step position.

use std::io;

use tracing::{debug, info, warn};

use crate::command::{Command, Fields, ParseError, Pattern, parse_line};
use crate::jog::{JogKey, KeySource};
use crate::motor::{ActuatorDriver, Clock, MotionError, Motor, PenState, StepScheduler};
use crate::patterns;
use crate::raster::{ArcLimits, ArcSpec, Point, Rotation, arc_vertices, line, polyline};

pub const MENU: &str = "\
Commands:
  MENU                  show this list
  G00 X.. Y..           pen up, move to X,Y
  G01 X.. Y..           pen down, line to X,Y
  G02 X.. Y.. I.. J..   pen down, clockwise arc (centre offset I,J)
  G03 X.. Y.. I.. J..   pen down, counter-clockwise arc
  T1                    jog motors (a/s motor A, k/l motor B, e to finish at 0,0)
  T2 S..                set drawing scale (1 = 100%)
  T3 / T4               pen up / pen down
  T5 / T6 / T7          test patterns: square, circles, star";

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error("Scale command needs an S value")]
    MissingScale,

    #[error("Invalid scale {0}: must be a positive number")]
    InvalidScale(f64),

    #[error("Input error: {0}")]
    Input(#[from] io::Error),
}

impl CommandError {
    /// Errors after which the run loop cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CommandError::Motion(MotionError::Driver(_)) | CommandError::Input(_)
        )
    }
}

/// Last value given for each coordinate field
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldMemory {
    pub x: f64,
    pub y: f64,
    pub i: f64,
    pub j: f64,
}

/// Drawing state owned by the interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct PlotterState {
    pub last_point: Point,
    pub scale_factor: f64,
    pub fields: FieldMemory,
    pub pen: Option<PenState>,
}

impl Default for PlotterState {
    fn default() -> Self {
        Self {
            last_point: Point::default(),
            scale_factor: 1.0,
            fields: FieldMemory::default(),
            pen: None,
        }
    }
}

/// What the caller has to do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    ShowMenu,
    /// Jog mode requested; call `Interpreter::jog` with a key source
    EnterJog,
}

/// Result of a jog session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JogSummary {
    pub steps_a: i64,
    pub steps_b: i64,
}

pub struct Interpreter<D, C> {
    scheduler: StepScheduler<D, C>,
    state: PlotterState,
    limits: ArcLimits,
}

impl<D: ActuatorDriver, C: Clock> Interpreter<D, C> {
    pub fn new(scheduler: StepScheduler<D, C>) -> Self {
        let geometry = scheduler.kinematics().geometry();
        let limits = ArcLimits {
            max_chord_length: geometry.max_chord_length,
            offset_limit: geometry.arc_offset_limit,
        };
        Self {
            scheduler,
            state: PlotterState::default(),
            limits,
        }
    }

    pub fn state(&self) -> &PlotterState {
        &self.state
    }

    pub fn scheduler(&self) -> &StepScheduler<D, C> {
        &self.scheduler
    }

    /// Parse and run one protocol line
    pub fn interpret(&mut self, line: &str) -> Result<Outcome, CommandError> {
        let command = parse_line(line)?;
        self.execute(command)
    }

    pub fn execute(&mut self, command: Command) -> Result<Outcome, CommandError> {
        match command {
            Command::RapidMove(fields) => {
                let to = self.line_target(fields, "G00");
                self.check_reachable(to)?;
                self.pen(PenState::Up, false)?;
                let waypoints = line(self.state.last_point, to);
                self.travel(waypoints)?;
            }
            Command::LinearMove(fields) => {
                let to = self.line_target(fields, "G01");
                self.check_reachable(to)?;
                self.pen(PenState::Down, false)?;
                let waypoints = line(self.state.last_point, to);
                self.travel(waypoints)?;
            }
            Command::ArcCw(fields) => self.arc(fields, Rotation::Clockwise)?,
            Command::ArcCcw(fields) => self.arc(fields, Rotation::CounterClockwise)?,
            Command::SetScale(None) => return Err(CommandError::MissingScale),
            Command::SetScale(Some(scale)) => {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(CommandError::InvalidScale(scale));
                }
                info!("Drawing scale {} -> {}", self.state.scale_factor, scale);
                self.state.scale_factor = scale;
            }
            Command::PenUp => self.pen(PenState::Up, true)?,
            Command::PenDown => self.pen(PenState::Down, true)?,
            Command::TestPattern(pattern) => self.run_pattern(pattern)?,
            Command::ShowMenu => return Ok(Outcome::ShowMenu),
            Command::Jog => return Ok(Outcome::EnterJog),
        }
        Ok(Outcome::Done)
    }

    /// Interactive single-step calibration.
    ///
    /// Ends on the exit key or when input closes; the pose the arm is left in
    /// becomes the new zero pose (pen at 0,0).
    pub fn jog<K: KeySource + ?Sized>(&mut self, keys: &mut K) -> Result<JogSummary, CommandError> {
        info!("Jog mode: a/s motor A, k/l motor B, e to finish");
        self.pen(PenState::Up, false)?;

        let mut summary = JogSummary::default();
        while let Some(key) = keys.next_key()? {
            match JogKey::from_char(key) {
                JogKey::Step(motor, direction) => {
                    self.scheduler.nudge(motor, direction)?;
                    match motor {
                        Motor::A => summary.steps_a += direction.sign(),
                        Motor::B => summary.steps_b += direction.sign(),
                    }
                }
                JogKey::Exit => break,
                JogKey::Ignored => {}
            }
        }

        self.scheduler.reset_reference();
        self.state.last_point = Point::default();
        info!(
            "Jog finished ({} / {} steps), position reset to zero pose",
            summary.steps_a, summary.steps_b
        );
        Ok(summary)
    }

    fn run_pattern(&mut self, pattern: Pattern) -> Result<(), CommandError> {
        info!("Drawing test pattern {:?}", pattern);
        for text in patterns::lines(pattern) {
            self.interpret(text)?;
        }
        Ok(())
    }

    fn arc(&mut self, fields: Fields, rotation: Rotation) -> Result<(), CommandError> {
        let op = match rotation {
            Rotation::Clockwise => "G02",
            Rotation::CounterClockwise => "G03",
        };
        let to = self.line_target(fields, op);
        let i = self.recall(fields.i, 'I', op) * self.state.scale_factor;
        let j = self.recall(fields.j, 'J', op) * self.state.scale_factor;
        let spec = ArcSpec { to, i, j, rotation };
        let from = self.state.last_point;
        let vertices = arc_vertices(from, &spec, &self.limits);
        for &vertex in &vertices {
            self.check_reachable(vertex)?;
        }
        self.pen(PenState::Down, false)?;
        self.travel(polyline(from, vertices))
    }

    /// Reject a move end point the arm cannot reach, before anything moves.
    ///
    /// The reach envelope is a disc, so a chord between two reachable points
    /// stays reachable.
    fn check_reachable(&self, point: Point) -> Result<(), CommandError> {
        self.scheduler
            .kinematics()
            .solve(point.x as f64, point.y as f64)
            .map_err(MotionError::from)?;
        Ok(())
    }

    /// Scaled, rounded end point of a move
    fn line_target(&mut self, fields: Fields, op: &str) -> Point {
        let x = self.recall(fields.x, 'X', op);
        let y = self.recall(fields.y, 'Y', op);
        let scale = self.state.scale_factor;
        Point::rounded(x * scale, y * scale)
    }

    /// Field value, or the last value given for that field when it is missing
    fn recall(&mut self, value: Option<f64>, field: char, op: &str) -> f64 {
        let memory = &mut self.state.fields;
        let slot = match field {
            'X' => &mut memory.x,
            'Y' => &mut memory.y,
            'I' => &mut memory.i,
            _ => &mut memory.j,
        };
        match value {
            Some(v) => {
                *slot = v;
                v
            }
            None => {
                warn!("{} without {}, reusing previous value {}", op, field, *slot);
                *slot
            }
        }
    }

    fn travel<I: IntoIterator<Item = Point>>(&mut self, waypoints: I) -> Result<(), CommandError> {
        let start = self.state.last_point;
        let mut count = 0usize;
        for waypoint in waypoints {
            self.scheduler.advance_to(waypoint)?;
            self.state.last_point = waypoint;
            count += 1;
        }
        debug!(
            "Moved ({}, {}) -> ({}, {}) in {} waypoints",
            start.x, start.y, self.state.last_point.x, self.state.last_point.y, count
        );
        Ok(())
    }

    /// Set the pen; `force` re-actuates even when already in that state
    fn pen(&mut self, pen: PenState, force: bool) -> Result<(), CommandError> {
        if !force && self.state.pen == Some(pen) {
            return Ok(());
        }
        info!("Pen {:?}", pen);
        self.scheduler.set_pen(pen)?;
        self.state.pen = Some(pen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, PenConfig};
    use crate::jog::ScriptedKeys;
    use crate::motor::{Kinematics, ManualClock, SimulatedDriver, StepPosition};

    type TestInterpreter = Interpreter<SimulatedDriver, ManualClock>;

    fn interpreter() -> TestInterpreter {
        let kinematics = Kinematics::new(GeometryConfig::default()).unwrap();
        Interpreter::new(StepScheduler::new(
            kinematics,
            PenConfig::default(),
            SimulatedDriver::new(),
            ManualClock::default(),
        ))
    }

    /// Waypoints a move command would produce from the interpreter's current point
    fn path_of(interp: &TestInterpreter, to: Point) -> Vec<Point> {
        line(interp.state().last_point, to).collect()
    }

    fn assert_in_sync(interp: &TestInterpreter) {
        let p = interp.state().last_point;
        let expected = interp
            .scheduler()
            .kinematics()
            .solve(p.x as f64, p.y as f64)
            .unwrap();
        assert_eq!(interp.scheduler().position(), expected);
        let net = interp.scheduler().driver().net_steps();
        assert_eq!(StepPosition::new(net[0], net[1]), expected);
    }

    #[test]
    fn test_closed_loop_returns_to_start() {
        let mut interp = interpreter();
        interp.interpret("G00 X0 Y0").unwrap();
        let start = interp.scheduler().position();

        interp.interpret("G01 X50 Y50").unwrap();
        assert_eq!(interp.state().last_point, Point::new(50, 50));
        assert_ne!(interp.scheduler().position(), start);
        assert_in_sync(&interp);

        interp.interpret("G00 X0 Y0").unwrap();
        assert_eq!(interp.scheduler().position(), start);
        assert_eq!(interp.scheduler().driver().net_steps(), [0, 0]);
    }

    #[test]
    fn test_scale_halves_path() {
        let mut scaled = interpreter();
        scaled.interpret("T2 S0.5").unwrap();
        assert_eq!(scaled.state().scale_factor, 0.5);

        let mut plain = interpreter();
        let expected = path_of(&plain, Point::new(50, 50));
        assert_eq!(path_of(&scaled, Point::new(50, 50)), expected);

        scaled.interpret("G01 X100 Y100").unwrap();
        plain.interpret("G01 X50 Y50").unwrap();
        assert_eq!(scaled.state().last_point, Point::new(50, 50));
        assert_eq!(scaled.scheduler().position(), plain.scheduler().position());
        assert_eq!(
            scaled.scheduler().driver().pulses(),
            plain.scheduler().driver().pulses()
        );
    }

    #[test]
    fn test_bad_scale_keeps_previous() {
        let mut interp = interpreter();
        interp.interpret("T2 S2").unwrap();
        assert!(matches!(
            interp.interpret("T2"),
            Err(CommandError::MissingScale)
        ));
        assert!(matches!(
            interp.interpret("T2 S-1"),
            Err(CommandError::InvalidScale(_))
        ));
        assert_eq!(interp.state().scale_factor, 2.0);
    }

    #[test]
    fn test_missing_field_reuses_previous_value() {
        let mut interp = interpreter();
        interp.interpret("G01 X20 Y30").unwrap();
        interp.interpret("G01 X-10").unwrap();
        assert_eq!(interp.state().last_point, Point::new(-10, 30));
        interp.interpret("G01 Y5").unwrap();
        assert_eq!(interp.state().last_point, Point::new(-10, 5));
    }

    #[test]
    fn test_arc_reaches_target() {
        let mut interp = interpreter();
        interp.interpret("G00 X40 Y50").unwrap();
        interp.interpret("G02 X-40 Y50 I-40 J0").unwrap();
        assert_eq!(interp.state().last_point, Point::new(-40, 50));
        assert_in_sync(&interp);

        interp.interpret("G03 X40 Y50 I40 J0").unwrap();
        assert_eq!(interp.state().last_point, Point::new(40, 50));
        assert_in_sync(&interp);
    }

    #[test]
    fn test_malformed_arc_matches_line() {
        let mut arc_interp = interpreter();
        let mut line_interp = interpreter();
        arc_interp.interpret("G02 X30 Y20 I200 J0").unwrap();
        line_interp.interpret("G01 X30 Y20").unwrap();
        assert_eq!(arc_interp.state().last_point, Point::new(30, 20));
        assert_eq!(
            arc_interp.scheduler().driver().events(),
            line_interp.scheduler().driver().events()
        );
        assert_eq!(
            arc_interp.scheduler().position(),
            line_interp.scheduler().position()
        );
    }

    #[test]
    fn test_unreachable_move_is_rejected_before_moving() {
        let mut interp = interpreter();
        let err = interp.interpret("G01 X0 Y-200").unwrap_err();
        assert!(matches!(
            err,
            CommandError::Motion(MotionError::Geometry(_))
        ));
        assert!(!err.is_fatal());
        assert_eq!(interp.state().last_point, Point::new(0, 0));
        assert_eq!(interp.scheduler().driver().pulses(), [0, 0]);
        // Pen was not lowered for the rejected move either
        assert_eq!(interp.scheduler().driver().pen_duty(), None);
        assert_in_sync(&interp);
    }

    #[test]
    fn test_huge_coordinate_is_rejected_without_overflow() {
        let mut interp = interpreter();
        interp.interpret("G01 X-10 Y0").unwrap();
        let before = interp.scheduler().driver().pulses();

        let err = interp.interpret("G01 X99999999999 Y0").unwrap_err();
        assert!(matches!(
            err,
            CommandError::Motion(MotionError::Geometry(_))
        ));
        assert_eq!(interp.state().last_point, Point::new(-10, 0));
        assert_eq!(interp.scheduler().driver().pulses(), before);
    }

    #[test]
    fn test_arc_leaving_reach_is_rejected_before_moving() {
        let mut interp = interpreter();
        interp.interpret("G00 X0 Y-100").unwrap();
        let before = interp.scheduler().driver().pulses();

        // Clockwise half circle about (-90, -100) swings down to y = -190
        let err = interp.interpret("G02 X-180 Y-100 I-90 J0").unwrap_err();
        assert!(matches!(
            err,
            CommandError::Motion(MotionError::Geometry(_))
        ));
        assert_eq!(interp.state().last_point, Point::new(0, -100));
        assert_eq!(interp.scheduler().driver().pulses(), before);
    }

    #[test]
    fn test_pen_commands() {
        let mut interp = interpreter();
        interp.interpret("T4").unwrap();
        assert_eq!(interp.state().pen, Some(PenState::Down));
        assert_eq!(
            interp.scheduler().driver().pen_duty(),
            Some(PenConfig::default().down_duty)
        );
        interp.interpret("t3").unwrap();
        assert_eq!(interp.state().pen, Some(PenState::Up));
    }

    #[test]
    fn test_menu_and_jog_outcomes() {
        let mut interp = interpreter();
        assert_eq!(interp.interpret("MENU").unwrap(), Outcome::ShowMenu);
        assert_eq!(interp.interpret("T1").unwrap(), Outcome::EnterJog);
    }

    #[test]
    fn test_jog_resets_reference() {
        let mut interp = interpreter();
        interp.interpret("G00 X30 Y30").unwrap();

        let mut keys = ScriptedKeys::new("sssakx\ne G01 X5 Y5");
        let summary = interp.jog(&mut keys).unwrap();
        assert_eq!(summary, JogSummary { steps_a: 2, steps_b: -1 });
        assert_eq!(interp.state().last_point, Point::default());
        assert_eq!(interp.scheduler().position(), StepPosition::zero());
    }

    #[test]
    fn test_test_pattern_returns_home() {
        let mut interp = interpreter();
        interp.interpret("T6").unwrap();
        assert_eq!(interp.state().last_point, Point::new(0, 0));
        assert_eq!(interp.scheduler().position(), StepPosition::zero());
    }

    #[test]
    fn test_parse_errors_are_not_fatal() {
        let mut interp = interpreter();
        let err = interp.interpret("G99").unwrap_err();
        assert!(!err.is_fatal());
    }
}
