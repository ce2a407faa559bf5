// End-to-end drawing through the public API with the simulated driver

use std::io::Cursor;

use arm_plotter::config::PlotterConfig;
use arm_plotter::interpreter::Interpreter;
use arm_plotter::motor::{Kinematics, ManualClock, SimulatedDriver, StepPosition, StepScheduler};
use arm_plotter::raster::Point;
use arm_plotter::runtime::serve;

fn interpreter(config: PlotterConfig) -> Interpreter<SimulatedDriver, ManualClock> {
    let kinematics = Kinematics::new(config.geometry).unwrap();
    Interpreter::new(StepScheduler::new(
        kinematics,
        config.pen,
        SimulatedDriver::new(),
        ManualClock::default(),
    ))
}

fn draw(interp: &mut Interpreter<SimulatedDriver, ManualClock>, script: &str) -> Vec<String> {
    let mut reader = Cursor::new(script.to_string());
    let mut out = Vec::new();
    serve(interp, &mut reader, &mut out, false).unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn closed_loop_returns_to_start_steps() {
    let mut interp = interpreter(PlotterConfig::default());
    let replies = draw(&mut interp, "G00 X0 Y0\nG01 X50 Y50\nG00 X0 Y0\n");
    assert_eq!(replies, vec!["ok", "ok", "ok"]);
    assert_eq!(interp.scheduler().position(), StepPosition::zero());
    assert_eq!(interp.scheduler().driver().net_steps(), [0, 0]);
    assert!(interp.scheduler().driver().events() > 0);
}

#[test]
fn every_test_pattern_draws_and_returns_home() {
    let mut interp = interpreter(PlotterConfig::default());
    let replies = draw(&mut interp, "T5\nT6\nT7\n");
    assert_eq!(replies, vec!["ok", "ok", "ok"]);
    assert_eq!(interp.state().last_point, Point::new(0, 0));
    assert_eq!(interp.scheduler().driver().net_steps(), [0, 0]);
}

#[test]
fn config_file_geometry_is_used() {
    let config =
        PlotterConfig::from_json(r#"{"geometry": {"shoulder_offset": 20.0, "link_length": 220.0}}"#)
            .unwrap();
    let mut interp = interpreter(config);
    draw(&mut interp, "G01 X60 Y40\n");

    let expected = Kinematics::new(config.geometry)
        .unwrap()
        .solve(60.0, 40.0)
        .unwrap();
    assert_eq!(interp.scheduler().position(), expected);
}

#[test]
fn out_of_reach_move_reports_and_continues() {
    let mut interp = interpreter(PlotterConfig::default());
    let replies = draw(&mut interp, "G01 X0 Y-300\nG00 X0 Y0\n");
    assert!(replies[0].starts_with("error: Point"));
    assert_eq!(replies[1], "ok");
    assert_eq!(interp.scheduler().position(), StepPosition::zero());
}
