// Built-in test patterns, as protocol lines run through the interpreter
//
// All patterns fit inside the default arm envelope at scale 1.

use crate::command::Pattern;

/// Square with both diagonals
const SQUARE: &[&str] = &[
    "G00 X-50 Y0",
    "G01 X50 Y0",
    "G01 X50 Y100",
    "G01 X-50 Y100",
    "G01 X-50 Y0",
    "G01 X50 Y100",
    "G00 X50 Y0",
    "G01 X-50 Y100",
    "G00 X0 Y0",
];

/// Two concentric circles about (0, 50), each drawn as two half arcs
const CIRCLES: &[&str] = &[
    "G00 X40 Y50",
    "G02 X-40 Y50 I-40 J0",
    "G02 X40 Y50 I40 J0",
    "G00 X20 Y50",
    "G03 X-20 Y50 I-20 J0",
    "G03 X20 Y50 I20 J0",
    "G00 X0 Y0",
];

/// Five-point star of radius 50 about (0, 50)
const STAR: &[&str] = &[
    "G00 X0 Y100",
    "G01 X-29.39 Y9.55",
    "G01 X47.55 Y65.45",
    "G01 X-47.55 Y65.45",
    "G01 X29.39 Y9.55",
    "G01 X0 Y100",
    "G00 X0 Y0",
];

pub fn lines(pattern: Pattern) -> &'static [&'static str] {
    match pattern {
        Pattern::Square => SQUARE,
        Pattern::Circles => CIRCLES,
        Pattern::Star => STAR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, parse_line};

    #[test]
    fn test_patterns_parse_and_return_home() {
        for pattern in [Pattern::Square, Pattern::Circles, Pattern::Star] {
            let lines = lines(pattern);
            for line in lines {
                parse_line(line).unwrap();
            }
            let last = parse_line(lines[lines.len() - 1]).unwrap();
            assert!(matches!(
                last,
                Command::RapidMove(f) if f.x == Some(0.0) && f.y == Some(0.0)
            ));
        }
    }
}
