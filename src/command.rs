// Command protocol: one line -> one typed command
//
// Op codes are matched case-insensitively on the first token (G00, g0, T2, MENU).
// Parameters are letter-labelled fields (X, Y, I, J, S) anywhere after the op code,
// with or without separating spaces: "G01 X10 Y-2.5" or "G01X10Y-2.5".

use crate::config::MAX_LINE_LEN;

/// Optional coordinate fields of a motion command
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fields {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub i: Option<f64>,
    pub j: Option<f64>,
}

/// Built-in test patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Square,
    Circles,
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// G00: pen up, straight move
    RapidMove(Fields),
    /// G01: pen down, straight move
    LinearMove(Fields),
    /// G02: pen down, clockwise arc
    ArcCw(Fields),
    /// G03: pen down, counter-clockwise arc
    ArcCcw(Fields),
    /// T1
    Jog,
    /// T2; `None` when the S field is missing
    SetScale(Option<f64>),
    /// T3
    PenUp,
    /// T4
    PenDown,
    /// T5, T6, T7
    TestPattern(Pattern),
    /// MENU
    ShowMenu,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command line")]
    Empty,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Field {field} has no value")]
    MissingValue { field: char },

    #[error("Field {field} has an invalid value: {text}")]
    InvalidNumber { field: char, text: String },

    #[error("Line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

/// Fields the protocol knows about; anything else is ignored
const FIELD_LETTERS: [char; 5] = ['X', 'Y', 'I', 'J', 'S'];

#[derive(Debug, Default)]
struct RawFields {
    x: Option<f64>,
    y: Option<f64>,
    i: Option<f64>,
    j: Option<f64>,
    s: Option<f64>,
}

impl RawFields {
    fn coords(&self) -> Fields {
        Fields {
            x: self.x,
            y: self.y,
            i: self.i,
            j: self.j,
        }
    }
}

/// Parse one protocol line
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::LineTooLong { max: MAX_LINE_LEN });
    }

    // Strip comments: "; ..." and "( ... )"
    let body = line
        .split(|c: char| c == ';' || c == '(')
        .next()
        .unwrap_or_default()
        .trim();

    let (opcode, rest) = split_opcode(body).ok_or(ParseError::Empty)?;
    let upper = opcode.to_ascii_uppercase();

    if upper == "MENU" {
        return Ok(Command::ShowMenu);
    }

    let mut chars = upper.chars();
    let letter = chars.next().ok_or(ParseError::Empty)?;
    let code: u32 = chars
        .as_str()
        .parse()
        .map_err(|_| ParseError::UnknownCommand(opcode.to_string()))?;
    let fields = parse_fields(rest)?;

    let command = match (letter, code) {
        ('G', 0) => Command::RapidMove(fields.coords()),
        ('G', 1) => Command::LinearMove(fields.coords()),
        ('G', 2) => Command::ArcCw(fields.coords()),
        ('G', 3) => Command::ArcCcw(fields.coords()),
        ('T', 1) => Command::Jog,
        ('T', 2) => Command::SetScale(fields.s),
        ('T', 3) => Command::PenUp,
        ('T', 4) => Command::PenDown,
        ('T', 5) => Command::TestPattern(Pattern::Square),
        ('T', 6) => Command::TestPattern(Pattern::Circles),
        ('T', 7) => Command::TestPattern(Pattern::Star),
        _ => return Err(ParseError::UnknownCommand(opcode.to_string())),
    };
    Ok(command)
}

/// Split "G01X10 Y5" into ("G01", "X10 Y5"): a letter run followed by a digit run
fn split_opcode(body: &str) -> Option<(&str, &str)> {
    if body.is_empty() {
        return None;
    }
    let letters = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    if letters == 0 {
        // No op code letter; return the first token so the error names it
        let end = body.find(char::is_whitespace).unwrap_or(body.len());
        return Some(body.split_at(end));
    }
    if body[..letters].eq_ignore_ascii_case("MENU") || letters > 1 {
        let end = body.find(char::is_whitespace).unwrap_or(body.len());
        return Some(body.split_at(end));
    }
    let digits = body[letters..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(body.len(), |n| letters + n);
    Some(body.split_at(digits))
}

fn parse_fields(rest: &str) -> Result<RawFields, ParseError> {
    let mut fields = RawFields::default();
    let mut chars = rest.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let letter = c.to_ascii_uppercase();
        if !c.is_ascii_alphabetic() {
            continue;
        }

        let start = idx + c.len_utf8();
        let end = numeric_end(rest, start);
        while chars.peek().is_some_and(|&(pos, _)| pos < end) {
            chars.next();
        }

        if !FIELD_LETTERS.contains(&letter) {
            continue;
        }
        let text = &rest[start..end];
        if text.is_empty() {
            return Err(ParseError::MissingValue { field: letter });
        }
        let value: f64 = text.parse().map_err(|_| ParseError::InvalidNumber {
            field: letter,
            text: text.to_string(),
        })?;
        if !value.is_finite() {
            return Err(ParseError::InvalidNumber {
                field: letter,
                text: text.to_string(),
            });
        }

        match letter {
            'X' => fields.x = Some(value),
            'Y' => fields.y = Some(value),
            'I' => fields.i = Some(value),
            'J' => fields.j = Some(value),
            _ => fields.s = Some(value),
        }
    }
    Ok(fields)
}

/// End of the number starting at `start`: digits, sign, point and an exponent
/// ("1e3", "2.5E-2"). Any other letter begins the next word.
fn numeric_end(text: &str, start: usize) -> usize {
    let bytes = text.as_bytes();
    let mut end = start;
    while end < bytes.len() {
        let b = bytes[end];
        if b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+') {
            end += 1;
        } else if matches!(b, b'e' | b'E') && is_exponent(bytes, start, end) {
            end += 2;
        } else {
            break;
        }
    }
    end
}

/// `bytes[at]` is 'e'/'E' after a mantissa digit and before a digit or signed digit
fn is_exponent(bytes: &[u8], start: usize, at: usize) -> bool {
    let after_mantissa = at > start && matches!(bytes[at - 1], b'0'..=b'9' | b'.');
    let next = bytes.get(at + 1).copied();
    let next_next = bytes.get(at + 2).copied();
    after_mantissa
        && match next {
            Some(b'0'..=b'9') => true,
            Some(b'-' | b'+') => matches!(next_next, Some(b'0'..=b'9')),
            _ => false,
        }
}
