// Jog / calibration key input
//
// a/s step motor A back/forward, k/l step motor B back/forward, e or Esc ends.

use std::io::{self, BufRead};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::motor::{Direction, Motor};

pub const EXIT_KEY: char = 'e';
const ESC: char = '\u{1b}';

/// What a jog keystroke does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogKey {
    Step(Motor, Direction),
    Exit,
    Ignored,
}

impl JogKey {
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_lowercase() {
            'a' => JogKey::Step(Motor::A, Direction::Backward),
            's' => JogKey::Step(Motor::A, Direction::Forward),
            'k' => JogKey::Step(Motor::B, Direction::Backward),
            'l' => JogKey::Step(Motor::B, Direction::Forward),
            EXIT_KEY | ESC => JogKey::Exit,
            _ => JogKey::Ignored,
        }
    }
}

/// Source of single keystrokes; `None` means the input is closed
pub trait KeySource {
    fn next_key(&mut self) -> io::Result<Option<char>>;
}

/// Keystrokes taken byte by byte from a line-oriented reader (files, pipes)
pub struct ReaderKeys<'a, R: BufRead> {
    reader: &'a mut R,
}

impl<'a, R: BufRead> ReaderKeys<'a, R> {
    pub fn new(reader: &'a mut R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> KeySource for ReaderKeys<'_, R> {
    fn next_key(&mut self) -> io::Result<Option<char>> {
        let byte = match self.reader.fill_buf()?.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        self.reader.consume(1);
        Ok(Some(byte as char))
    }
}

/// Keystrokes from an interactive terminal, read in raw mode
pub struct TerminalKeys {
    _raw: RawModeGuard,
}

impl TerminalKeys {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            _raw: RawModeGuard::enable()?,
        })
    }
}

impl KeySource for TerminalKeys {
    fn next_key(&mut self) -> io::Result<Option<char>> {
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                match key.code {
                    KeyCode::Char(c) => return Ok(Some(c)),
                    KeyCode::Esc => return Ok(Some(ESC)),
                    _ => {}
                }
            }
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Fixed key sequence, for tests and scripted calibration
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    keys: std::collections::VecDeque<char>,
}

impl ScriptedKeys {
    pub fn new(keys: &str) -> Self {
        Self {
            keys: keys.chars().collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn next_key(&mut self) -> io::Result<Option<char>> {
        Ok(self.keys.pop_front())
    }
}
