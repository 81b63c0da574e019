use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{anyhow, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    Up,
    Down,
    Left,
    Right,
    Space,
    Escape,
    Enter,
    Shift,
    Ctrl,
}

impl Key {
    const LETTERS: [Key; 26] = [
        Key::A,
        Key::B,
        Key::C,
        Key::D,
        Key::E,
        Key::F,
        Key::G,
        Key::H,
        Key::I,
        Key::J,
        Key::K,
        Key::L,
        Key::M,
        Key::N,
        Key::O,
        Key::P,
        Key::Q,
        Key::R,
        Key::S,
        Key::T,
        Key::U,
        Key::V,
        Key::W,
        Key::X,
        Key::Y,
        Key::Z,
    ];
    const DIGITS: [Key; 10] = [
        Key::Num0,
        Key::Num1,
        Key::Num2,
        Key::Num3,
        Key::Num4,
        Key::Num5,
        Key::Num6,
        Key::Num7,
        Key::Num8,
        Key::Num9,
    ];
}

impl FromStr for Key {
    type Err = Error;

    /// Accepts single letters and digits (`"w"`, `"7"`) and the named keys, case-insensitively.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let lower = name.trim().to_ascii_lowercase();
        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_lowercase() {
                return Ok(Key::LETTERS[(c as u8 - b'a') as usize]);
            }
            if c.is_ascii_digit() {
                return Ok(Key::DIGITS[(c as u8 - b'0') as usize]);
            }
        }
        match lower.as_str() {
            "up" => Ok(Key::Up),
            "down" => Ok(Key::Down),
            "left" => Ok(Key::Left),
            "right" => Ok(Key::Right),
            "space" => Ok(Key::Space),
            "escape" | "esc" => Ok(Key::Escape),
            "enter" | "return" => Ok(Key::Enter),
            "shift" => Ok(Key::Shift),
            "ctrl" | "control" => Ok(Key::Ctrl),
            _ => Err(anyhow!("Unknown key name '{name}'")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum InputEvent {
    Key { key: Key, pressed: bool },
    FocusLost,
}

/// Keyboard state handed to scripts.
///
/// `key_pressed` reports a press once and then forgets it; `key_held` stays true until release.
#[derive(Debug, Clone, Default)]
pub struct Input {
    held: HashSet<Key>,
    pressed: HashSet<Key>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ev: InputEvent) {
        match ev {
            InputEvent::Key { key, pressed: true } => self.press(key),
            InputEvent::Key { key, pressed: false } => self.release(key),
            InputEvent::FocusLost => self.clear(),
        }
    }

    pub fn press(&mut self, key: Key) {
        // Key repeat arrives as extra presses while held.
        if self.held.insert(key) {
            self.pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: Key) {
        self.held.remove(&key);
        self.pressed.remove(&key);
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.pressed.clear();
    }

    pub fn key_pressed(&mut self, key: Key) -> bool {
        self.pressed.remove(&key)
    }

    /// Same as [`Input::key_pressed`] without consuming the press.
    pub fn peek_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    pub fn key_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Drops the presses that were consumed from `snapshot`, a copy taken from this state earlier.
    pub fn keep_unconsumed(&mut self, snapshot: &Input) {
        self.pressed.retain(|key| snapshot.pressed.contains(key));
    }
}
