//! OS key injection via enigo
//!
//! Keys are sent as press/release pairs so the game sees them held across
//! frames, rather than as typed text.

use super::KeySink;
use crate::controls::KeyCode;
use crate::error::{Error, Result};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};

/// Sends key events to whatever window has focus
pub struct EnigoSink {
    enigo: Enigo,
}

impl EnigoSink {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| Error::Input(format!("Failed to initialise enigo: {}", e)))?;
        tracing::info!("Key injection ready ({})", std::env::consts::OS);
        Ok(Self { enigo })
    }

    fn send(&mut self, key: KeyCode, direction: Direction) -> Result<()> {
        self.enigo
            .key(to_enigo_key(key), direction)
            .map_err(|e| Error::Input(format!("{:?} '{}' failed: {}", direction, key, e)))
    }
}

impl KeySink for EnigoSink {
    fn press(&mut self, key: KeyCode) -> Result<()> {
        self.send(key, Direction::Press)
    }

    fn release(&mut self, key: KeyCode) -> Result<()> {
        self.send(key, Direction::Release)
    }
}

fn to_enigo_key(key: KeyCode) -> Key {
    match key {
        KeyCode::Char(c) => Key::Unicode(c),
        KeyCode::Space => Key::Space,
        KeyCode::Enter => Key::Return,
        KeyCode::Tab => Key::Tab,
        KeyCode::Escape => Key::Escape,
        KeyCode::Shift => Key::Shift,
        KeyCode::Control => Key::Control,
        KeyCode::Alt => Key::Alt,
        KeyCode::Up => Key::UpArrow,
        KeyCode::Down => Key::DownArrow,
        KeyCode::Left => Key::LeftArrow,
        KeyCode::Right => Key::RightArrow,
    }
}
