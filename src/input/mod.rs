//! Synthesized keyboard input
//!
//! [`InputController`] tracks which keys are held and, given the target set
//! for the current frame, presses what is missing and releases what is no
//! longer wanted. The OS-specific work sits behind the [`KeySink`] trait so
//! the diffing logic is the same for every backend.

mod os;

pub use os::EnigoSink;

use crate::controls::{KeyCode, KeySet};
use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Something that can hold keys down and let them go
pub trait KeySink {
    fn press(&mut self, key: KeyCode) -> Result<()>;
    fn release(&mut self, key: KeyCode) -> Result<()>;
}

/// Which [`KeySink`] to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputBackend {
    /// Inject real key events into the focused window
    #[default]
    Os,
    /// Only log what would be pressed
    DryRun,
}

/// Open the sink for a backend.
pub fn open_sink(backend: InputBackend) -> Result<Box<dyn KeySink>> {
    match backend {
        InputBackend::Os => Ok(Box::new(EnigoSink::new()?)),
        InputBackend::DryRun => Ok(Box::new(LogSink)),
    }
}

/// Keys pressed and released during one [`InputController::apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDelta {
    pub pressed: Vec<KeyCode>,
    pub released: Vec<KeyCode>,
}

impl KeyDelta {
    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty() && self.released.is_empty()
    }
}

/// Held-key bookkeeping on top of a [`KeySink`]
pub struct InputController {
    sink: Box<dyn KeySink>,
    held: KeySet,
}

impl InputController {
    pub fn new(sink: Box<dyn KeySink>) -> Self {
        Self {
            sink,
            held: KeySet::new(),
        }
    }

    /// Keys currently held down
    pub fn held(&self) -> &KeySet {
        &self.held
    }

    /// Converge the held set onto `target`.
    ///
    /// New keys are pressed before stale keys are released. The held set only
    /// changes after the sink accepts a call, so a failure leaves it accurate.
    pub fn apply(&mut self, target: &KeySet) -> Result<KeyDelta> {
        let mut delta = KeyDelta::default();

        let to_press: Vec<KeyCode> = target.difference(&self.held).copied().collect();
        for key in to_press {
            self.press(key)?;
            delta.pressed.push(key);
        }

        let to_release: Vec<KeyCode> = self.held.difference(target).copied().collect();
        for key in to_release {
            self.release(key)?;
            delta.released.push(key);
        }

        Ok(delta)
    }

    pub fn press(&mut self, key: KeyCode) -> Result<()> {
        if self.held.contains(&key) {
            return Ok(());
        }
        self.sink.press(key)?;
        self.held.insert(key);
        Ok(())
    }

    pub fn release(&mut self, key: KeyCode) -> Result<()> {
        if !self.held.contains(&key) {
            return Ok(());
        }
        self.sink.release(key)?;
        self.held.remove(&key);
        Ok(())
    }

    /// Release every held key, continuing past failures.
    pub fn release_all(&mut self) {
        let held: Vec<KeyCode> = self.held.iter().copied().collect();
        for key in held {
            if let Err(e) = self.release(key) {
                tracing::warn!("Failed to release key '{}': {}", key, e);
            }
        }
        if self.held.is_empty() {
            tracing::debug!("All keys released");
        }
    }
}

impl Drop for InputController {
    fn drop(&mut self) {
        self.release_all();
    }
}

// ---------------------------------------------------------------------------
// Non-OS sinks
// ---------------------------------------------------------------------------

/// Dry-run sink that only logs
#[derive(Debug, Default)]
pub struct LogSink;

impl KeySink for LogSink {
    fn press(&mut self, key: KeyCode) -> Result<()> {
        tracing::info!("[dry-run] press {}", key);
        Ok(())
    }

    fn release(&mut self, key: KeyCode) -> Result<()> {
        tracing::info!("[dry-run] release {}", key);
        Ok(())
    }
}

/// A press or release seen by a [`RecordingSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press(KeyCode),
    Release(KeyCode),
}

/// Sink that keeps every call in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<KeyEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<KeyEvent> {
        self.events.lock().clone()
    }
}

impl KeySink for RecordingSink {
    fn press(&mut self, key: KeyCode) -> Result<()> {
        self.events.lock().push(KeyEvent::Press(key));
        Ok(())
    }

    fn release(&mut self, key: KeyCode) -> Result<()> {
        self.events.lock().push(KeyEvent::Release(key));
        Ok(())
    }
}
