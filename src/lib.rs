//! Gesture Pilot - drive racing games with your hands
//!
//! Webcam frames are run through a hand landmark model, each hand is
//! classified into a gesture, and the pair of gestures is looked up in a
//! decision table whose actions are held down as keyboard keys.

pub mod capture;
pub mod cli;
pub mod config;
pub mod controls;
pub mod error;
pub mod gesture;
pub mod input;
pub mod landmarks;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod tracker;

pub use error::{Error, Result};
