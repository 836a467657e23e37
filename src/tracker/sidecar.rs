//! Landmark provider backed by an external process
//!
//! The hand landmark model runs in a child process (see
//! `sidecar/hand_landmarks.py`). Once the child prints `READY`, each frame is
//! written to its stdin as three little-endian `u32`s (width, height,
//! channels) followed by the raw RGB bytes, and the child answers with one
//! JSON line in the [`DetectionFrame`] format.

use super::{DetectionFrame, LandmarkProvider};
use crate::error::{Error, Result};
use crate::landmarks::HandDetection;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// Line the child prints once the model is loaded
const READY_SIGNAL: &str = "READY";

/// How to launch the landmark process and what to ask of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Program and leading arguments
    pub command: Vec<String>,
    /// Maximum number of hands to detect
    pub max_hands: u32,
    /// 0 = lite model (fastest), 1 = full
    pub model_complexity: u32,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "python3".to_string(),
                "sidecar/hand_landmarks.py".to_string(),
            ],
            max_hands: 2,
            model_complexity: 0,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl SidecarConfig {
    /// Full argument list passed to the program
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.command.iter().skip(1).cloned().collect();
        args.extend([
            "--max-hands".to_string(),
            self.max_hands.to_string(),
            "--model-complexity".to_string(),
            self.model_complexity.to_string(),
            "--min-detection-confidence".to_string(),
            self.min_detection_confidence.to_string(),
            "--min-tracking-confidence".to_string(),
            self.min_tracking_confidence.to_string(),
        ]);
        args
    }
}

/// Talks to the landmark child process over stdin/stdout
pub struct SidecarProvider {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl SidecarProvider {
    /// Start the child and wait for its ready signal.
    pub fn spawn(config: &SidecarConfig) -> Result<Self> {
        let program = config
            .command
            .first()
            .ok_or_else(|| Error::Config("sidecar command is empty".to_string()))?;

        tracing::info!("Starting landmark sidecar: {} {:?}", program, config.args());

        let mut child = Command::new(program)
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Provider(format!("Failed to start {}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Provider("sidecar stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Provider("sidecar stdout unavailable".to_string()))?;

        let mut provider = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        };

        let ready = provider.read_line()?;
        if ready.trim() != READY_SIGNAL {
            return Err(Error::Provider(format!(
                "sidecar did not signal ready, got: {:?}",
                ready.trim()
            )));
        }

        tracing::info!("Landmark sidecar ready");
        Ok(provider)
    }

    fn read_line(&mut self) -> Result<String> {
        self.line.clear();
        let read = self.stdout.read_line(&mut self.line)?;
        if read == 0 {
            let status = self.child.try_wait().ok().flatten();
            return Err(Error::Provider(format!(
                "sidecar closed its output (exit status: {:?})",
                status
            )));
        }
        Ok(std::mem::take(&mut self.line))
    }
}

impl LandmarkProvider for SidecarProvider {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandDetection>> {
        self.stdin.write_all(&frame_header(image))?;
        self.stdin.write_all(image.as_raw())?;
        self.stdin.flush()?;

        let response = self.read_line()?;
        let frame: DetectionFrame = serde_json::from_str(&response)?;

        if let Some(error) = frame.error {
            tracing::warn!("Landmark sidecar error: {}", error);
            return Ok(Vec::new());
        }
        Ok(frame.into_detections())
    }
}

impl Drop for SidecarProvider {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Width, height and channel count as little-endian `u32`s
pub(crate) fn frame_header(image: &RgbImage) -> [u8; 12] {
    let mut header = [0u8; 12];
    header[0..4].copy_from_slice(&image.width().to_le_bytes());
    header[4..8].copy_from_slice(&image.height().to_le_bytes());
    header[8..12].copy_from_slice(&3u32.to_le_bytes());
    header
}
