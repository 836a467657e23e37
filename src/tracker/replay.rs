//! Recorded detections
//!
//! A recording is a JSON Lines file with one [`DetectionFrame`] per processed
//! frame. Replaying it drives the whole pipeline without a camera or model.

use super::{DetectionFrame, LandmarkProvider};
use crate::error::{Error, Result};
use crate::landmarks::HandDetection;
use image::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Plays back a recording, one line per `detect` call
pub struct ReplayProvider {
    frames: Vec<Vec<HandDetection>>,
    position: usize,
    looping: bool,
}

impl ReplayProvider {
    /// Load a recording. Blank lines are ignored.
    pub fn open(path: &Path, looping: bool) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let frames = parse_recording(&contents)
            .map_err(|e| Error::Landmarks(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            "Loaded {} recorded frames from {}{}",
            frames.len(),
            path.display(),
            if looping { " (looping)" } else { "" }
        );

        Ok(Self {
            frames,
            position: 0,
            looping,
        })
    }

    pub fn from_frames(frames: Vec<Vec<HandDetection>>, looping: bool) -> Self {
        Self {
            frames,
            position: 0,
            looping,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkProvider for ReplayProvider {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<HandDetection>> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        if self.position >= self.frames.len() {
            if !self.looping {
                return Ok(Vec::new());
            }
            self.position = 0;
        }
        let detections = self.frames[self.position].clone();
        self.position += 1;
        Ok(detections)
    }

    fn is_exhausted(&self) -> bool {
        !self.looping && self.position >= self.frames.len()
    }
}

fn parse_recording(contents: &str) -> std::result::Result<Vec<Vec<HandDetection>>, String> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str::<DetectionFrame>(line)
                .map(DetectionFrame::into_detections)
                .map_err(|e| format!("line {}: {}", number + 1, e))
        })
        .collect()
}

/// Appends every processed frame's detections to a JSON Lines file
pub struct DetectionRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
}

impl DetectionRecorder {
    /// Create (or truncate) the recording file.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        tracing::info!("Recording detections to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn record(&mut self, detections: &[HandDetection]) -> Result<()> {
        let line = serde_json::to_string(&DetectionFrame::from_detections(detections))?;
        writeln!(self.writer, "{}", line)?;
        self.frames += 1;
        Ok(())
    }

    /// Flush buffered lines to disk.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        tracing::info!("Recorded {} frames to {}", self.frames, self.path.display());
        Ok(self.frames)
    }
}
