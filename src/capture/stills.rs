//! Frame sources that do not need a camera
//!
//! `StillsSource` loops over the images in a directory and `BlankSource`
//! emits solid frames, which is enough when landmarks come from a replay.
//! Both are paced to a fixed frame rate like a real device.

use super::FrameSource;
use crate::error::{Error, Result};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Sleeps so that successive calls are `interval` apart
#[derive(Debug)]
struct Pacer {
    interval: Duration,
    next: Option<Instant>,
}

impl Pacer {
    fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            next: None,
        }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        if let Some(next) = self.next {
            if next > now {
                thread::sleep(next - now);
            }
        }
        // Never try to catch up on missed ticks
        let base = self.next.map_or(now, |n| n.max(now));
        self.next = Some(base + self.interval);
    }
}

/// Cycles through still images, sorted by file name
pub struct StillsSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    position: usize,
    pacer: Pacer,
}

impl StillsSource {
    pub fn open(dir: &Path, fps: u32) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::Camera(format!(
                "No png/jpg images found in {}",
                dir.display()
            )));
        }
        tracing::info!("Loaded {} still frames from {}", paths.len(), dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            paths,
            position: 0,
            pacer: Pacer::new(fps),
        })
    }
}

impl FrameSource for StillsSource {
    fn grab(&mut self) -> Result<RgbImage> {
        self.pacer.wait();
        let path = &self.paths[self.position];
        self.position = (self.position + 1) % self.paths.len();
        Ok(image::open(path)?.to_rgb8())
    }

    fn describe(&self) -> String {
        format!("stills in {} ({} frames)", self.dir.display(), self.paths.len())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Solid-colour frames of a fixed size
pub struct BlankSource {
    frame: RgbImage,
    pacer: Pacer,
}

impl BlankSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            frame: RgbImage::from_pixel(width.max(1), height.max(1), Rgb([24, 24, 32])),
            pacer: Pacer::new(fps),
        }
    }
}

impl FrameSource for BlankSource {
    fn grab(&mut self) -> Result<RgbImage> {
        self.pacer.wait();
        Ok(self.frame.clone())
    }

    fn describe(&self) -> String {
        format!("blank {}x{}", self.frame.width(), self.frame.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stills_cycle_in_name_order() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([10, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(2, 2, Rgb([20, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut source = StillsSource::open(dir.path(), 1000).unwrap();
        assert_eq!(source.grab().unwrap().get_pixel(0, 0)[0], 20);
        assert_eq!(source.grab().unwrap().get_pixel(0, 0)[0], 10);
        assert_eq!(source.grab().unwrap().get_pixel(0, 0)[0], 20);
    }

    #[test]
    fn test_stills_empty_dir_fails() {
        let dir = TempDir::new().unwrap();
        assert!(StillsSource::open(dir.path(), 30).is_err());
    }

    #[test]
    fn test_blank_source_is_paced() {
        let mut source = BlankSource::new(4, 3, 50);
        let start = Instant::now();
        for _ in 0..3 {
            let frame = source.grab().unwrap();
            assert_eq!(frame.dimensions(), (4, 3));
        }
        // First grab is immediate, the next two wait ~20ms each
        assert!(start.elapsed() >= Duration::from_millis(35));
    }
}
