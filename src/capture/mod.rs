//! Background frame capture
//!
//! A [`FrameGrabber`] owns a [`FrameSource`] on a dedicated thread and keeps
//! publishing into a single-slot [`LatestFrame`]. Readers never block and
//! only ever see the newest frame; frames nobody read in time are dropped.

#[cfg(feature = "camera")]
mod camera;
mod stills;

#[cfg(feature = "camera")]
pub use camera::CameraSource;
pub use stills::{BlankSource, StillsSource};

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use image::RgbImage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Consecutive grab failures before the capture thread gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 300;

/// Pause after a failed grab
const FAILURE_BACKOFF: Duration = Duration::from_millis(10);

/// Anything that can produce RGB frames on demand.
///
/// `grab` may block until the next frame is ready; it runs on the capture
/// thread only.
pub trait FrameSource {
    fn grab(&mut self) -> Result<RgbImage>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// A captured frame with its position in the stream
#[derive(Debug)]
pub struct Frame {
    /// Increases by one for every published frame, starting at 1
    pub seq: u64,
    pub image: RgbImage,
}

/// Single-slot buffer where the newest frame replaces the previous one
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Arc<Frame>>>,
    last_seq: Mutex<u64>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing whatever was there. Returns its sequence number.
    pub fn publish(&self, image: RgbImage) -> u64 {
        let mut last_seq = self.last_seq.lock();
        *last_seq += 1;
        let frame = Arc::new(Frame {
            seq: *last_seq,
            image,
        });
        *self.slot.lock() = Some(frame);
        *last_seq
    }

    /// Newest frame, or `None` before the first publish. Never blocks on the
    /// producer beyond the slot swap.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.slot.lock().clone()
    }
}

/// Result of opening the source, reported once by the capture thread
type OpenStatus = std::result::Result<String, String>;

/// Runs a [`FrameSource`] on its own thread
pub struct FrameGrabber {
    frames: Arc<LatestFrame>,
    stop_signal: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    status_rx: Receiver<OpenStatus>,
    handle: Option<JoinHandle<()>>,
}

impl FrameGrabber {
    /// Start capturing. `open` runs on the capture thread, so sources that
    /// are not `Send` (camera handles usually are not) work too.
    pub fn spawn<F, S>(open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: FrameSource + 'static,
    {
        let frames = Arc::new(LatestFrame::new());
        let stop_signal = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));
        let (status_tx, status_rx) = bounded(1);

        let thread_frames = frames.clone();
        let thread_stop = stop_signal.clone();
        let thread_failed = failed.clone();

        let handle = thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || {
                let source = match open() {
                    Ok(source) => {
                        let _ = status_tx.send(Ok(source.describe()));
                        source
                    }
                    Err(e) => {
                        thread_failed.store(true, Ordering::SeqCst);
                        let _ = status_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                capture_loop(source, &thread_frames, &thread_stop, &thread_failed);
            })?;

        Ok(Self {
            frames,
            stop_signal,
            failed,
            status_rx,
            handle: Some(handle),
        })
    }

    /// Shared handle to the frame slot
    pub fn frames(&self) -> Arc<LatestFrame> {
        self.frames.clone()
    }

    /// Newest captured frame without blocking
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.frames.latest()
    }

    /// True once the source failed to open or stopped producing frames
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Block until the first frame arrives, or fail after `timeout`.
    pub fn wait_for_first_frame(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        match self.status_rx.recv_timeout(timeout) {
            Ok(Ok(description)) => tracing::info!("Capture source opened: {}", description),
            Ok(Err(e)) => return Err(Error::Camera(format!("Could not open camera source: {}", e))),
            Err(RecvTimeoutError::Timeout) => {
                return Err(Error::Camera(format!(
                    "Frame source did not open within {:?}",
                    timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::Camera("Capture thread exited during start-up".to_string()))
            }
        }

        while Instant::now() < deadline {
            if self.frames.latest().is_some() {
                return Ok(());
            }
            if self.has_failed() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(Error::Camera(format!(
            "No frame received within {:?}",
            timeout
        )))
    }

    /// Signal the capture thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn capture_loop<S: FrameSource>(
    mut source: S,
    frames: &LatestFrame,
    stop_signal: &AtomicBool,
    failed: &AtomicBool,
) {
    let mut failures = 0u32;

    while !stop_signal.load(Ordering::SeqCst) {
        match source.grab() {
            Ok(image) => {
                failures = 0;
                frames.publish(image);
            }
            Err(e) => {
                failures += 1;
                if failures == 1 || failures % 100 == 0 {
                    tracing::warn!("Frame grab failed ({} in a row): {}", failures, e);
                }
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    tracing::error!("Giving up on {} after {} failures", source.describe(), failures);
                    failed.store(true, Ordering::SeqCst);
                    break;
                }
                thread::sleep(FAILURE_BACKOFF);
            }
        }
    }

    tracing::debug!("Capture thread exiting");
}

/// Open the configured webcam.
#[cfg(not(feature = "camera"))]
pub fn open_camera(_index: u32, _width: u32, _height: u32, _fps: u32) -> Result<NoCamera> {
    Err(Error::FeatureDisabled {
        what: "Camera capture",
        feature: "camera",
    })
}

/// Open the configured webcam.
#[cfg(feature = "camera")]
pub fn open_camera(index: u32, width: u32, height: u32, fps: u32) -> Result<CameraSource> {
    CameraSource::open(index, width, height, fps)
}

/// Placeholder source type for builds without camera support
#[cfg(not(feature = "camera"))]
pub enum NoCamera {}

#[cfg(not(feature = "camera"))]
impl FrameSource for NoCamera {
    fn grab(&mut self) -> Result<RgbImage> {
        match *self {}
    }

    fn describe(&self) -> String {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Produces numbered 1x1 frames, then fails forever
    struct Counter {
        next: u8,
        limit: u8,
    }

    impl FrameSource for Counter {
        fn grab(&mut self) -> Result<RgbImage> {
            if self.next >= self.limit {
                return Err(Error::Camera("done".to_string()));
            }
            self.next += 1;
            thread::sleep(Duration::from_millis(1));
            Ok(RgbImage::from_pixel(1, 1, image::Rgb([self.next, 0, 0])))
        }

        fn describe(&self) -> String {
            "counter".to_string()
        }
    }

    #[test]
    fn test_latest_frame_replaces_previous() {
        let slot = LatestFrame::new();
        assert!(slot.latest().is_none());

        slot.publish(RgbImage::from_pixel(1, 1, image::Rgb([1, 0, 0])));
        let seq = slot.publish(RgbImage::from_pixel(1, 1, image::Rgb([2, 0, 0])));

        let frame = slot.latest().unwrap();
        assert_eq!(seq, 2);
        assert_eq!(frame.seq, 2);
        assert_eq!(frame.image.get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_latest_does_not_consume() {
        let slot = LatestFrame::new();
        slot.publish(RgbImage::new(2, 2));
        assert_eq!(slot.latest().unwrap().seq, 1);
        assert_eq!(slot.latest().unwrap().seq, 1);
    }

    #[test]
    fn test_grabber_publishes_frames() {
        let grabber = FrameGrabber::spawn(|| Ok(Counter { next: 0, limit: 5 })).unwrap();
        grabber.wait_for_first_frame(Duration::from_secs(2)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while grabber.latest().map(|f| f.seq) != Some(5) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let frame = grabber.latest().unwrap();
        assert_eq!(frame.seq, 5);
        assert_eq!(frame.image.get_pixel(0, 0)[0], 5);
        grabber.stop();
    }

    #[test]
    fn test_open_failure_is_reported() {
        let grabber = FrameGrabber::spawn(|| -> Result<Counter> {
            Err(Error::Camera("no device".to_string()))
        })
        .unwrap();
        let err = grabber
            .wait_for_first_frame(Duration::from_secs(2))
            .unwrap_err();
        assert!(err.to_string().contains("no device"));
        assert!(grabber.has_failed());
    }

    #[test]
    fn test_source_without_frames_times_out() {
        let grabber = FrameGrabber::spawn(|| Ok(Counter { next: 0, limit: 0 })).unwrap();
        let result = grabber.wait_for_first_frame(Duration::from_millis(100));
        assert!(result.is_err());
    }
}
