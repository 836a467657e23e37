//! Game loop orchestration
//!
//! Wires together the complete flow for every new camera frame:
//! 1. Capture (latest frame from the grabber thread)
//! 2. Tracking (prepare, detect landmarks, classify each hand)
//! 3. Recording (optional, detections appended to a replay file)
//! 4. Decision (scheme table lookup, then key bindings)
//! 5. Input (press/release the difference against held keys)
//! 6. Overlay (optional preview window)
//!
//! Whatever ends the loop, held keys are released and capture is stopped.

use crate::capture::FrameGrabber;
use crate::controls::{Decision, KeyBindings};
use crate::error::{Error, Result};
use crate::input::InputController;
use crate::overlay::{Overlay, OverlayFrame};
use crate::tracker::{DetectionRecorder, HandTracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Pause when no new frame is available yet
const IDLE_POLL: Duration = Duration::from_millis(2);

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown flag was raised (Ctrl-C)
    Shutdown,
    /// The user closed the overlay window
    OverlayClosed,
    /// The landmark provider has no more data
    ProviderExhausted,
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub frames_processed: u64,
    pub decision_changes: u64,
}

/// Frames per second over a sliding one-second window
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame at `now` and return the current rate.
    pub fn tick(&mut self, now: Instant) -> f32 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Raise `flag` when Ctrl-C is received.
pub fn install_ctrlc_handler(flag: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Ctrl-C received, stopping");
                        flag.store(true, Ordering::SeqCst);
                    }
                    Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
                }
            });
        })?;
    Ok(())
}

/// Capture, tracking, decision and input for one session
pub struct GameLoop {
    grabber: Option<FrameGrabber>,
    tracker: HandTracker,
    bindings: KeyBindings,
    input: InputController,
    recorder: Option<DetectionRecorder>,
    overlay: Option<Box<dyn Overlay>>,
    shutdown: Arc<AtomicBool>,
    warmup: Duration,
}

impl GameLoop {
    pub fn new(
        grabber: FrameGrabber,
        tracker: HandTracker,
        bindings: KeyBindings,
        input: InputController,
    ) -> Self {
        Self {
            grabber: Some(grabber),
            tracker,
            bindings,
            input,
            recorder: None,
            overlay: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            warmup: Duration::from_secs(1),
        }
    }

    pub fn with_recorder(mut self, recorder: DetectionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn Overlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// How long to wait for the first frame
    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Flag that stops the loop when set
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run until shutdown, overlay close or provider exhaustion.
    pub fn run(mut self) -> Result<RunSummary> {
        let result = self.run_loop();

        self.input.release_all();
        if let Some(grabber) = self.grabber.take() {
            grabber.stop();
        }
        if let Some(recorder) = self.recorder.take() {
            if let Err(e) = recorder.finish() {
                tracing::warn!("Failed to finish recording: {}", e);
            }
        }

        match &result {
            Ok(summary) => tracing::info!(
                "Stopped ({:?}) after {} frames, {} decision changes",
                summary.reason,
                summary.frames_processed,
                summary.decision_changes
            ),
            Err(e) => tracing::error!("Game loop failed: {}", e),
        }
        result
    }

    fn run_loop(&mut self) -> Result<RunSummary> {
        let grabber = self
            .grabber
            .as_ref()
            .ok_or_else(|| Error::Camera("capture already stopped".to_string()))?;
        grabber.wait_for_first_frame(self.warmup)?;
        let frames = grabber.frames();

        let scheme = self.tracker.classifier().scheme();
        tracing::info!("Game loop running with {} scheme", scheme.as_str());

        let mut last_seq = 0u64;
        let mut last_decision = Decision::default();
        let mut fps = FpsCounter::new();
        let mut summary = RunSummary {
            reason: StopReason::Shutdown,
            frames_processed: 0,
            decision_changes: 0,
        };

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                summary.reason = StopReason::Shutdown;
                break;
            }
            if self.grabber.as_ref().is_some_and(FrameGrabber::has_failed) {
                return Err(Error::Camera("frame source stopped producing frames".to_string()));
            }

            let frame = match frames.latest() {
                Some(frame) if frame.seq != last_seq => frame,
                _ => {
                    thread::sleep(IDLE_POLL);
                    continue;
                }
            };
            last_seq = frame.seq;

            let tracked = self.tracker.process(&frame.image)?;
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.record(&tracked.detections)?;
            }

            let decision = scheme.decide(tracked.hands.left, tracked.hands.right);
            let target = self.bindings.resolve(&decision);
            let delta = self.input.apply(&target)?;
            if !delta.is_empty() {
                tracing::debug!("pressed {:?}, released {:?}", delta.pressed, delta.released);
            }

            if decision != last_decision {
                tracing::info!(
                    "{} (L: {}, R: {})",
                    decision.label(),
                    tracked.hands.left.map_or("-", |g| g.as_str()),
                    tracked.hands.right.map_or("-", |g| g.as_str())
                );
                summary.decision_changes += 1;
                last_decision = decision.clone();
            }

            summary.frames_processed += 1;
            let rate = fps.tick(Instant::now());

            if let Some(overlay) = self.overlay.as_mut() {
                let view = OverlayFrame {
                    image: &tracked.image,
                    detections: &tracked.detections,
                    hands: tracked.hands,
                    decision: &decision,
                    held: self.input.held(),
                    fps: rate,
                };
                match overlay.show(&view) {
                    Ok(true) => {}
                    Ok(false) => {
                        summary.reason = StopReason::OverlayClosed;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Overlay failed, continuing without it: {}", e);
                        self.overlay = None;
                    }
                }
            }

            if self.tracker.is_exhausted() {
                summary.reason = StopReason::ProviderExhausted;
                break;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::BlankSource;
    use crate::controls::KeyCode;
    use crate::gesture::tests::hand;
    use crate::gesture::{ControlScheme, GestureClassifier};
    use crate::input::{KeyEvent, RecordingSink};
    use crate::landmarks::{HandDetection, Handedness};
    use crate::capture::FrameSource;
    use crate::tracker::{LandmarkProvider, ReplayProvider};
    use image::{Rgb, RgbImage};
    use parking_lot::Mutex;

    const W: KeyCode = KeyCode::Char('w');
    const A: KeyCode = KeyCode::Char('a');

    fn finger(handedness: Handedness, fingers: usize) -> HandDetection {
        let mut raised = [false; 5];
        for slot in raised.iter_mut().skip(1).take(fingers) {
            *slot = true;
        }
        HandDetection {
            handedness,
            score: 0.9,
            landmarks: hand(raised, false),
        }
    }

    fn game_loop(provider: Box<dyn LandmarkProvider>, sink: RecordingSink) -> GameLoop {
        let grabber = FrameGrabber::spawn(|| Ok(BlankSource::new(8, 6, 200))).unwrap();
        let classifier = GestureClassifier::new(ControlScheme::FingerCount, 0.1);
        let tracker = HandTracker::new(provider, classifier, true, (8, 6));
        GameLoop::new(
            grabber,
            tracker,
            KeyBindings::default(),
            InputController::new(Box::new(sink)),
        )
        .with_warmup(Duration::from_secs(2))
    }

    /// Reports an open overlay for a fixed number of frames
    struct ClosesAfter(u32);

    impl Overlay for ClosesAfter {
        fn show(&mut self, frame: &OverlayFrame<'_>) -> Result<bool> {
            assert_eq!(frame.image.dimensions(), (8, 6));
            self.0 = self.0.saturating_sub(1);
            Ok(self.0 > 0)
        }
    }

    /// Never reports any hands and never runs out
    struct Empty;

    impl LandmarkProvider for Empty {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<HandDetection>> {
            Ok(Vec::new())
        }
    }

    /// Publishes a few numbered frames slowly, then stops producing
    struct SlowNumbered {
        next: u8,
        limit: u8,
    }

    impl FrameSource for SlowNumbered {
        fn grab(&mut self) -> Result<RgbImage> {
            thread::sleep(Duration::from_millis(40));
            if self.next >= self.limit {
                return Err(Error::Camera("no more frames".to_string()));
            }
            self.next += 1;
            Ok(RgbImage::from_pixel(8, 6, Rgb([self.next, 0, 0])))
        }

        fn describe(&self) -> String {
            "slow numbered".to_string()
        }
    }

    /// Remembers the frame number of every image it is asked about
    struct Seen(Arc<Mutex<Vec<u8>>>);

    impl LandmarkProvider for Seen {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandDetection>> {
            self.0.lock().push(image.get_pixel(0, 0)[0]);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_fps_counter() {
        let start = Instant::now();
        let mut counter = FpsCounter {
            window_start: start,
            frames: 0,
            fps: 0.0,
        };
        for i in 1..30 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 30)), 0.0);
        }
        let fps = counter.tick(start + Duration::from_secs(1));
        assert!((fps - 30.0).abs() < 0.01);
        assert_eq!(counter.fps(), fps);
    }

    #[test]
    fn test_replay_drives_keys_and_releases_on_exit() {
        let frames = vec![
            vec![finger(Handedness::Left, 1), finger(Handedness::Right, 1)],
            vec![finger(Handedness::Left, 2), finger(Handedness::Right, 1)],
            vec![finger(Handedness::Left, 2), finger(Handedness::Right, 1)],
        ];
        let sink = RecordingSink::new();
        let summary = game_loop(Box::new(ReplayProvider::from_frames(frames, false)), sink.clone())
            .run()
            .unwrap();

        assert_eq!(summary.reason, StopReason::ProviderExhausted);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.decision_changes, 2);
        assert_eq!(
            sink.events(),
            vec![
                KeyEvent::Press(W),
                KeyEvent::Press(A),
                KeyEvent::Release(A),
                KeyEvent::Release(W),
            ]
        );
    }

    #[test]
    fn test_overlay_close_stops_loop() {
        let summary = game_loop(Box::new(Empty), RecordingSink::new())
            .with_overlay(Box::new(ClosesAfter(3)))
            .run()
            .unwrap();
        assert_eq!(summary.reason, StopReason::OverlayClosed);
        assert_eq!(summary.frames_processed, 3);
    }

    #[test]
    fn test_shutdown_flag_stops_loop() {
        let game = game_loop(Box::new(Empty), RecordingSink::new());
        let flag = game.shutdown_flag();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        });
        let summary = game.run().unwrap();
        stopper.join().unwrap();
        assert_eq!(summary.reason, StopReason::Shutdown);
    }

    #[test]
    fn test_failed_source_is_an_error() {
        let grabber = FrameGrabber::spawn(|| -> Result<BlankSource> {
            Err(Error::Camera("Could not open camera source".to_string()))
        })
        .unwrap();
        let tracker = HandTracker::new(Box::new(Empty), GestureClassifier::default(), true, (8, 6));
        let sink = RecordingSink::new();
        let result = GameLoop::new(
            grabber,
            tracker,
            KeyBindings::default(),
            InputController::new(Box::new(sink.clone())),
        )
        .run();
        assert!(result.is_err());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_each_frame_is_tracked_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let grabber = FrameGrabber::spawn(|| Ok(SlowNumbered { next: 0, limit: 4 })).unwrap();
        let tracker = HandTracker::new(
            Box::new(Seen(seen.clone())),
            GestureClassifier::default(),
            false,
            (8, 6),
        );
        let game = GameLoop::new(
            grabber,
            tracker,
            KeyBindings::default(),
            InputController::new(Box::new(RecordingSink::new())),
        )
        .with_warmup(Duration::from_secs(2));

        let flag = game.shutdown_flag();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(600));
            flag.store(true, Ordering::SeqCst);
        });
        let summary = game.run().unwrap();
        stopper.join().unwrap();

        // The loop polls far faster than frames arrive, yet each is seen once
        assert_eq!(*seen.lock(), vec![1, 2, 3, 4]);
        assert_eq!(summary.frames_processed, 4);
        assert_eq!(summary.reason, StopReason::Shutdown);
    }
}
