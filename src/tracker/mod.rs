//! Hand tracking
//!
//! Landmark inference is delegated to a [`LandmarkProvider`]. The tracker
//! prepares each frame (mirror, downscale), asks the provider for hands, and
//! classifies every detected hand into a gesture.
//!
//! Providers exchange detections as JSON objects of the form
//!
//! ```json
//! {"hands": [{"handedness": "Left", "score": 0.98,
//!             "landmarks": [{"x": 0.51, "y": 0.62, "z": -0.01}, ...]}],
//!  "error": null}
//! ```
//!
//! which is also the line format of replay and recording files.

mod replay;
mod sidecar;

pub use replay::{DetectionRecorder, ReplayProvider};
pub use sidecar::{SidecarConfig, SidecarProvider};

use crate::error::Result;
use crate::gesture::{Gesture, GestureClassifier};
use crate::landmarks::{HandDetection, HandLandmarks, Handedness, Landmark};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Source of hand landmarks for an image
pub trait LandmarkProvider {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<HandDetection>>;

    /// True when the provider has nothing more to report
    fn is_exhausted(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// One hand as serialised by providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHand {
    pub handedness: String,
    #[serde(default)]
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}

/// Detections for one frame as serialised by providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionFrame {
    #[serde(default)]
    pub hands: Vec<WireHand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionFrame {
    pub fn from_detections(detections: &[HandDetection]) -> Self {
        Self {
            hands: detections
                .iter()
                .map(|d| WireHand {
                    handedness: d.handedness.to_string(),
                    score: d.score,
                    landmarks: d.landmarks.points().to_vec(),
                })
                .collect(),
            error: None,
        }
    }

    /// Convert to detections, skipping hands that are malformed.
    pub fn into_detections(self) -> Vec<HandDetection> {
        self.hands
            .into_iter()
            .filter_map(|hand| {
                let handedness = match hand.handedness.parse::<Handedness>() {
                    Ok(h) => h,
                    Err(e) => {
                        tracing::warn!("Skipping hand: {}", e);
                        return None;
                    }
                };
                let landmarks = match HandLandmarks::from_points(&hand.landmarks) {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::warn!("Skipping {} hand: {}", handedness, e);
                        return None;
                    }
                };
                Some(HandDetection {
                    handedness,
                    score: hand.score,
                    landmarks,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Per-frame hand state
// ---------------------------------------------------------------------------

/// Gesture of each hand, `None` when that hand was not seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandStates {
    pub left: Option<Gesture>,
    pub right: Option<Gesture>,
}

impl HandStates {
    /// Classify every detection. If two detections claim the same hand, the
    /// later one wins.
    pub fn from_detections(detections: &[HandDetection], classifier: &GestureClassifier) -> Self {
        let mut states = Self::default();
        for detection in detections {
            let gesture = classifier.classify(&detection.landmarks);
            match detection.handedness {
                Handedness::Left => states.left = Some(gesture),
                Handedness::Right => states.right = Some(gesture),
            }
        }
        states
    }
}

/// Mirror and downscale a camera frame before inference.
///
/// Mirroring makes on-screen movement match the player's own hands, and the
/// provider's handedness labels assume a mirrored image.
pub fn prepare_frame(image: &RgbImage, mirror: bool, width: u32, height: u32) -> RgbImage {
    let flipped;
    let source = if mirror {
        flipped = imageops::flip_horizontal(image);
        &flipped
    } else {
        image
    };

    if source.dimensions() == (width, height) {
        source.clone()
    } else {
        imageops::resize(source, width, height, FilterType::Triangle)
    }
}

/// Everything learned from one frame
#[derive(Debug, Clone)]
pub struct TrackedFrame {
    /// The prepared image that was sent to the provider
    pub image: RgbImage,
    pub detections: Vec<HandDetection>,
    pub hands: HandStates,
}

/// Frame preparation, landmark detection and classification
pub struct HandTracker {
    provider: Box<dyn LandmarkProvider>,
    classifier: GestureClassifier,
    mirror: bool,
    process_size: (u32, u32),
}

impl HandTracker {
    pub fn new(
        provider: Box<dyn LandmarkProvider>,
        classifier: GestureClassifier,
        mirror: bool,
        process_size: (u32, u32),
    ) -> Self {
        Self {
            provider,
            classifier,
            mirror,
            process_size,
        }
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn is_exhausted(&self) -> bool {
        self.provider.is_exhausted()
    }

    pub fn process(&mut self, frame: &RgbImage) -> Result<TrackedFrame> {
        let (width, height) = self.process_size;
        let image = prepare_frame(frame, self.mirror, width, height);
        let detections = self.provider.detect(&image)?;
        let hands = HandStates::from_detections(&detections, &self.classifier);
        Ok(TrackedFrame {
            image,
            detections,
            hands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::tests::hand;
    use crate::gesture::ControlScheme;
    use image::Rgb;

    fn detection(handedness: Handedness, raised: [bool; 5]) -> HandDetection {
        HandDetection {
            handedness,
            score: 0.9,
            landmarks: hand(raised, false),
        }
    }

    /// Returns the same detections for every frame
    struct Fixed(Vec<HandDetection>);

    impl LandmarkProvider for Fixed {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<HandDetection>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_hand_states_later_detection_wins() {
        let classifier = GestureClassifier::default();
        let detections = vec![
            detection(Handedness::Left, [false, true, false, false, false]),
            detection(Handedness::Right, [false, true, true, false, false]),
            detection(Handedness::Left, [false, true, true, true, false]),
        ];
        let states = HandStates::from_detections(&detections, &classifier);
        assert_eq!(states.left, Some(Gesture::ThreeFingers));
        assert_eq!(states.right, Some(Gesture::TwoFingers));
    }

    #[test]
    fn test_hand_states_empty() {
        let states = HandStates::from_detections(&[], &GestureClassifier::default());
        assert_eq!(states, HandStates::default());
    }

    #[test]
    fn test_prepare_frame_mirrors_and_resizes() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));

        let mirrored = prepare_frame(&image, true, 4, 2);
        assert_eq!(mirrored.get_pixel(3, 0), &Rgb([255, 0, 0]));
        assert_eq!(mirrored.get_pixel(0, 0), &Rgb([0, 0, 0]));

        let small = prepare_frame(&image, false, 2, 1);
        assert_eq!(small.dimensions(), (2, 1));
    }

    #[test]
    fn test_wire_frame_skips_bad_hands() {
        let json = r#"{"hands": [
            {"handedness": "Left", "score": 0.9, "landmarks": [{"x": 0.1, "y": 0.2}]},
            {"handedness": "Middle", "score": 0.9, "landmarks": []}
        ]}"#;
        let frame: DetectionFrame = serde_json::from_str(json).unwrap();
        assert!(frame.into_detections().is_empty());
    }

    #[test]
    fn test_wire_frame_from_detections() {
        let detections = vec![detection(Handedness::Right, [false; 5])];
        let frame = DetectionFrame::from_detections(&detections);
        assert_eq!(frame.hands[0].handedness, "Right");
        assert_eq!(frame.hands[0].landmarks.len(), 21);
        assert_eq!(frame.into_detections(), detections);
    }

    #[test]
    fn test_tracker_process() {
        let provider = Fixed(vec![detection(Handedness::Left, [false, true, false, false, false])]);
        let classifier = GestureClassifier::new(ControlScheme::FingerCount, 0.1);
        let mut tracker = HandTracker::new(Box::new(provider), classifier, true, (8, 6));

        let tracked = tracker.process(&RgbImage::new(16, 12)).unwrap();
        assert_eq!(tracked.image.dimensions(), (8, 6));
        assert_eq!(tracked.hands.left, Some(Gesture::OneFinger));
        assert_eq!(tracked.hands.right, None);
        assert!(!tracker.is_exhausted());
    }
}
