//! Gesture classification
//!
//! Turns one hand's landmarks into a discrete [`Gesture`] using simple
//! geometric checks: a finger counts as extended when its tip sits above its
//! PIP joint in the image, and a pinch is a short thumb-to-index distance.

use crate::landmarks::{self, planar_distance, HandLandmarks};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default thumb-tip to index-tip distance (normalised units) for a pinch
pub const DEFAULT_PINCH_THRESHOLD: f32 = 0.1;

/// Discrete hand states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    Neutral,
    OneFinger,
    TwoFingers,
    ThreeFingers,
    Open,
    Fist,
    ThumbsUp,
    OkSign,
}

impl Gesture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::OneFinger => "ONE_FINGER",
            Self::TwoFingers => "TWO_FINGERS",
            Self::ThreeFingers => "THREE_FINGERS",
            Self::Open => "OPEN",
            Self::Fist => "FIST",
            Self::ThumbsUp => "THUMBS_UP",
            Self::OkSign => "OK_SIGN",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which gesture vocabulary and decision table drive the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlScheme {
    /// One/two/three raised fingers per hand
    #[default]
    FingerCount,
    /// Open palm, fist, thumbs-up and OK sign
    Hybrid,
}

impl ControlScheme {
    /// Gestures the classifier can produce under this scheme
    pub fn vocabulary(self) -> &'static [Gesture] {
        match self {
            Self::FingerCount => &[
                Gesture::Neutral,
                Gesture::OneFinger,
                Gesture::TwoFingers,
                Gesture::ThreeFingers,
            ],
            Self::Hybrid => &[
                Gesture::Neutral,
                Gesture::Open,
                Gesture::Fist,
                Gesture::ThumbsUp,
                Gesture::OkSign,
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FingerCount => "finger_count",
            Self::Hybrid => "hybrid",
        }
    }
}

impl FromStr for ControlScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "finger_count" | "fingers" => Ok(Self::FingerCount),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown control scheme: {}", other)),
        }
    }
}

/// Extension state of each digit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerState {
    pub fn from_landmarks(hand: &HandLandmarks) -> Self {
        let above = |tip: usize, joint: usize| hand.get(tip).y < hand.get(joint).y;
        Self {
            thumb: above(landmarks::THUMB_TIP, landmarks::THUMB_IP),
            index: above(landmarks::INDEX_TIP, landmarks::INDEX_PIP),
            middle: above(landmarks::MIDDLE_TIP, landmarks::MIDDLE_PIP),
            ring: above(landmarks::RING_TIP, landmarks::RING_PIP),
            pinky: above(landmarks::PINKY_TIP, landmarks::PINKY_PIP),
        }
    }

    /// Raised fingers, not counting the thumb
    pub fn count(&self) -> usize {
        [self.index, self.middle, self.ring, self.pinky]
            .iter()
            .filter(|&&up| up)
            .count()
    }
}

/// Maps landmarks to gestures for one scheme
#[derive(Debug, Clone, Copy)]
pub struct GestureClassifier {
    scheme: ControlScheme,
    pinch_threshold: f32,
}

impl GestureClassifier {
    pub fn new(scheme: ControlScheme, pinch_threshold: f32) -> Self {
        Self {
            scheme,
            pinch_threshold,
        }
    }

    pub fn scheme(&self) -> ControlScheme {
        self.scheme
    }

    pub fn classify(&self, hand: &HandLandmarks) -> Gesture {
        let fingers = FingerState::from_landmarks(hand);
        match self.scheme {
            ControlScheme::FingerCount => classify_finger_count(&fingers),
            ControlScheme::Hybrid => {
                let pinch = planar_distance(
                    hand.get(landmarks::THUMB_TIP),
                    hand.get(landmarks::INDEX_TIP),
                );
                classify_hybrid(&fingers, pinch < self.pinch_threshold)
            }
        }
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(ControlScheme::default(), DEFAULT_PINCH_THRESHOLD)
    }
}

fn classify_finger_count(f: &FingerState) -> Gesture {
    match f.count() {
        1 if f.index => Gesture::OneFinger,
        2 if f.index && f.middle => Gesture::TwoFingers,
        3 if f.index && f.middle && f.ring => Gesture::ThreeFingers,
        _ => Gesture::Neutral,
    }
}

fn classify_hybrid(f: &FingerState, pinched: bool) -> Gesture {
    let count = f.count();
    if pinched {
        Gesture::OkSign
    } else if f.thumb && count == 0 {
        Gesture::ThumbsUp
    } else if count >= 4 {
        Gesture::Open
    } else if count == 0 {
        Gesture::Fist
    } else {
        Gesture::Neutral
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::landmarks::{Landmark, LANDMARK_COUNT};

    /// Build a hand with the given digits raised. Thumb and index tips are
    /// far apart unless `pinch` is set.
    pub(crate) fn hand(raised: [bool; 5], pinch: bool) -> HandLandmarks {
        let mut points = [Landmark::new(0.5, 0.5, 0.0); LANDMARK_COUNT];
        let digits = [
            (landmarks::THUMB_TIP, landmarks::THUMB_IP, 0.20),
            (landmarks::INDEX_TIP, landmarks::INDEX_PIP, 0.40),
            (landmarks::MIDDLE_TIP, landmarks::MIDDLE_PIP, 0.50),
            (landmarks::RING_TIP, landmarks::RING_PIP, 0.60),
            (landmarks::PINKY_TIP, landmarks::PINKY_PIP, 0.70),
        ];
        for (i, (tip, joint, x)) in digits.into_iter().enumerate() {
            points[joint] = Landmark::new(x, 0.5, 0.0);
            let tip_y = if raised[i] { 0.3 } else { 0.6 };
            points[tip] = Landmark::new(x, tip_y, 0.0);
        }
        if pinch {
            let index_tip = points[landmarks::INDEX_TIP];
            points[landmarks::THUMB_TIP] =
                Landmark::new(index_tip.x + 0.03, index_tip.y + 0.02, 0.0);
        }
        HandLandmarks::new(points)
    }

    fn finger_count() -> GestureClassifier {
        GestureClassifier::new(ControlScheme::FingerCount, DEFAULT_PINCH_THRESHOLD)
    }

    fn hybrid() -> GestureClassifier {
        GestureClassifier::new(ControlScheme::Hybrid, DEFAULT_PINCH_THRESHOLD)
    }

    #[test]
    fn test_finger_state_reads_tip_above_pip() {
        let state = FingerState::from_landmarks(&hand([true, true, false, false, true], false));
        assert!(state.thumb);
        assert!(state.index);
        assert!(!state.middle);
        assert!(!state.ring);
        assert!(state.pinky);
        assert_eq!(state.count(), 2);
    }

    #[test]
    fn test_finger_count_labels() {
        let c = finger_count();
        assert_eq!(c.classify(&hand([false, true, false, false, false], false)), Gesture::OneFinger);
        assert_eq!(c.classify(&hand([false, true, true, false, false], false)), Gesture::TwoFingers);
        assert_eq!(c.classify(&hand([false, true, true, true, false], false)), Gesture::ThreeFingers);
    }

    #[test]
    fn test_finger_count_ignores_thumb() {
        let c = finger_count();
        assert_eq!(c.classify(&hand([true, true, false, false, false], false)), Gesture::OneFinger);
    }

    #[test]
    fn test_finger_count_wrong_fingers_are_neutral() {
        let c = finger_count();
        // Single pinky, middle+ring, all four, and a closed hand
        assert_eq!(c.classify(&hand([false, false, false, false, true], false)), Gesture::Neutral);
        assert_eq!(c.classify(&hand([false, false, true, true, false], false)), Gesture::Neutral);
        assert_eq!(c.classify(&hand([false, true, true, true, true], false)), Gesture::Neutral);
        assert_eq!(c.classify(&hand([false; 5], false)), Gesture::Neutral);
    }

    #[test]
    fn test_hybrid_labels() {
        let c = hybrid();
        assert_eq!(c.classify(&hand([true, true, true, true, true], false)), Gesture::Open);
        assert_eq!(c.classify(&hand([false; 5], false)), Gesture::Fist);
        assert_eq!(c.classify(&hand([true, false, false, false, false], false)), Gesture::ThumbsUp);
        assert_eq!(c.classify(&hand([false, true, true, false, false], false)), Gesture::Neutral);
    }

    #[test]
    fn test_hybrid_pinch_wins_over_everything() {
        let c = hybrid();
        assert_eq!(c.classify(&hand([true, true, true, true, true], true)), Gesture::OkSign);
        assert_eq!(c.classify(&hand([false; 5], true)), Gesture::OkSign);
    }

    #[test]
    fn test_pinch_threshold_is_configurable() {
        let mut points = *hand([false; 5], false).points();
        let index_tip = points[landmarks::INDEX_TIP];
        points[landmarks::THUMB_TIP] = Landmark::new(index_tip.x + 0.15, index_tip.y, 0.0);
        let c = GestureClassifier::new(ControlScheme::Hybrid, 0.1);
        assert_ne!(c.classify(&HandLandmarks::new(points)), Gesture::OkSign);

        let loose = GestureClassifier::new(ControlScheme::Hybrid, 0.2);
        assert_eq!(loose.classify(&HandLandmarks::new(points)), Gesture::OkSign);
    }

    #[test]
    fn test_control_scheme_parse() {
        assert_eq!("finger-count".parse::<ControlScheme>().unwrap(), ControlScheme::FingerCount);
        assert_eq!("HYBRID".parse::<ControlScheme>().unwrap(), ControlScheme::Hybrid);
        assert!("steering-wheel".parse::<ControlScheme>().is_err());
    }

    #[test]
    fn test_gesture_serialises_as_label() {
        assert_eq!(serde_json::to_string(&Gesture::OkSign).unwrap(), "\"OK_SIGN\"");
        assert_eq!(Gesture::ThreeFingers.to_string(), "THREE_FINGERS");
    }
}
