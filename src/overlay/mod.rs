//! Preview window
//!
//! Shows the processed frame with the detected hand skeletons and a few
//! status lines. Everything is drawn onto a [`Canvas`] first; the window
//! backend only presents the finished buffer.

mod canvas;
#[cfg(feature = "overlay")]
mod window;

pub use canvas::{rgb, Canvas, LINE_HEIGHT};
#[cfg(feature = "overlay")]
pub use window::WindowOverlay;

use crate::controls::{Decision, KeySet};
use crate::error::Result;
use crate::landmarks::{HandDetection, Handedness, Landmark, HAND_CONNECTIONS};
use crate::tracker::HandStates;
use image::RgbImage;
use serde::{Deserialize, Serialize};

const BACKGROUND: u32 = rgb(16, 16, 24);
const LEFT_HAND: u32 = rgb(255, 170, 60);
const RIGHT_HAND: u32 = rgb(90, 200, 255);
const BONE: u32 = rgb(230, 230, 230);
const KEYS_TEXT: u32 = rgb(0, 255, 0);
const HANDS_TEXT: u32 = rgb(255, 255, 0);
const INFO_TEXT: u32 = rgb(220, 220, 220);
const TEXT_SCALE: usize = 2;
const MARGIN: usize = 10;
/// Normalized coordinates are clamped to this band before scaling
const COORD_BAND: (f32, f32) = (-1.0, 2.0);

/// Overlay window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Show the preview window
    pub enabled: bool,
    pub title: String,
    /// Window size relative to the processed frame
    pub scale: f32,
    /// Keep the window above the game
    pub always_on_top: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: "Gesture Pilot".to_string(),
            scale: 1.0,
            always_on_top: true,
        }
    }
}

/// What to show for one processed frame
#[derive(Debug, Clone, Copy)]
pub struct OverlayFrame<'a> {
    pub image: &'a RgbImage,
    pub detections: &'a [HandDetection],
    pub hands: HandStates,
    pub decision: &'a Decision,
    pub held: &'a KeySet,
    pub fps: f32,
}

/// A place to show overlay frames
pub trait Overlay {
    /// Present one frame. Returns `false` once the user asked to quit.
    fn show(&mut self, frame: &OverlayFrame<'_>) -> Result<bool>;
}

/// Open the preview window.
#[cfg(feature = "overlay")]
pub fn open_overlay(config: &OverlayConfig, width: u32, height: u32) -> Result<Box<dyn Overlay>> {
    Ok(Box::new(WindowOverlay::open(config, width, height)?))
}

/// Open the preview window.
#[cfg(not(feature = "overlay"))]
pub fn open_overlay(_config: &OverlayConfig, _width: u32, _height: u32) -> Result<Box<dyn Overlay>> {
    Err(crate::error::Error::FeatureDisabled {
        what: "The overlay window",
        feature: "overlay",
    })
}

/// Text lines drawn in the top-left corner
pub fn status_lines(frame: &OverlayFrame<'_>) -> Vec<String> {
    let keys = if frame.held.is_empty() {
        "-".to_string()
    } else {
        let mut names: Vec<String> = frame
            .held
            .iter()
            .map(|key| key.to_string().to_uppercase())
            .collect();
        names.sort();
        names.join(" ")
    };
    let hand = |gesture: Option<crate::gesture::Gesture>| {
        gesture.map_or_else(|| "-".to_string(), |g| g.to_string())
    };

    vec![
        format!("KEYS: {}", keys),
        format!("L: {} | R: {}", hand(frame.hands.left), hand(frame.hands.right)),
        format!("ACTION: {}", frame.decision.label()),
        format!("FPS: {:.0}", frame.fps),
    ]
}

/// Draw a complete overlay frame onto `canvas`.
pub fn compose(canvas: &mut Canvas, frame: &OverlayFrame<'_>) {
    canvas.fill(BACKGROUND);
    canvas.blit_scaled(frame.image);

    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    for detection in frame.detections {
        let project = |index: usize| to_canvas(detection.landmarks.get(index), w, h);
        for &(a, b) in HAND_CONNECTIONS.iter() {
            if let (Some(from), Some(to)) = (project(a), project(b)) {
                canvas.draw_line(from, to, BONE);
            }
        }
        let joint = match detection.handedness {
            Handedness::Left => LEFT_HAND,
            Handedness::Right => RIGHT_HAND,
        };
        for index in 0..detection.landmarks.points().len() {
            if let Some(center) = project(index) {
                canvas.draw_dot(center, 3, joint);
            }
        }
    }

    let colors = [KEYS_TEXT, HANDS_TEXT, INFO_TEXT, INFO_TEXT];
    for (row, (line, color)) in status_lines(frame).iter().zip(colors).enumerate() {
        let y = MARGIN + row * (LINE_HEIGHT + 2) * TEXT_SCALE;
        canvas.draw_text(line, MARGIN, y, TEXT_SCALE, color);
    }
}

/// Canvas position of a normalized landmark. Far-off values are pulled into
/// a band around the canvas; NaN or infinite ones are not drawn.
fn to_canvas(point: &Landmark, width: f32, height: f32) -> Option<(i64, i64)> {
    if !point.x.is_finite() || !point.y.is_finite() {
        return None;
    }
    let (lo, hi) = COORD_BAND;
    Some((
        (point.x.clamp(lo, hi) * width) as i64,
        (point.y.clamp(lo, hi) * height) as i64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::KeyCode;
    use crate::gesture::tests::hand;
    use crate::gesture::{ControlScheme, Gesture};
    use crate::landmarks::{HandLandmarks, INDEX_TIP, MIDDLE_TIP};

    fn compose_one(detection: &HandDetection) -> Canvas {
        let image = RgbImage::new(64, 48);
        let decision = Decision::default();
        let held = KeySet::new();
        let frame = OverlayFrame {
            image: &image,
            detections: std::slice::from_ref(detection),
            hands: HandStates::default(),
            decision: &decision,
            held: &held,
            fps: 0.0,
        };
        let mut canvas = Canvas::new(64, 48, 0);
        compose(&mut canvas, &frame);
        canvas
    }

    #[test]
    fn test_status_lines() {
        let image = RgbImage::new(4, 4);
        let hands = HandStates {
            left: Some(Gesture::OneFinger),
            right: None,
        };
        let decision = ControlScheme::FingerCount.decide(hands.left, hands.right);
        let held: KeySet = [KeyCode::Char('w'), KeyCode::Space].into_iter().collect();
        let frame = OverlayFrame {
            image: &image,
            detections: &[],
            hands,
            decision: &decision,
            held: &held,
            fps: 29.6,
        };

        let lines = status_lines(&frame);
        assert_eq!(lines[0], "KEYS: SPACE W");
        assert_eq!(lines[1], "L: ONE_FINGER | R: -");
        assert_eq!(lines[2], format!("ACTION: {}", decision.label()));
        assert_eq!(lines[3], "FPS: 30");
    }

    #[test]
    fn test_status_lines_idle() {
        let image = RgbImage::new(4, 4);
        let decision = Decision::default();
        let held = KeySet::new();
        let frame = OverlayFrame {
            image: &image,
            detections: &[],
            hands: HandStates::default(),
            decision: &decision,
            held: &held,
            fps: 0.0,
        };
        let lines = status_lines(&frame);
        assert_eq!(lines[0], "KEYS: -");
        assert_eq!(lines[1], "L: - | R: -");
        assert_eq!(lines[2], "ACTION: Coasting");
    }

    #[test]
    fn test_compose_draws_landmarks() {
        let image = RgbImage::new(64, 48);
        let detection = HandDetection {
            handedness: Handedness::Right,
            score: 1.0,
            landmarks: hand([true; 5], false),
        };
        let decision = Decision::default();
        let held = KeySet::new();
        let frame = OverlayFrame {
            image: &image,
            detections: std::slice::from_ref(&detection),
            hands: HandStates::default(),
            decision: &decision,
            held: &held,
            fps: 0.0,
        };

        let mut canvas = Canvas::new(200, 200, 0);
        compose(&mut canvas, &frame);

        let tip = detection.landmarks.get(crate::landmarks::INDEX_TIP);
        let (x, y) = ((tip.x * 200.0) as usize, (tip.y * 200.0) as usize);
        assert_eq!(canvas.pixel(x, y), Some(RIGHT_HAND));
    }

    #[test]
    fn test_status_keys_sorted_by_name() {
        let image = RgbImage::new(4, 4);
        let decision = Decision::default();
        let held: KeySet = [KeyCode::Left, KeyCode::Up].into_iter().collect();
        let frame = OverlayFrame {
            image: &image,
            detections: &[],
            hands: HandStates::default(),
            decision: &decision,
            held: &held,
            fps: 0.0,
        };
        assert_eq!(status_lines(&frame)[0], "KEYS: LEFT UP");
    }

    #[test]
    fn test_compose_survives_far_off_landmarks() {
        let mut points = *hand([true; 5], false).points();
        points[INDEX_TIP] = Landmark::new(-1.0e30, 0.5, 0.0);
        points[MIDDLE_TIP] = Landmark::new(f32::NAN, f32::INFINITY, 0.0);
        let detection = HandDetection {
            handedness: Handedness::Left,
            score: 1.0,
            landmarks: HandLandmarks::new(points),
        };

        let canvas = compose_one(&detection);

        // The rest of the hand is still drawn
        let wrist = detection.landmarks.get(crate::landmarks::WRIST);
        let (x, y) = ((wrist.x * 64.0) as usize, (wrist.y * 48.0) as usize);
        assert_eq!(canvas.pixel(x, y), Some(LEFT_HAND));
    }

    #[test]
    fn test_to_canvas_clamps_and_skips() {
        assert_eq!(to_canvas(&Landmark::new(0.5, 0.25, 0.0), 100.0, 40.0), Some((50, 10)));
        assert_eq!(to_canvas(&Landmark::new(-1.0e30, 9.0, 0.0), 100.0, 40.0), Some((-100, 80)));
        assert_eq!(to_canvas(&Landmark::new(f32::NAN, 0.5, 0.0), 100.0, 40.0), None);
    }
}
