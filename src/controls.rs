//! Gesture-to-control decision tables
//!
//! Each [`ControlScheme`] owns a fixed priority table that maps the pair
//! (left gesture, right gesture) to driving [`Action`]s. A hand that was not
//! detected is `None`; a detected hand is present even when it is `Neutral`.
//!
//! Actions resolve to logical [`Control`]s, and [`KeyBindings`] turn those
//! into the physical keys the game listens to.

use crate::error::{Error, Result};
use crate::gesture::{ControlScheme, Gesture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Controls and actions
// ---------------------------------------------------------------------------

/// Logical game inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Control {
    Throttle,
    Brake,
    SteerLeft,
    SteerRight,
    Nitro,
}

/// A driving manoeuvre produced by the decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Accelerate,
    AccelLeft,
    AccelRight,
    Nitro,
    CoastLeft,
    CoastRight,
    ReverseStraight,
    ReverseLeft,
    ReverseRight,
    Brake,
}

impl Action {
    pub fn controls(self) -> &'static [Control] {
        use Control::*;
        match self {
            Self::Accelerate => &[Throttle],
            Self::AccelLeft => &[Throttle, SteerLeft],
            Self::AccelRight => &[Throttle, SteerRight],
            Self::Nitro => &[Nitro, Throttle],
            Self::CoastLeft => &[SteerLeft],
            Self::CoastRight => &[SteerRight],
            Self::ReverseStraight => &[Brake],
            Self::ReverseLeft => &[Brake, SteerLeft],
            Self::ReverseRight => &[Brake, SteerRight],
            Self::Brake => &[Brake],
        }
    }

    /// Human-readable label for the overlay and logs
    pub fn label(self) -> &'static str {
        match self {
            Self::Accelerate => "Accelerate",
            Self::AccelLeft => "Accel & Steer Left",
            Self::AccelRight => "Accel & Steer Right",
            Self::Nitro => "Nitro Boost",
            Self::CoastLeft => "Coasting Steer Left",
            Self::CoastRight => "Coasting Steer Right",
            Self::ReverseStraight => "Reverse",
            Self::ReverseLeft => "Reverse Left",
            Self::ReverseRight => "Reverse Right",
            Self::Brake => "Brake",
        }
    }
}

/// Outcome of one table lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    actions: Vec<Action>,
}

impl Decision {
    fn single(action: Action) -> Self {
        Self {
            actions: vec![action],
        }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_idle(&self) -> bool {
        self.actions.is_empty()
    }

    /// Union of the controls of every action
    pub fn controls(&self) -> BTreeSet<Control> {
        self.actions
            .iter()
            .flat_map(|a| a.controls().iter().copied())
            .collect()
    }

    pub fn label(&self) -> String {
        if self.actions.is_empty() {
            return "Coasting".to_string();
        }
        self.actions
            .iter()
            .map(|a| a.label())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

// ---------------------------------------------------------------------------
// Decision tables
// ---------------------------------------------------------------------------

impl ControlScheme {
    /// Look up the actions for a pair of hand states.
    pub fn decide(self, left: Option<Gesture>, right: Option<Gesture>) -> Decision {
        match self {
            Self::FingerCount => decide_finger_count(left, right),
            Self::Hybrid => decide_hybrid(left, right),
        }
    }

    /// Every (left, right) pair over the vocabulary, including an absent
    /// hand, that produces at least one action.
    pub fn decision_table(self) -> Vec<(Option<Gesture>, Option<Gesture>, Decision)> {
        let states: Vec<Option<Gesture>> = std::iter::once(None)
            .chain(self.vocabulary().iter().copied().map(Some))
            .collect();

        let mut rows = Vec::new();
        for &left in &states {
            for &right in &states {
                let decision = self.decide(left, right);
                if !decision.is_idle() {
                    rows.push((left, right, decision));
                }
            }
        }
        rows
    }
}

fn decide_finger_count(left: Option<Gesture>, right: Option<Gesture>) -> Decision {
    use Gesture::{OneFinger as One, ThreeFingers as Three, TwoFingers as Two};

    let combo = match (left, right) {
        (Some(Three), Some(Three)) => Some(Action::ReverseStraight),
        (Some(Two), Some(Two)) => Some(Action::Nitro),
        (Some(One), Some(One)) => Some(Action::Accelerate),
        (Some(Two), Some(One)) => Some(Action::AccelLeft),
        (Some(One), Some(Two)) => Some(Action::AccelRight),
        _ => None,
    };
    if let Some(action) = combo {
        return Decision::single(action);
    }

    // Single-hand fallback applies even when both hands are up but matched
    // no combo, so the two sides can combine.
    let mut actions = Vec::new();
    match left {
        Some(Two) => actions.push(Action::CoastLeft),
        Some(Three) => actions.push(Action::ReverseLeft),
        _ => {}
    }
    match right {
        Some(Two) => actions.push(Action::CoastRight),
        Some(Three) => actions.push(Action::ReverseRight),
        _ => {}
    }
    Decision { actions }
}

fn decide_hybrid(left: Option<Gesture>, right: Option<Gesture>) -> Decision {
    use Gesture::{Fist, OkSign, Open, ThumbsUp};

    let closed = |g: Gesture| matches!(g, Fist | ThumbsUp);

    let action = match (left, right) {
        (Some(OkSign), Some(OkSign)) => Some(Action::Nitro),
        (Some(OkSign), _) => Some(Action::ReverseLeft),
        (_, Some(OkSign)) => Some(Action::ReverseRight),
        (Some(l), Some(r)) => match (l, r) {
            (Open, r) if closed(r) => Some(Action::AccelRight),
            (l, Open) if closed(l) => Some(Action::AccelLeft),
            (Open, Open) => Some(Action::Accelerate),
            (Fist, Fist) => Some(Action::Brake),
            _ => None,
        },
        (Some(Fist), None) => Some(Action::CoastLeft),
        (None, Some(Fist)) => Some(Action::CoastRight),
        _ => None,
    };
    action.map(Decision::single).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Physical keys
// ---------------------------------------------------------------------------

/// A keyboard key that can be held down
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyCode {
    /// A printable character, stored lower-case
    Char(char),
    Space,
    Enter,
    Tab,
    Escape,
    Shift,
    Control,
    Alt,
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for KeyCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_whitespace() && !c.is_control() {
                return Ok(Self::Char(c));
            }
        }
        match lower.as_str() {
            "space" => Ok(Self::Space),
            "enter" | "return" => Ok(Self::Enter),
            "tab" => Ok(Self::Tab),
            "escape" | "esc" => Ok(Self::Escape),
            "shift" => Ok(Self::Shift),
            "control" | "ctrl" => Ok(Self::Control),
            "alt" => Ok(Self::Alt),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(Error::InvalidKey(s.to_string())),
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{}", c),
            Self::Space => f.write_str("space"),
            Self::Enter => f.write_str("enter"),
            Self::Tab => f.write_str("tab"),
            Self::Escape => f.write_str("escape"),
            Self::Shift => f.write_str("shift"),
            Self::Control => f.write_str("control"),
            Self::Alt => f.write_str("alt"),
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

impl TryFrom<String> for KeyCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<KeyCode> for String {
    fn from(key: KeyCode) -> Self {
        key.to_string()
    }
}

/// Set of physical keys, ordered for stable press/release sequencing
pub type KeySet = BTreeSet<KeyCode>;

/// Physical key for each logical control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub throttle: KeyCode,
    pub brake: KeyCode,
    pub steer_left: KeyCode,
    pub steer_right: KeyCode,
    pub nitro: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            throttle: KeyCode::Char('w'),
            brake: KeyCode::Char('s'),
            steer_left: KeyCode::Char('a'),
            steer_right: KeyCode::Char('d'),
            nitro: KeyCode::Char('x'),
        }
    }
}

impl KeyBindings {
    pub fn key_for(&self, control: Control) -> KeyCode {
        match control {
            Control::Throttle => self.throttle,
            Control::Brake => self.brake,
            Control::SteerLeft => self.steer_left,
            Control::SteerRight => self.steer_right,
            Control::Nitro => self.nitro,
        }
    }

    /// Keys to hold for a decision
    pub fn resolve(&self, decision: &Decision) -> KeySet {
        decision
            .controls()
            .into_iter()
            .map(|c| self.key_for(c))
            .collect()
    }

    /// Reject bindings that map two controls to one key.
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("throttle", self.throttle),
            ("brake", self.brake),
            ("steer_left", self.steer_left),
            ("steer_right", self.steer_right),
            ("nitro", self.nitro),
        ];
        for (i, (name, key)) in all.iter().enumerate() {
            if let Some((other, _)) = all[i + 1..].iter().find(|(_, k)| k == key) {
                return Err(Error::Config(format!(
                    "key '{}' is bound to both {} and {}",
                    key, name, other
                )));
            }
        }
        Ok(())
    }
}
