use serde::{Deserialize, Serialize};

use crate::{systems::classifier::Gesture, tracking::Hand};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PunchType {
    Jab,
    Cross,
    Hook,
    Uppercut,
}

impl PunchType {
    pub fn name(&self) -> &'static str {
        match self {
            PunchType::Jab => "jab",
            PunchType::Cross => "cross",
            PunchType::Hook => "hook",
            PunchType::Uppercut => "uppercut",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DodgeDirection {
    Left,
    Right,
}

/// Everything the pipeline reports to game code. Coordinates are normalised
/// [0,1] screen space (already mirrored).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GestureEvent {
    Move {
        hand: Hand,
        x: f32,
        y: f32,
    },
    Pinch {
        hand: Hand,
        x: f32,
        y: f32,
    },
    Release {
        hand: Hand,
        x: f32,
        y: f32,
    },
    PalmOpen {
        hand: Hand,
        x: f32,
        y: f32,
    },
    Point {
        hand: Hand,
        x: f32,
        y: f32,
    },
    #[serde(rename_all = "camelCase")]
    GestureChange {
        hand: Hand,
        from: Gesture,
        to: Gesture,
    },
    #[serde(rename_all = "camelCase")]
    Punch {
        hand: Hand,
        punch_type: PunchType,
        power: f32,
        x: f32,
        y: f32,
        travel_distance: f32,
    },
    #[serde(rename_all = "camelCase")]
    GuardChange {
        is_guarding: bool,
    },
    Dodge {
        direction: DodgeDirection,
    },
}

impl GestureEvent {
    /// Short name, as used in the serialised "type" tag
    pub fn kind(&self) -> &'static str {
        match self {
            GestureEvent::Move { .. } => "move",
            GestureEvent::Pinch { .. } => "pinch",
            GestureEvent::Release { .. } => "release",
            GestureEvent::PalmOpen { .. } => "palmOpen",
            GestureEvent::Point { .. } => "point",
            GestureEvent::GestureChange { .. } => "gestureChange",
            GestureEvent::Punch { .. } => "punch",
            GestureEvent::GuardChange { .. } => "guardChange",
            GestureEvent::Dodge { .. } => "dodge",
        }
    }

    pub fn hand(&self) -> Option<Hand> {
        match self {
            GestureEvent::Move { hand, .. }
            | GestureEvent::Pinch { hand, .. }
            | GestureEvent::Release { hand, .. }
            | GestureEvent::PalmOpen { hand, .. }
            | GestureEvent::Point { hand, .. }
            | GestureEvent::GestureChange { hand, .. }
            | GestureEvent::Punch { hand, .. } => Some(*hand),
            GestureEvent::GuardChange { .. } | GestureEvent::Dodge { .. } => None,
        }
    }
}
