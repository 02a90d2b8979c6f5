use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use crate::Point2D;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// (tip, pip) pairs for the four non-thumb fingers, index first
pub const FINGERS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }

    pub fn xy(&self) -> Point2D {
        (self.x, self.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Handedness label as reported by the detector (not yet mirror-corrected)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// The user's physical hand, after handedness correction
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(&self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    /// Map a detector label onto the user's hand. A front-facing camera preview
    /// is mirrored, so the detector's "Left" is the user's right hand.
    pub fn from_handedness(handedness: Handedness, mirrored: bool) -> Hand {
        match (handedness, mirrored) {
            (Handedness::Left, false) | (Handedness::Right, true) => Hand::Left,
            (Handedness::Right, false) | (Handedness::Left, true) => Hand::Right,
        }
    }
}

/// One hand as delivered by the external detector. Nothing is validated yet.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetectedHand {
    pub landmarks: Vec<Landmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A single detector snapshot; `timestamp` is in seconds
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HandFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub hands: Vec<DetectedHand>,
}

impl HandFrame {
    pub fn new(timestamp: f64, hands: Vec<DetectedHand>) -> Self {
        HandFrame { timestamp, hands }
    }

    pub fn empty(timestamp: f64) -> Self {
        HandFrame {
            timestamp,
            hands: Vec::new(),
        }
    }
}

/// Exactly 21 finite landmarks for one hand. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    landmarks: [Landmark; LANDMARK_COUNT],
    pub handedness: Option<Handedness>,
    pub score: f32,
}

impl LandmarkSet {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        LandmarkSet {
            landmarks,
            handedness: None,
            score: 1.0,
        }
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = Some(handedness);
        self
    }

    pub fn get(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }

    pub fn wrist(&self) -> &Landmark {
        &self.landmarks[WRIST]
    }

    pub fn index_tip(&self) -> &Landmark {
        &self.landmarks[INDEX_TIP]
    }

    /// Midpoint of wrist and middle-finger MCP, in camera space
    pub fn palm_center(&self) -> Landmark {
        let w = &self.landmarks[WRIST];
        let m = &self.landmarks[MIDDLE_MCP];
        Landmark::new((w.x + m.x) / 2., (w.y + m.y) / 2., (w.z + m.z) / 2.)
    }
}

impl TryFrom<&DetectedHand> for LandmarkSet {
    type Error = anyhow::Error;

    fn try_from(hand: &DetectedHand) -> Result<Self> {
        let landmarks: [Landmark; LANDMARK_COUNT] =
            hand.landmarks.as_slice().try_into().map_err(|_| {
                anyhow!(
                    "expected {} landmarks, got {}",
                    LANDMARK_COUNT,
                    hand.landmarks.len()
                )
            })?;
        ensure!(
            landmarks.iter().all(|l| l.is_finite()),
            "landmark set contains non-finite coordinates"
        );
        Ok(LandmarkSet {
            landmarks,
            handedness: hand.handedness,
            score: hand.score.unwrap_or(1.0),
        })
    }
}
