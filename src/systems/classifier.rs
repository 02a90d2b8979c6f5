//! Stateless per-frame gesture classification from hand geometry.
//!
//! Camera-space y grows downward, so a finger is "up" when its tip sits
//! above (smaller y than) its PIP joint.
//!
//! When several poses match, the first in this order wins:
//! pinch, fist, point, peace, palm, otherwise none. A raised index finger
//! disqualifies fist, so the pointing pose (three curled fingers) stays
//! reachable.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    geometry_utils::{landmark_distance_2d, landmark_distance_3d},
    tracking::{FINGERS, INDEX_MCP, INDEX_TIP, LandmarkSet, THUMB_TIP, WRIST},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Gesture {
    #[default]
    None,
    Point,
    Palm,
    Pinch,
    Fist,
    Peace,
}

impl Gesture {
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::None => "none",
            Gesture::Point => "point",
            Gesture::Palm => "palm",
            Gesture::Pinch => "pinch",
            Gesture::Fist => "fist",
            Gesture::Peace => "peace",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CurlMode {
    /// Tip below its PIP joint
    TipBelowPip,
    /// Tip-to-wrist distance small relative to PIP-to-wrist distance;
    /// tolerates hand rotation better
    WristRatio,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierSettings {
    /// Thumb-tip to index-tip distance below which the hand is pinching
    pub pinch_distance: f32,
    /// Include depth when measuring the pinch distance
    pub pinch_use_depth: bool,
    /// Thumb-tip to index-MCP distance above which the thumb counts as spread
    pub thumb_spread_distance: f32,
    pub curl_mode: CurlMode,
    /// Used by `CurlMode::WristRatio`
    pub curl_ratio: f32,
    /// Curled fingers (of 4) needed for a fist
    pub fist_min_curled: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        ClassifierSettings {
            pinch_distance: 0.07,
            pinch_use_depth: false,
            thumb_spread_distance: 0.06,
            curl_mode: CurlMode::WristRatio,
            curl_ratio: 0.85,
            fist_min_curled: 3,
        }
    }
}

impl ClassifierSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.pinch_distance > 0.,
            "pinchDistance must be positive, got {}",
            self.pinch_distance
        );
        ensure!(
            self.thumb_spread_distance > 0.,
            "thumbSpreadDistance must be positive, got {}",
            self.thumb_spread_distance
        );
        ensure!(
            self.curl_ratio > 0. && self.curl_ratio <= 1.5,
            "curlRatio must be in (0, 1.5], got {}",
            self.curl_ratio
        );
        ensure!(
            (1..=4).contains(&self.fist_min_curled),
            "fistMinCurled must be between 1 and 4, got {}",
            self.fist_min_curled
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GestureClassifier {
    settings: ClassifierSettings,
}

impl GestureClassifier {
    pub fn new(settings: ClassifierSettings) -> Result<Self> {
        settings.validate()?;
        Ok(GestureClassifier { settings })
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    pub fn classify(&self, hand: &LandmarkSet) -> Gesture {
        if self.is_pinching(hand) {
            Gesture::Pinch
        } else if self.is_fist(hand) {
            Gesture::Fist
        } else if is_pointing(hand) {
            Gesture::Point
        } else if is_peace(hand) {
            Gesture::Peace
        } else if self.is_palm_open(hand) {
            Gesture::Palm
        } else {
            Gesture::None
        }
    }

    pub fn pinch_distance(&self, hand: &LandmarkSet) -> f32 {
        let thumb = hand.get(THUMB_TIP);
        let index = hand.get(INDEX_TIP);
        if self.settings.pinch_use_depth {
            landmark_distance_3d(thumb, index)
        } else {
            landmark_distance_2d(thumb, index)
        }
    }

    pub fn is_pinching(&self, hand: &LandmarkSet) -> bool {
        self.pinch_distance(hand) < self.settings.pinch_distance
    }

    pub fn is_thumb_spread(&self, hand: &LandmarkSet) -> bool {
        landmark_distance_2d(hand.get(THUMB_TIP), hand.get(INDEX_MCP))
            > self.settings.thumb_spread_distance
    }

    pub fn is_curled(&self, hand: &LandmarkSet, finger: usize) -> bool {
        let (tip, pip) = FINGERS[finger];
        match self.settings.curl_mode {
            CurlMode::TipBelowPip => finger_down(hand, finger),
            CurlMode::WristRatio => {
                let wrist = hand.get(WRIST);
                let pip_reach = landmark_distance_2d(hand.get(pip), wrist);
                if pip_reach <= f32::EPSILON {
                    return false;
                }
                landmark_distance_2d(hand.get(tip), wrist) / pip_reach < self.settings.curl_ratio
            }
        }
    }

    pub fn is_fist(&self, hand: &LandmarkSet) -> bool {
        let curled = (0..FINGERS.len())
            .filter(|f| self.is_curled(hand, *f))
            .count();
        curled >= self.settings.fist_min_curled && !finger_up(hand, 0)
    }

    pub fn is_palm_open(&self, hand: &LandmarkSet) -> bool {
        (0..FINGERS.len()).all(|f| finger_up(hand, f)) && self.is_thumb_spread(hand)
    }
}

/// `finger` indexes `FINGERS`: 0 = index ... 3 = pinky
pub fn finger_up(hand: &LandmarkSet, finger: usize) -> bool {
    let (tip, pip) = FINGERS[finger];
    hand.get(tip).y < hand.get(pip).y
}

pub fn finger_down(hand: &LandmarkSet, finger: usize) -> bool {
    let (tip, pip) = FINGERS[finger];
    hand.get(tip).y > hand.get(pip).y
}

fn is_pointing(hand: &LandmarkSet) -> bool {
    finger_up(hand, 0) && finger_down(hand, 1) && finger_down(hand, 2) && finger_down(hand, 3)
}

fn is_peace(hand: &LandmarkSet) -> bool {
    finger_up(hand, 0) && finger_up(hand, 1) && finger_down(hand, 2) && finger_down(hand, 3)
}
