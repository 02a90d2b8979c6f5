//! Synthetic hands for tests. Poses are laid out around the palm centre
//! (wrist / middle-MCP midpoint) with an upright hand, y growing downward.

use crate::tracking::{
    DetectedHand, Hand, Handedness, LANDMARK_COUNT, Landmark, LandmarkSet,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandPose {
    OpenPalm,
    Fist,
    Point,
    Peace,
    /// Open palm with thumb and index tips 0.03 apart
    Pinch,
    /// All four fingers up, thumb folded against the index knuckle
    FlatThumbTucked,
}

const MCP_X: [f32; 4] = [-0.05, 0.0, 0.05, 0.1];
const THUMB_SPREAD: (f32, f32) = (-0.15, -0.05);
const THUMB_TUCKED: (f32, f32) = (0.03, -0.02);
const THUMB_FLAT: (f32, f32) = (-0.03, -0.08);

fn finger(up: bool) -> [f32; 4] {
    // MCP, PIP, DIP, TIP y offsets
    if up {
        [-0.1, -0.2, -0.25, -0.3]
    } else {
        [-0.1, -0.15, -0.1, -0.05]
    }
}

fn layout(fingers_up: [bool; 4], thumb_tip: (f32, f32)) -> [(f32, f32); LANDMARK_COUNT] {
    let mut pts = [(0., 0.); LANDMARK_COUNT];
    pts[0] = (0., 0.1);
    pts[1] = (-0.05, 0.07);
    pts[2] = (-0.09, 0.03);
    pts[3] = ((-0.09 + thumb_tip.0) / 2., (0.03 + thumb_tip.1) / 2.);
    pts[4] = thumb_tip;
    for f in 0..4 {
        let ys = finger(fingers_up[f]);
        for (j, y) in ys.iter().enumerate() {
            pts[5 + f * 4 + j] = (MCP_X[f], *y);
        }
    }
    pts
}

/// Camera-space hand with its palm centre at (cx, cy), depth 0
pub fn pose(p: HandPose, cx: f32, cy: f32) -> LandmarkSet {
    pose_with_depth(p, cx, cy, 0.)
}

pub fn pose_with_depth(p: HandPose, cx: f32, cy: f32, z: f32) -> LandmarkSet {
    let pts = match p {
        HandPose::OpenPalm => layout([true; 4], THUMB_SPREAD),
        HandPose::Fist => layout([false; 4], THUMB_TUCKED),
        HandPose::Point => layout([true, false, false, false], THUMB_TUCKED),
        HandPose::Peace => layout([true, true, false, false], THUMB_TUCKED),
        HandPose::Pinch => pinch_layout(0.03),
        HandPose::FlatThumbTucked => layout([true; 4], THUMB_FLAT),
    };
    let landmarks = pts.map(|(x, y)| Landmark::new(cx + x, cy + y, z));
    LandmarkSet::new(landmarks)
}

fn pinch_layout(gap: f32) -> [(f32, f32); LANDMARK_COUNT] {
    let index_tip = (MCP_X[0], finger(true)[3]);
    layout([true; 4], (index_tip.0 - gap, index_tip.1))
}

/// Open hand whose thumb tip sits `gap` to the left of the index tip
pub fn pinch_gap(cx: f32, cy: f32, gap: f32) -> LandmarkSet {
    LandmarkSet::new(pinch_layout(gap).map(|(x, y)| Landmark::new(cx + x, cy + y, 0.)))
}

pub fn with_depth(set: &LandmarkSet, index: usize, z: f32) -> LandmarkSet {
    let mut landmarks = *set.landmarks();
    landmarks[index].z = z;
    LandmarkSet::new(landmarks)
}

/// Wire-format hand for the user's `hand`, placed at screen position
/// (sx, sy) as it appears in a mirrored preview.
pub fn detected_at_screen(p: HandPose, hand: Hand, sx: f32, sy: f32, z: f32) -> DetectedHand {
    to_detected(&pose_with_depth(p, 1. - sx, sy, z), hand)
}

pub fn to_detected(set: &LandmarkSet, hand: Hand) -> DetectedHand {
    // mirrored camera: the detector labels the user's right hand "Left"
    let handedness = match hand {
        Hand::Left => Handedness::Right,
        Hand::Right => Handedness::Left,
    };
    DetectedHand {
        landmarks: set.landmarks().to_vec(),
        handedness: Some(handedness),
        score: Some(0.95),
    }
}
