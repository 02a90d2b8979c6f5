use anyhow::{Result, ensure};
use log::debug;
use map_range::MapRange;
use serde::{Deserialize, Serialize};

use crate::{
    Point2D,
    systems::{
        classifier::Gesture,
        smoothing::{FilterSettings, OneEuroFilter2D},
    },
    tracking::{Hand, Landmark, LandmarkSet},
};

/// Dual tracks both hands; Single keeps at most one hand visible and sticks
/// to the label it was first seen with until it leaves the frame.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackingMode {
    Single,
    Dual,
}

/// Which raw point drives the cursor
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CursorAnchor {
    IndexTip,
    PalmCenter,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn to_screen(&self, p: Point2D) -> Point2D {
        let (x, y) = p;
        (
            x.map_range(0. ..1., 0. ..self.width),
            y.map_range(0. ..1., 0. ..self.height),
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280.,
            height: 720.,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CursorSettings {
    pub mode: TrackingMode,
    pub anchor: CursorAnchor,
    /// Flip x (1 - x) so on-screen motion follows the user in a mirrored preview
    pub mirror_x: bool,
    /// Swap the detector's Left/Right labels (mirrored front camera)
    pub mirror_handedness: bool,
    pub filter: FilterSettings,
    pub viewport: Viewport,
}

impl Default for CursorSettings {
    fn default() -> Self {
        CursorSettings {
            mode: TrackingMode::Dual,
            anchor: CursorAnchor::IndexTip,
            mirror_x: true,
            mirror_handedness: true,
            filter: FilterSettings::cursor(),
            viewport: Viewport::default(),
        }
    }
}

impl CursorSettings {
    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        ensure!(
            self.viewport.width > 0. && self.viewport.height > 0.,
            "viewport must have a positive size, got {}x{}",
            self.viewport.width,
            self.viewport.height
        );
        Ok(())
    }
}

/// Read-only view of one tracked hand, as exposed to renderers
#[derive(Debug, Clone, PartialEq)]
pub struct HandTrackState {
    pub hand: Hand,
    pub visible: bool,
    /// Mirrored but unfiltered anchor position
    pub raw_position: Point2D,
    pub previous_raw_position: Option<Point2D>,
    /// Filtered anchor position, normalised
    pub position: Point2D,
    pub previous_position: Option<Point2D>,
    /// Filtered anchor position, in viewport pixels
    pub screen_position: Point2D,
    /// Mirrored palm centre; z is the raw relative depth
    pub palm: Landmark,
    pub previous_palm: Option<Landmark>,
    pub gesture: Gesture,
    pub last_seen: Option<f64>,
}

impl HandTrackState {
    fn new(hand: Hand) -> Self {
        HandTrackState {
            hand,
            visible: false,
            raw_position: (0., 0.),
            previous_raw_position: None,
            position: (0., 0.),
            previous_position: None,
            screen_position: (0., 0.),
            palm: Landmark::default(),
            previous_palm: None,
            gesture: Gesture::None,
            last_seen: None,
        }
    }
}

/// One classified hand for the current frame
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub hand: Hand,
    pub landmarks: &'a LandmarkSet,
    pub gesture: Gesture,
}

struct Slot {
    state: HandTrackState,
    filter: OneEuroFilter2D,
}

pub struct CursorTracker {
    settings: CursorSettings,
    slots: [Slot; 2],
}

impl CursorTracker {
    pub fn new(settings: CursorSettings) -> Result<Self> {
        settings.validate()?;
        let slot = |hand| -> Result<Slot> {
            Ok(Slot {
                state: HandTrackState::new(hand),
                filter: OneEuroFilter2D::new(settings.filter)?,
            })
        };
        Ok(CursorTracker {
            settings,
            slots: [slot(Hand::Left)?, slot(Hand::Right)?],
        })
    }

    pub fn settings(&self) -> &CursorSettings {
        &self.settings
    }

    fn mirror(&self, x: f32) -> f32 {
        if self.settings.mirror_x { 1. - x } else { x }
    }

    /// Decide which of the user's hands each detection belongs to.
    /// Returns (hand, index into `hands`), at most one entry per hand.
    pub fn assign_hands(&self, hands: &[LandmarkSet]) -> Vec<(Hand, usize)> {
        match self.settings.mode {
            TrackingMode::Single => {
                let Some(first) = hands.first() else {
                    return Vec::new();
                };
                let hand = self
                    .slots
                    .iter()
                    .find(|s| s.state.visible)
                    .map(|s| s.state.hand)
                    .or_else(|| {
                        first
                            .handedness
                            .map(|h| Hand::from_handedness(h, self.settings.mirror_handedness))
                    })
                    .unwrap_or(Hand::Right);
                vec![(hand, 0)]
            }
            TrackingMode::Dual => {
                let mut assigned: Vec<(Hand, usize)> = Vec::new();
                let mut leftover: Vec<usize> = Vec::new();
                for (i, set) in hands.iter().enumerate().take(2) {
                    let wanted = set
                        .handedness
                        .map(|h| Hand::from_handedness(h, self.settings.mirror_handedness));
                    match wanted {
                        Some(hand) if !assigned.iter().any(|(h, _)| *h == hand) => {
                            assigned.push((hand, i))
                        }
                        _ => leftover.push(i),
                    }
                }
                // Unlabelled or duplicate-labelled hands: leftmost on screen
                // takes the first free slot
                leftover.sort_by(|a, b| {
                    let xa = self.mirror(hands[*a].palm_center().x);
                    let xb = self.mirror(hands[*b].palm_center().x);
                    xa.total_cmp(&xb)
                });
                for i in leftover {
                    if let Some(free) = Hand::BOTH
                        .into_iter()
                        .find(|h| !assigned.iter().any(|(taken, _)| taken == h))
                    {
                        assigned.push((free, i));
                    }
                }
                assigned
            }
        }
    }

    /// Apply one frame. Hands not observed are marked invisible and their
    /// filters reset. Returns the hands that disappeared on this frame.
    pub fn update(&mut self, t: f64, observations: &[Observation]) -> Vec<Hand> {
        let mut lost = Vec::new();
        let mirror_x = self.settings.mirror_x;
        let anchor = self.settings.anchor;
        let viewport = self.settings.viewport;

        for hand in Hand::BOTH {
            let observation = observations.iter().find(|o| o.hand == hand);
            let slot = &mut self.slots[hand.index()];
            match observation {
                Some(o) => {
                    let raw = match anchor {
                        CursorAnchor::IndexTip => o.landmarks.index_tip().xy(),
                        CursorAnchor::PalmCenter => o.landmarks.palm_center().xy(),
                    };
                    let raw = (if mirror_x { 1. - raw.0 } else { raw.0 }, raw.1);
                    let mut palm = o.landmarks.palm_center();
                    if mirror_x {
                        palm.x = 1. - palm.x;
                    }

                    let filtered = slot.filter.filter(raw, t);

                    let state = &mut slot.state;
                    if !state.visible {
                        debug!("{:?} hand appeared at {:?}", hand, raw);
                        state.previous_raw_position = None;
                        state.previous_position = None;
                        state.previous_palm = None;
                    } else {
                        state.previous_raw_position = Some(state.raw_position);
                        state.previous_position = Some(state.position);
                        state.previous_palm = Some(state.palm);
                    }
                    state.visible = true;
                    state.raw_position = raw;
                    state.position = filtered;
                    state.screen_position = viewport.to_screen(filtered);
                    state.palm = palm;
                    state.gesture = o.gesture;
                    state.last_seen = Some(t);
                }
                None => {
                    if slot.state.visible {
                        debug!("{:?} hand lost", hand);
                        lost.push(hand);
                    }
                    slot.state.visible = false;
                    slot.state.gesture = Gesture::None;
                    slot.state.previous_raw_position = None;
                    slot.state.previous_position = None;
                    slot.state.previous_palm = None;
                    slot.filter.reset();
                }
            }
        }
        lost
    }

    pub fn state(&self, hand: Hand) -> &HandTrackState {
        &self.slots[hand.index()].state
    }

    /// Filtered normalised cursor position, if the hand is visible
    pub fn position(&self, hand: Hand) -> Option<Point2D> {
        let s = self.state(hand);
        s.visible.then_some(s.position)
    }

    pub fn screen_position(&self, hand: Hand) -> Option<Point2D> {
        let s = self.state(hand);
        s.visible.then_some(s.screen_position)
    }

    pub fn visible_hands(&self) -> impl Iterator<Item = &HandTrackState> {
        self.slots.iter().map(|s| &s.state).filter(|s| s.visible)
    }

    /// Cursor positions of every visible hand currently making a fist
    pub fn fist_positions(&self) -> Vec<(Hand, Point2D)> {
        self.visible_hands()
            .filter(|s| s.gesture == Gesture::Fist)
            .map(|s| (s.hand, s.position))
            .collect()
    }

    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.state = HandTrackState::new(slot.state.hand);
            slot.filter.reset();
        }
    }
}
