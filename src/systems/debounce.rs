use anyhow::{Result, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    Point2D,
    events::GestureEvent,
    systems::{classifier::Gesture, cursor::HandTrackState},
    tracking::Hand,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DebounceSettings {
    /// How long (ms) the pinch pose must hold before a Pinch fires
    pub pinch_hold_ms: u64,
    /// Gesture label changes closer together than this (ms) are ignored
    pub gesture_change_cooldown_ms: u64,
    /// Report PalmOpen every frame while the palm is open
    pub report_palm_open: bool,
    /// Report Point every frame while pointing
    pub report_point: bool,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        DebounceSettings {
            pinch_hold_ms: 60,
            gesture_change_cooldown_ms: 250,
            report_palm_open: true,
            report_point: true,
        }
    }
}

impl DebounceSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.pinch_hold_ms <= 2000,
            "pinchHoldMs of {} would make pinching unusable",
            self.pinch_hold_ms
        );
        ensure!(
            self.gesture_change_cooldown_ms <= 5000,
            "gestureChangeCooldownMs of {} would freeze gesture changes",
            self.gesture_change_cooldown_ms
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct HandDebounce {
    stable_gesture: Gesture,
    last_change: Option<f64>,
    pinch_since: Option<f64>,
    pinching: bool,
    last_position: Point2D,
}

/// Turns per-frame gesture labels into edge-triggered Pinch/Release and
/// GestureChange events, plus level-triggered PalmOpen/Point.
pub struct GestureDebouncer {
    settings: DebounceSettings,
    hands: [HandDebounce; 2],
}

impl GestureDebouncer {
    pub fn new(settings: DebounceSettings) -> Result<Self> {
        settings.validate()?;
        Ok(GestureDebouncer {
            settings,
            hands: Default::default(),
        })
    }

    /// Feed one visible hand's state for the frame at `t` (seconds)
    pub fn update(&mut self, t: f64, state: &HandTrackState) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        let hand = state.hand;
        let (x, y) = state.position;
        let hold = self.settings.pinch_hold_ms as f64 / 1000.;
        let cooldown = self.settings.gesture_change_cooldown_ms as f64 / 1000.;
        let h = &mut self.hands[hand.index()];
        h.last_position = state.position;

        // Pinch runs on the raw label so that release is never delayed by
        // the gesture-change cooldown
        if state.gesture == Gesture::Pinch {
            let since = *h.pinch_since.get_or_insert(t);
            if !h.pinching && t - since >= hold {
                h.pinching = true;
                events.push(GestureEvent::Pinch { hand, x, y });
            }
        } else {
            h.pinch_since = None;
            if h.pinching {
                h.pinching = false;
                events.push(GestureEvent::Release { hand, x, y });
            }
        }

        if state.gesture != h.stable_gesture {
            let cooled = h.last_change.is_none_or(|last| t - last >= cooldown);
            if cooled {
                events.push(GestureEvent::GestureChange {
                    hand,
                    from: h.stable_gesture,
                    to: state.gesture,
                });
                h.stable_gesture = state.gesture;
                h.last_change = Some(t);
            } else {
                debug!(
                    "{:?}: ignoring {} -> {} within cooldown",
                    hand,
                    h.stable_gesture.name(),
                    state.gesture.name()
                );
            }
        }

        match h.stable_gesture {
            Gesture::Palm if self.settings.report_palm_open => {
                events.push(GestureEvent::PalmOpen { hand, x, y })
            }
            Gesture::Point if self.settings.report_point => {
                events.push(GestureEvent::Point { hand, x, y })
            }
            _ => {}
        }

        events
    }

    /// The hand left the frame. A pinch in progress is released at the last
    /// known position; everything else is forgotten.
    pub fn hand_lost(&mut self, hand: Hand) -> Vec<GestureEvent> {
        let h = std::mem::take(&mut self.hands[hand.index()]);
        if h.pinching {
            let (x, y) = h.last_position;
            vec![GestureEvent::Release { hand, x, y }]
        } else {
            Vec::new()
        }
    }

    pub fn stable_gesture(&self, hand: Hand) -> Gesture {
        self.hands[hand.index()].stable_gesture
    }

    pub fn is_pinching(&self, hand: Hand) -> bool {
        self.hands[hand.index()].pinching
    }

    pub fn reset(&mut self) {
        self.hands = Default::default();
    }
}
