pub mod classifier;
pub mod cursor;
pub mod debounce;
pub mod dodge;
pub mod guard;
pub mod punch;
pub mod smoothing;

use anyhow::Result;
use classifier::{Gesture, GestureClassifier};
use cursor::{CursorTracker, HandTrackState, Observation};
use debounce::GestureDebouncer;
use dodge::DodgeDetector;
use guard::GuardDetector;
use log::{debug, info, warn};
use punch::{PunchDetector, PunchPhase, PunchSample};

use crate::{
    Point2D,
    events::{DodgeDirection, GestureEvent},
    pipeline_config::PipelineConfig,
    tracking::{Hand, HandFrame, LandmarkSet},
};

/// Upper bound on hands processed per frame
pub const MAX_HANDS: usize = 2;

/// The whole per-frame pipeline. Owns every stage's state; callers only get
/// read-only views.
pub struct Systems {
    classifier: GestureClassifier,
    cursor: CursorTracker,
    debouncer: GestureDebouncer,
    punch_detector: PunchDetector,
    guard_detector: GuardDetector,
    dodge_detector: DodgeDetector,
    min_detection_confidence: f32,
    enable_gesture_events: bool,
    enable_punches: bool,
    enable_guard: bool,
    enable_dodge: bool,
    last_timestamp: Option<f64>,
}

impl Systems {
    pub fn new(config: &PipelineConfig) -> Result<Systems> {
        config.validate()?;

        let systems = Systems {
            classifier: GestureClassifier::new(config.gestures)?,
            cursor: CursorTracker::new(config.cursor)?,
            debouncer: GestureDebouncer::new(config.debounce)?,
            punch_detector: PunchDetector::new(config.punch)?,
            guard_detector: GuardDetector::new(config.guard)?,
            dodge_detector: DodgeDetector::new(config.dodge)?,
            min_detection_confidence: config.min_detection_confidence,
            enable_gesture_events: config.enable_gesture_events,
            enable_punches: config.enable_punches,
            enable_guard: config.enable_guard,
            enable_dodge: config.enable_dodge,
            last_timestamp: None,
        };

        info!(
            "Gesture pipeline ready ({:?} mode, punches: {}, guard: {}, dodge: {})",
            config.cursor.mode, config.enable_punches, config.enable_guard, config.enable_dodge
        );

        Ok(systems)
    }

    fn valid_hands(&self, frame: &HandFrame) -> Vec<LandmarkSet> {
        frame
            .hands
            .iter()
            .filter_map(|h| match LandmarkSet::try_from(h) {
                Ok(set) if set.score >= self.min_detection_confidence => Some(set),
                Ok(set) => {
                    debug!(
                        "Dropping hand with detection score {:.2} < {:.2}",
                        set.score, self.min_detection_confidence
                    );
                    None
                }
                Err(e) => {
                    warn!("Ignoring malformed hand at t={}: {}", frame.timestamp, e);
                    None
                }
            })
            .take(MAX_HANDS)
            .collect()
    }

    /// Both hands moved sideways together since the previous frame
    fn body_shifting(&self, t: f64) -> bool {
        let Some(last) = self.last_timestamp else {
            return false;
        };
        let lateral = |hand: Hand| {
            let s = self.cursor.state(hand);
            s.previous_palm
                .filter(|_| s.visible)
                .map(|previous| s.palm.x - previous.x)
        };
        match (lateral(Hand::Left), lateral(Hand::Right)) {
            (Some(l), Some(r)) => self.dodge_detector.is_body_shift(l, r, t - last),
            _ => false,
        }
    }

    /// Run one detector frame through every stage and return the events it
    /// produced, in order: releases for lost hands, then per hand
    /// move/pinch/gesture events, then guard, punches and dodge. A shared
    /// sideways shift of both hands blocks punches the same way the guard does.
    pub fn process_frame(&mut self, frame: &HandFrame) -> Vec<GestureEvent> {
        let t = frame.timestamp;
        if !t.is_finite() {
            warn!("Skipping frame with invalid timestamp {}", t);
            return Vec::new();
        }

        let hands = self.valid_hands(frame);
        let observations: Vec<Observation> = self
            .cursor
            .assign_hands(&hands)
            .into_iter()
            .map(|(hand, i)| Observation {
                hand,
                landmarks: &hands[i],
                gesture: self.classifier.classify(&hands[i]),
            })
            .collect();

        let lost = self.cursor.update(t, &observations);

        let mut events = Vec::new();
        for hand in lost {
            events.extend(self.debouncer.hand_lost(hand));
        }

        for state in self.cursor.visible_hands() {
            let (x, y) = state.position;
            events.push(GestureEvent::Move {
                hand: state.hand,
                x,
                y,
            });
            if self.enable_gesture_events {
                events.extend(self.debouncer.update(t, state));
            }
        }

        let palm = |hand: Hand| -> Option<Point2D> {
            let s = self.cursor.state(hand);
            s.visible.then_some(s.palm.xy())
        };

        if self.enable_guard {
            events.extend(
                self.guard_detector
                    .update(palm(Hand::Left), palm(Hand::Right)),
            );
        }
        let guarding = self.enable_guard && self.guard_detector.is_guarding();

        if self.enable_punches {
            let body_shift = self.body_shifting(t);
            if body_shift {
                debug!("Both hands shifting sideways at t={:.3}", t);
            }
            let blocked = guarding || body_shift;
            for hand in Hand::BOTH {
                let s = self.cursor.state(hand);
                let sample = s.visible.then_some(PunchSample {
                    x: s.palm.x,
                    y: s.palm.y,
                    depth: s.palm.z,
                    is_fist: s.gesture == Gesture::Fist,
                });
                events.extend(self.punch_detector.update(hand, t, sample, blocked));
            }
        }

        if self.enable_dodge {
            let palms: Vec<Point2D> = self.cursor.visible_hands().map(|s| s.palm.xy()).collect();
            events.extend(self.dodge_detector.update(t, &palms));
        }

        self.last_timestamp = Some(t);
        events
    }

    /// Clear every filter, cooldown and state machine, as if freshly built
    pub fn reset(&mut self) {
        self.cursor.reset();
        self.debouncer.reset();
        self.punch_detector.reset();
        self.guard_detector.reset();
        self.dodge_detector.reset();
        self.last_timestamp = None;
    }

    pub fn hand(&self, hand: Hand) -> &HandTrackState {
        self.cursor.state(hand)
    }

    pub fn cursor_position(&self, hand: Hand) -> Option<Point2D> {
        self.cursor.position(hand)
    }

    pub fn screen_position(&self, hand: Hand) -> Option<Point2D> {
        self.cursor.screen_position(hand)
    }

    pub fn fist_positions(&self) -> Vec<(Hand, Point2D)> {
        self.cursor.fist_positions()
    }

    /// Debounced gesture label for the hand
    pub fn gesture(&self, hand: Hand) -> Gesture {
        self.debouncer.stable_gesture(hand)
    }

    pub fn is_pinching(&self, hand: Hand) -> bool {
        self.debouncer.is_pinching(hand)
    }

    pub fn is_guarding(&self) -> bool {
        self.guard_detector.is_guarding()
    }

    pub fn dodge_direction(&self) -> Option<DodgeDirection> {
        self.dodge_detector.direction()
    }

    pub fn smoothed_center(&self) -> f32 {
        self.dodge_detector.smoothed_center()
    }

    pub fn punch_phase(&self, hand: Hand) -> &PunchPhase {
        self.punch_detector.phase(hand)
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }
}
