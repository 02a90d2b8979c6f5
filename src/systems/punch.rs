//! Per-hand punch detection as an explicit state machine:
//! `Idle -> Reaching -> (complete | failed) -> Idle`.
//!
//! Depth is the detector's relative z of the palm centre; smaller z is
//! closer to the camera, so "forward" velocity is the rate at which z drops.
//! With a depth filter configured, only the velocity gates see the filtered
//! depth; travel and peak depth are always measured on the raw signal.

use anyhow::{Result, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    events::{GestureEvent, PunchType},
    systems::smoothing::{FilterSettings, MIN_DT, OneEuroFilter},
    tracking::Hand,
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PunchSettings {
    /// Forward (toward camera) depth velocity, units/s, that starts a reach
    pub forward_velocity: f32,
    /// Upward velocity (screen heights/s) that starts an uppercut reach
    pub uppercut_velocity: f32,
    /// Lateral velocity (screen widths/s) that starts a hook reach
    pub hook_velocity: f32,
    /// Hands above this y (screen space, 0 = top) are in the upper region
    pub upper_region_y: f32,
    /// Forward depth travel that counts as an extended punch
    pub min_travel: f32,
    pub uppercut_travel: f32,
    pub hook_travel: f32,
    /// After this long (ms) a reach counts as extended regardless of travel
    pub min_extend_ms: u64,
    /// A reach is resolved (completed or discarded) after this long (ms)
    pub max_reach_ms: u64,
    pub cooldown_ms: u64,
    /// Power added per unit of travel
    pub travel_power_scale: f32,
    /// Travel speeds (units/s) that each earn `speed_bonus`
    pub speed_bonus_low: f32,
    pub speed_bonus_high: f32,
    pub speed_bonus: f32,
    pub fist_bonus: f32,
    /// Straight punches from this hand are jabs, from the other crosses
    pub lead_hand: Hand,
    /// Optional smoothing of the depth signal before velocities are taken
    pub depth_filter: Option<FilterSettings>,
}

impl Default for PunchSettings {
    fn default() -> Self {
        PunchSettings {
            forward_velocity: 0.25,
            uppercut_velocity: 1.0,
            hook_velocity: 1.2,
            upper_region_y: 0.7,
            min_travel: 0.025,
            uppercut_travel: 0.12,
            hook_travel: 0.15,
            min_extend_ms: 150,
            max_reach_ms: 500,
            cooldown_ms: 300,
            travel_power_scale: 10.,
            speed_bonus_low: 0.2,
            speed_bonus_high: 0.5,
            speed_bonus: 0.5,
            fist_bonus: 0.3,
            lead_hand: Hand::Left,
            depth_filter: None,
        }
    }
}

impl PunchSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("forwardVelocity", self.forward_velocity),
            ("uppercutVelocity", self.uppercut_velocity),
            ("hookVelocity", self.hook_velocity),
            ("minTravel", self.min_travel),
            ("uppercutTravel", self.uppercut_travel),
            ("hookTravel", self.hook_travel),
        ] {
            ensure!(
                value.is_finite() && value > 0.,
                "punch {} must be positive, got {}",
                name,
                value
            );
        }
        for (name, value) in [
            ("travelPowerScale", self.travel_power_scale),
            ("speedBonus", self.speed_bonus),
            ("fistBonus", self.fist_bonus),
        ] {
            ensure!(
                value.is_finite() && value >= 0.,
                "punch {} must not be negative, got {}",
                name,
                value
            );
        }
        ensure!(
            (0. ..=1.).contains(&self.upper_region_y),
            "upperRegionY must be within [0,1], got {}",
            self.upper_region_y
        );
        ensure!(
            self.speed_bonus_low > 0. && self.speed_bonus_high >= self.speed_bonus_low,
            "speed bonus thresholds must satisfy 0 < low <= high, got {} / {}",
            self.speed_bonus_low,
            self.speed_bonus_high
        );
        ensure!(self.max_reach_ms > 0, "maxReachMs must be above 0");
        if let Some(filter) = &self.depth_filter {
            filter.validate()?;
        }
        Ok(())
    }
}

/// What the punch detector sees of one hand on one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PunchSample {
    /// Mirrored screen-space palm position
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    pub is_fist: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reach {
    pub start_time: f64,
    pub start_depth: f32,
    pub start_x: f32,
    pub start_y: f32,
    /// Closest depth reached so far (minimum z)
    pub peak_depth: f32,
    pub vertical_travel: f32,
    pub lateral_travel: f32,
    pub extended: bool,
}

impl Reach {
    pub fn travel_distance(&self) -> f32 {
        self.start_depth - self.peak_depth
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PunchPhase {
    #[default]
    Idle,
    Reaching(Reach),
}

#[derive(Debug, Clone, Copy)]
struct Previous {
    t: f64,
    x: f32,
    y: f32,
    /// Filtered when a depth filter is configured
    depth: f32,
    raw_depth: f32,
}

#[derive(Debug, Clone, Default)]
struct HandPunchState {
    phase: PunchPhase,
    previous: Option<Previous>,
    /// (t, raw depth) of the last sample that was not moving forward
    rest: Option<(f64, f32)>,
    cooldown_until: f64,
    depth_filter: Option<OneEuroFilter>,
}

impl HandPunchState {
    fn clear_tracking(&mut self) {
        if let PunchPhase::Reaching(_) = self.phase {
            debug!("reach abandoned, hand no longer tracked");
        }
        self.phase = PunchPhase::Idle;
        self.previous = None;
        self.rest = None;
        if let Some(f) = self.depth_filter.as_mut() {
            f.reset();
        }
    }
}

pub struct PunchDetector {
    settings: PunchSettings,
    hands: [HandPunchState; 2],
}

impl PunchDetector {
    pub fn new(settings: PunchSettings) -> Result<Self> {
        settings.validate()?;
        let hand_state = || -> Result<HandPunchState> {
            Ok(HandPunchState {
                depth_filter: settings.depth_filter.map(OneEuroFilter::new).transpose()?,
                ..Default::default()
            })
        };
        Ok(PunchDetector {
            settings,
            hands: [hand_state()?, hand_state()?],
        })
    }

    pub fn phase(&self, hand: Hand) -> &PunchPhase {
        &self.hands[hand.index()].phase
    }

    /// Advance one hand by one frame. `sample` is None when the hand is not
    /// visible; `blocked` (guard up, or the whole body shifting sideways)
    /// cancels any reach and blocks new ones.
    pub fn update(
        &mut self,
        hand: Hand,
        t: f64,
        sample: Option<PunchSample>,
        blocked: bool,
    ) -> Option<GestureEvent> {
        let settings = self.settings;
        let state = &mut self.hands[hand.index()];

        let Some(sample) = sample else {
            state.clear_tracking();
            return None;
        };

        let raw_depth = sample.depth;
        let depth = match state.depth_filter.as_mut() {
            Some(f) => f.filter(raw_depth as f64, t) as f32,
            None => raw_depth,
        };
        let current = Previous {
            t,
            x: sample.x,
            y: sample.y,
            depth,
            raw_depth,
        };

        if blocked {
            if let PunchPhase::Reaching(_) = state.phase {
                debug!("{:?}: reach cancelled (guard or body shift)", hand);
            }
            state.phase = PunchPhase::Idle;
            state.previous = Some(current);
            state.rest = Some((t, raw_depth));
            return None;
        }

        let Some(prev) = state.previous.replace(current) else {
            state.rest = Some((t, raw_depth));
            return None;
        };

        // Travel counts from where the hand last stood still, which may be a
        // frame or two before the filtered velocity crosses the threshold
        let reach_window = settings.max_reach_ms as f64 / 1000.;
        let start_depth = state
            .rest
            .filter(|(rest_t, _)| t - rest_t <= reach_window)
            .map_or(prev.raw_depth, |(_, d)| d.max(prev.raw_depth));
        if raw_depth >= prev.raw_depth {
            state.rest = Some((t, raw_depth));
        }

        let dt = (t - prev.t).max(MIN_DT) as f32;
        let forward_v = (prev.depth - depth) / dt;
        let up_v = (prev.y - sample.y) / dt;
        let lateral_v = (sample.x - prev.x) / dt;
        let in_upper_region = sample.y < settings.upper_region_y;

        if state.phase == PunchPhase::Idle {
            if t < state.cooldown_until {
                return None;
            }
            let starts = forward_v > settings.forward_velocity
                || (up_v > settings.uppercut_velocity && in_upper_region)
                || lateral_v.abs() > settings.hook_velocity;
            if !starts {
                return None;
            }
            debug!(
                "{:?}: reach started (forward {:.2}, up {:.2}, lateral {:.2})",
                hand, forward_v, up_v, lateral_v
            );
            // The motion began at the previous sample
            state.phase = PunchPhase::Reaching(Reach {
                start_time: prev.t,
                start_depth,
                start_x: prev.x,
                start_y: prev.y,
                peak_depth: prev.raw_depth,
                vertical_travel: 0.,
                lateral_travel: 0.,
                extended: false,
            });
        }

        let PunchPhase::Reaching(reach) = &mut state.phase else {
            return None;
        };

        reach.peak_depth = reach.peak_depth.min(raw_depth);
        reach.vertical_travel = reach.vertical_travel.max(reach.start_y - sample.y);
        reach.lateral_travel = reach.lateral_travel.max((sample.x - reach.start_x).abs());

        let elapsed = t - reach.start_time;
        let travel = reach.travel_distance();
        if !reach.extended
            && (travel >= settings.min_travel
                || reach.vertical_travel >= settings.uppercut_travel
                || reach.lateral_travel >= settings.hook_travel
                || elapsed >= settings.min_extend_ms as f64 / 1000.)
        {
            reach.extended = true;
        }

        let timed_out = elapsed >= reach_window;

        if !reach.extended {
            if timed_out {
                debug!("{:?}: reach timed out without extending", hand);
                state.phase = PunchPhase::Idle;
            }
            return None;
        }

        // Moving back toward where the reach started, along any axis that
        // has travelled far enough to matter
        let lateral_sign = (sample.x - reach.start_x).signum();
        let retreating = forward_v < 0.
            || (reach.lateral_travel >= settings.hook_travel && lateral_v * lateral_sign < 0.)
            || (reach.vertical_travel >= settings.uppercut_travel && up_v < 0.);

        if !(timed_out || retreating) {
            return None;
        }

        let reach = *reach;
        state.phase = PunchPhase::Idle;
        state.cooldown_until = t + settings.cooldown_ms as f64 / 1000.;

        let punch_type = if reach.vertical_travel >= settings.uppercut_travel
            && in_upper_region
            && reach.vertical_travel >= reach.lateral_travel
        {
            PunchType::Uppercut
        } else if reach.lateral_travel >= settings.hook_travel {
            PunchType::Hook
        } else if hand == settings.lead_hand {
            PunchType::Jab
        } else {
            PunchType::Cross
        };

        let travel_distance = match punch_type {
            PunchType::Uppercut => reach.vertical_travel,
            PunchType::Hook => reach.lateral_travel,
            PunchType::Jab | PunchType::Cross => reach.travel_distance(),
        };
        let power = punch_power(&settings, travel_distance, elapsed, sample.is_fist);

        debug!(
            "{:?}: {} (power {:.2}, travel {:.3}, {:.0}ms)",
            hand,
            punch_type.name(),
            power,
            travel_distance,
            elapsed * 1000.
        );

        Some(GestureEvent::Punch {
            hand,
            punch_type,
            power,
            x: sample.x,
            y: sample.y,
            travel_distance,
        })
    }

    pub fn reset(&mut self) {
        for state in self.hands.iter_mut() {
            state.clear_tracking();
            state.cooldown_until = 0.;
        }
    }
}

fn punch_power(settings: &PunchSettings, travel: f32, elapsed: f64, is_fist: bool) -> f32 {
    let speed = travel / elapsed.max(MIN_DT) as f32;
    let mut power = 1.0 + travel.max(0.) * settings.travel_power_scale;
    if speed > settings.speed_bonus_low {
        power += settings.speed_bonus;
    }
    if speed > settings.speed_bonus_high {
        power += settings.speed_bonus;
    }
    if is_fist {
        power += settings.fist_bonus;
    }
    power
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1. / 30.;

    fn sample(x: f32, y: f32, depth: f32) -> Option<PunchSample> {
        Some(PunchSample {
            x,
            y,
            depth,
            is_fist: false,
        })
    }

    fn detector() -> PunchDetector {
        PunchDetector::new(PunchSettings::default()).unwrap()
    }

    /// Depth drops 0.01 per frame for `frames` frames, then climbs back
    fn thrust(
        d: &mut PunchDetector,
        hand: Hand,
        start_frame: usize,
        frames: usize,
    ) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        let mut depth = 0.;
        for i in 0..(frames * 2 + 2) {
            if i > 0 && i <= frames {
                depth -= 0.01;
            } else if i > frames {
                depth = (depth + 0.01_f32).min(0.);
            }
            let t = (start_frame + i) as f64 * FRAME;
            events.extend(d.update(hand, t, sample(0.4, 0.5, depth), false));
        }
        events
    }

    #[test]
    fn test_straight_punch_from_lead_hand_is_jab() {
        let mut d = detector();
        let events = thrust(&mut d, Hand::Left, 0, 5);
        assert_eq!(events.len(), 1, "{:?}", events);
        match &events[0] {
            GestureEvent::Punch {
                punch_type,
                power,
                travel_distance,
                ..
            } => {
                assert_eq!(*punch_type, PunchType::Jab);
                assert!((travel_distance - 0.05).abs() < 1e-4);
                assert!(*power > 1.5);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(*d.phase(Hand::Left), PunchPhase::Idle);
    }

    #[test]
    fn test_depth_filter_keeps_full_travel() {
        let mut d = PunchDetector::new(PunchSettings {
            depth_filter: Some(FilterSettings::punch_depth()),
            ..Default::default()
        })
        .unwrap();
        let events = thrust(&mut d, Hand::Left, 0, 5);
        assert_eq!(events.len(), 1, "{:?}", events);
        match &events[0] {
            GestureEvent::Punch {
                punch_type,
                travel_distance,
                ..
            } => {
                assert_eq!(*punch_type, PunchType::Jab);
                assert!((travel_distance - 0.05).abs() < 1e-4, "travel {}", travel_distance);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_rear_hand_throws_cross() {
        let mut d = detector();
        let events = thrust(&mut d, Hand::Right, 0, 5);
        assert!(matches!(
            events[..],
            [GestureEvent::Punch {
                punch_type: PunchType::Cross,
                ..
            }]
        ));
    }

    #[test]
    fn test_cooldown_swallows_second_reach() {
        let mut d = PunchDetector::new(PunchSettings {
            cooldown_ms: 1000,
            ..Default::default()
        })
        .unwrap();
        let mut events = thrust(&mut d, Hand::Left, 0, 5);
        events.extend(thrust(&mut d, Hand::Left, 12, 5));
        assert_eq!(events.len(), 1);

        // once the cooldown has passed, the next reach counts again
        events.extend(thrust(&mut d, Hand::Left, 60, 5));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_reach_without_extension_is_discarded() {
        // extension fallback time beyond the reach window, travel never enough
        let mut d = PunchDetector::new(PunchSettings {
            min_extend_ms: 1000,
            min_travel: 0.2,
            ..Default::default()
        })
        .unwrap();
        let mut events = thrust(&mut d, Hand::Left, 0, 3);
        assert!(matches!(d.phase(Hand::Left), PunchPhase::Reaching(_)));
        for i in 8..20 {
            events.extend(d.update(Hand::Left, i as f64 * FRAME, sample(0.4, 0.5, 0.), false));
        }
        assert!(events.is_empty());
        assert_eq!(*d.phase(Hand::Left), PunchPhase::Idle);
    }

    #[test]
    fn test_slow_push_extends_by_time_and_completes_on_timeout() {
        let mut d = detector();
        let mut events = Vec::new();
        // one fast frame to start, then creeping forward
        let mut depth = 0.;
        for i in 0..20 {
            if i == 1 {
                depth -= 0.01;
            } else if i > 1 {
                depth -= 0.0005;
            }
            events.extend(d.update(Hand::Left, i as f64 * FRAME, sample(0.4, 0.5, depth), false));
        }
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_uppercut() {
        let mut d = detector();
        let mut events = Vec::new();
        let ys = [0.6, 0.55, 0.48, 0.42, 0.4, 0.42];
        for (i, y) in ys.iter().enumerate() {
            events.extend(d.update(Hand::Right, i as f64 * FRAME, sample(0.5, *y, 0.), false));
        }
        assert!(matches!(
            events[..],
            [GestureEvent::Punch {
                punch_type: PunchType::Uppercut,
                ..
            }]
        ));
    }

    #[test]
    fn test_hook() {
        let mut d = detector();
        let mut events = Vec::new();
        let xs = [0.3, 0.36, 0.43, 0.5, 0.52, 0.5];
        for (i, x) in xs.iter().enumerate() {
            events.extend(d.update(Hand::Left, i as f64 * FRAME, sample(*x, 0.5, 0.), false));
        }
        assert!(matches!(
            events[..],
            [GestureEvent::Punch {
                punch_type: PunchType::Hook,
                ..
            }]
        ));
    }

    #[test]
    fn test_guard_cancels_reach() {
        let mut d = detector();
        d.update(Hand::Left, 0., sample(0.4, 0.5, 0.), false);
        d.update(Hand::Left, FRAME, sample(0.4, 0.5, -0.02), false);
        assert!(matches!(d.phase(Hand::Left), PunchPhase::Reaching(_)));
        let mut events = Vec::new();
        for i in 2..10 {
            let depth = if i < 5 { -0.02 - 0.01 * i as f32 } else { -0.02 };
            events.extend(d.update(Hand::Left, i as f64 * FRAME, sample(0.4, 0.5, depth), true));
        }
        assert!(events.is_empty());
        assert_eq!(*d.phase(Hand::Left), PunchPhase::Idle);
    }

    #[test]
    fn test_lost_hand_drops_reach() {
        let mut d = detector();
        d.update(Hand::Left, 0., sample(0.4, 0.5, 0.), false);
        d.update(Hand::Left, FRAME, sample(0.4, 0.5, -0.02), false);
        assert!(d.update(Hand::Left, 2. * FRAME, None, false).is_none());
        assert_eq!(*d.phase(Hand::Left), PunchPhase::Idle);
        // first frame back only seeds the velocity estimate
        assert!(d.update(Hand::Left, 3. * FRAME, sample(0.4, 0.5, -0.2), false).is_none());
        assert_eq!(*d.phase(Hand::Left), PunchPhase::Idle);
    }

    #[test]
    fn test_power_bonuses() {
        let s = PunchSettings::default();
        let slow = punch_power(&s, 0.05, 1.0, false);
        let fast = punch_power(&s, 0.05, 0.05, false);
        let fist = punch_power(&s, 0.05, 0.05, true);
        assert!((slow - 1.5).abs() < 1e-5);
        assert!((fast - 2.5).abs() < 1e-5);
        assert!((fist - 2.8).abs() < 1e-5);
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = PunchDetector::new(PunchSettings {
            forward_velocity: -1.,
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_depth_filter_rejected() {
        let result = PunchDetector::new(PunchSettings {
            depth_filter: Some(FilterSettings::new(0., 0.3, 1.)),
            ..Default::default()
        });
        assert!(result.is_err());
        assert!(
            PunchDetector::new(PunchSettings {
                depth_filter: Some(FilterSettings::punch_depth()),
                ..Default::default()
            })
            .is_ok()
        );
    }
}
