use anyhow::{Result, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    Point2D,
    events::{DodgeDirection, GestureEvent},
    geometry_utils::{centroid, lerp},
    systems::smoothing::MIN_DT,
};

const SCREEN_CENTER: f32 = 0.5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DodgeSettings {
    /// Deviation of the hands' average x from screen centre that counts as a dodge
    pub threshold: f32,
    pub cooldown_ms: u64,
    /// Weight of the newest sample in the running centre of mass
    pub center_smoothing: f32,
    /// Lateral speed (screen widths/s) each hand needs for a shared sideways
    /// move of both hands to count as a body shift rather than two hooks
    pub shift_velocity: f32,
    /// Slower hand's lateral speed over the faster one's; at or above this
    /// the two hands are moving together
    pub shift_similarity: f32,
}

impl Default for DodgeSettings {
    fn default() -> Self {
        DodgeSettings {
            threshold: 0.15,
            cooldown_ms: 500,
            center_smoothing: 0.05,
            shift_velocity: 0.6,
            shift_similarity: 0.5,
        }
    }
}

impl DodgeSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.threshold > 0. && self.threshold < 0.5,
            "dodge threshold must be within (0, 0.5), got {}",
            self.threshold
        );
        ensure!(
            self.center_smoothing > 0. && self.center_smoothing <= 1.,
            "dodge centerSmoothing must be within (0,1], got {}",
            self.center_smoothing
        );
        ensure!(
            self.shift_velocity > 0.,
            "dodge shiftVelocity must be positive, got {}",
            self.shift_velocity
        );
        ensure!(
            self.shift_similarity > 0. && self.shift_similarity <= 1.,
            "dodge shiftSimilarity must be within (0,1], got {}",
            self.shift_similarity
        );
        Ok(())
    }
}

/// Lateral body shift, measured from the mean x of the visible hands.
///
/// A shift that starts while the cooldown is running becomes the current
/// direction without firing, so it cannot fire late once the cooldown ends.
pub struct DodgeDetector {
    settings: DodgeSettings,
    smoothed_center: f32,
    direction: Option<DodgeDirection>,
    last_fired: Option<f64>,
}

impl DodgeDetector {
    pub fn new(settings: DodgeSettings) -> Result<Self> {
        settings.validate()?;
        Ok(DodgeDetector {
            settings,
            smoothed_center: SCREEN_CENTER,
            direction: None,
            last_fired: None,
        })
    }

    pub fn direction(&self) -> Option<DodgeDirection> {
        self.direction
    }

    /// Exponentially smoothed centre of mass of the hands
    pub fn smoothed_center(&self) -> f32 {
        self.smoothed_center
    }

    /// True when both hands moved sideways in the same direction at similar
    /// speed over the last `dt` seconds: the whole body is leaning.
    pub fn is_body_shift(&self, left_dx: f32, right_dx: f32, dt: f64) -> bool {
        let dt = dt.max(MIN_DT) as f32;
        let (vl, vr) = (left_dx / dt, right_dx / dt);
        let (slow, fast) = if vl.abs() < vr.abs() {
            (vl.abs(), vr.abs())
        } else {
            (vr.abs(), vl.abs())
        };
        vl.signum() == vr.signum()
            && slow >= self.settings.shift_velocity
            && slow / fast >= self.settings.shift_similarity
    }

    /// `hands` are mirrored screen-space palm positions of the visible hands
    pub fn update(&mut self, t: f64, hands: &[Point2D]) -> Option<GestureEvent> {
        let Some((average, _)) = centroid(hands) else {
            self.direction = None;
            return None;
        };
        self.smoothed_center = lerp(self.smoothed_center, average, self.settings.center_smoothing);

        let offset = average - SCREEN_CENTER;
        let shifted = if offset > self.settings.threshold {
            Some(DodgeDirection::Right)
        } else if offset < -self.settings.threshold {
            Some(DodgeDirection::Left)
        } else {
            None
        };

        let Some(direction) = shifted else {
            self.direction = None;
            return None;
        };
        if self.direction == Some(direction) {
            return None;
        }
        self.direction = Some(direction);

        let cooldown = self.settings.cooldown_ms as f64 / 1000.;
        if self.last_fired.is_some_and(|last| t - last < cooldown) {
            debug!("Dodge {:?} suppressed by cooldown", direction);
            return None;
        }
        self.last_fired = Some(t);
        debug!("Dodge {:?}", direction);
        Some(GestureEvent::Dodge { direction })
    }

    pub fn reset(&mut self) {
        self.smoothed_center = SCREEN_CENTER;
        self.direction = None;
        self.last_fired = None;
    }
}
