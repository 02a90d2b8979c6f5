use anyhow::{Result, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Point2D, events::GestureEvent, geometry_utils::distance_points};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardSettings {
    /// Both hands must be above this y (0 = top of screen)
    pub max_y: f32,
    /// Max horizontal distance of each hand from screen centre
    pub center_band: f32,
    /// Max distance between the two hands
    pub max_separation: f32,
    /// While guarding, every bound is loosened by this much before the
    /// guard drops
    pub release_margin: f32,
}

impl Default for GuardSettings {
    fn default() -> Self {
        GuardSettings {
            max_y: 0.45,
            center_band: 0.25,
            max_separation: 0.35,
            release_margin: 0.03,
        }
    }
}

impl GuardSettings {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_y > 0. && self.max_y <= 1.,
            "guard maxY must be within (0,1], got {}",
            self.max_y
        );
        ensure!(
            self.center_band > 0.,
            "guard centerBand must be positive, got {}",
            self.center_band
        );
        ensure!(
            self.max_separation > 0.,
            "guard maxSeparation must be positive, got {}",
            self.max_separation
        );
        ensure!(
            self.release_margin >= 0.,
            "guard releaseMargin must not be negative, got {}",
            self.release_margin
        );
        Ok(())
    }
}

/// Two-hand guard pose. Only reports changes.
pub struct GuardDetector {
    settings: GuardSettings,
    guarding: bool,
}

impl GuardDetector {
    pub fn new(settings: GuardSettings) -> Result<Self> {
        settings.validate()?;
        Ok(GuardDetector {
            settings,
            guarding: false,
        })
    }

    pub fn is_guarding(&self) -> bool {
        self.guarding
    }

    fn holds(&self, left: Point2D, right: Point2D) -> bool {
        let margin = if self.guarding {
            self.settings.release_margin
        } else {
            0.
        };
        let max_y = self.settings.max_y + margin;
        let band = self.settings.center_band + margin;
        [left, right]
            .iter()
            .all(|(x, y)| *y < max_y && (x - 0.5).abs() < band)
            && distance_points(&left, &right) < self.settings.max_separation + margin
    }

    /// Positions are mirrored screen-space palm centres; None when not visible
    pub fn update(&mut self, left: Option<Point2D>, right: Option<Point2D>) -> Option<GestureEvent> {
        let now_guarding = match (left, right) {
            (Some(l), Some(r)) => self.holds(l, r),
            _ => false,
        };
        if now_guarding != self.guarding {
            debug!("Guard changed: {}", now_guarding);
            self.guarding = now_guarding;
            Some(GestureEvent::GuardChange {
                is_guarding: now_guarding,
            })
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.guarding = false;
    }
}
