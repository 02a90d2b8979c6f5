//! Adaptive low-pass ("One Euro") filter. Smooth when the signal is still,
//! responsive when it moves fast.

use std::f64::consts::PI;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::Point2D;

/// Smallest time step used by the filter; duplicate or out-of-order
/// timestamps are clamped to this instead of dividing by zero.
pub const MIN_DT: f64 = 1e-6;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    /// Minimum cutoff frequency (Hz); lower is smoother at rest
    pub min_cutoff: f64,
    /// Speed coefficient; higher means less lag during fast motion
    pub beta: f64,
    /// Cutoff (Hz) used to smooth the derivative estimate
    pub d_cutoff: f64,
}

impl FilterSettings {
    pub fn new(min_cutoff: f64, beta: f64, d_cutoff: f64) -> Self {
        FilterSettings {
            min_cutoff,
            beta,
            d_cutoff,
        }
    }

    /// UI cursors: steady at rest, a little lag is acceptable
    pub fn cursor() -> Self {
        Self::new(1.0, 0.007, 1.0)
    }

    /// Fast slicing/swiping motions where lag is more visible than jitter
    pub fn fast_motion() -> Self {
        Self::new(1.5, 0.05, 1.0)
    }

    /// 3D manipulation (particle sandbox); heavier smoothing
    pub fn manipulation() -> Self {
        Self::new(0.5, 0.01, 1.0)
    }

    /// Depth signal used for punch detection. Light smoothing only: the
    /// velocity gates must still see a thrust within a couple of frames.
    pub fn punch_depth() -> Self {
        Self::new(8.0, 0.5, 1.0)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_cutoff.is_finite() && self.min_cutoff > 0.,
            "filter minCutoff must be a positive frequency, got {}",
            self.min_cutoff
        );
        ensure!(
            self.beta.is_finite() && self.beta >= 0.,
            "filter beta must be zero or positive, got {}",
            self.beta
        );
        ensure!(
            self.d_cutoff.is_finite() && self.d_cutoff > 0.,
            "filter dCutoff must be a positive frequency, got {}",
            self.d_cutoff
        );
        Ok(())
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self::cursor()
    }
}

#[derive(Debug, Clone, Copy)]
struct FilterState {
    x_prev: f64,
    dx_prev: f64,
    t_prev: f64,
}

/// Filters one scalar signal. Use one instance per axis, per hand.
#[derive(Debug, Clone)]
pub struct OneEuroFilter {
    settings: FilterSettings,
    state: Option<FilterState>,
}

impl OneEuroFilter {
    pub fn new(settings: FilterSettings) -> Result<Self> {
        settings.validate()?;
        Ok(OneEuroFilter {
            settings,
            state: None,
        })
    }

    fn smoothing_factor(dt: f64, cutoff: f64) -> f64 {
        let r = 2.0 * PI * cutoff * dt;
        r / (r + 1.0)
    }

    /// Filter `x` sampled at `t` (seconds). The first sample after
    /// construction or `reset()` is returned unchanged.
    pub fn filter(&mut self, x: f64, t: f64) -> f64 {
        let Some(prev) = self.state else {
            self.state = Some(FilterState {
                x_prev: x,
                dx_prev: 0.,
                t_prev: t,
            });
            return x;
        };

        let dt = (t - prev.t_prev).max(MIN_DT);

        let a_d = Self::smoothing_factor(dt, self.settings.d_cutoff);
        let dx = (x - prev.x_prev) / dt;
        let dx_hat = a_d * dx + (1.0 - a_d) * prev.dx_prev;

        let cutoff = self.settings.min_cutoff + self.settings.beta * dx_hat.abs();
        let a = Self::smoothing_factor(dt, cutoff);
        let x_hat = a * x + (1.0 - a) * prev.x_prev;

        self.state = Some(FilterState {
            x_prev: x_hat,
            dx_prev: dx_hat,
            t_prev: t,
        });

        x_hat
    }

    /// Forget all history; call whenever the signal becomes unavailable
    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }
}

/// Pair of filters for a 2D position
#[derive(Debug, Clone)]
pub struct OneEuroFilter2D {
    pub x: OneEuroFilter,
    pub y: OneEuroFilter,
}

impl OneEuroFilter2D {
    pub fn new(settings: FilterSettings) -> Result<Self> {
        Ok(OneEuroFilter2D {
            x: OneEuroFilter::new(settings)?,
            y: OneEuroFilter::new(settings)?,
        })
    }

    pub fn filter(&mut self, pos: Point2D, t: f64) -> Point2D {
        (
            self.x.filter(pos.0 as f64, t) as f32,
            self.y.filter(pos.1 as f64, t) as f32,
        )
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
