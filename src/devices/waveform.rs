//! Time-varying waveforms for independent sources.
//!
//! A source without a waveform holds its DC value for all time. With a
//! waveform, the value at time `t` is `waveform.value_at(t)`; operating-point
//! and DC-sweep analyses evaluate it at `t = 0`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Trapezoidal pulse train.
///
/// ```text
///        ___________
///       /           \
/// _____/             \________
///  td   tr    pw    tf
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    /// Initial (low) value
    pub v1: f64,
    /// Pulsed (high) value
    pub v2: f64,
    /// Delay before the first edge
    #[serde(default)]
    pub delay: f64,
    /// Rise time
    #[serde(default)]
    pub rise: f64,
    /// Fall time
    #[serde(default)]
    pub fall: f64,
    /// Pulse width at `v2`
    pub width: f64,
    /// Period, 0 for a single pulse
    #[serde(default)]
    pub period: f64,
}

impl Pulse {
    pub fn value_at(&self, t: f64) -> f64 {
        if t < self.delay {
            return self.v1;
        }

        let t_rel = if self.period > 0.0 {
            (t - self.delay) % self.period
        } else {
            t - self.delay
        };

        if t_rel < self.rise {
            return self.v1 + (self.v2 - self.v1) * t_rel / self.rise;
        }
        if t_rel < self.rise + self.width {
            return self.v2;
        }
        if t_rel < self.rise + self.width + self.fall {
            let t_fall = t_rel - self.rise - self.width;
            return self.v2 - (self.v2 - self.v1) * t_fall / self.fall;
        }
        self.v1
    }
}

/// Damped sinusoid: `offset + amplitude·sin(2π·f·(t−td))·e^(−θ·(t−td))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sine {
    pub offset: f64,
    pub amplitude: f64,
    /// Frequency in Hz
    pub frequency: f64,
    #[serde(default)]
    pub delay: f64,
    /// Damping factor in 1/s
    #[serde(default)]
    pub damping: f64,
}

impl Sine {
    pub fn value_at(&self, t: f64) -> f64 {
        if t < self.delay {
            return self.offset;
        }
        let t_rel = t - self.delay;
        let envelope = if self.damping > 0.0 {
            (-self.damping * t_rel).exp()
        } else {
            1.0
        };
        self.offset + self.amplitude * (2.0 * PI * self.frequency * t_rel).sin() * envelope
    }
}

/// Piecewise-linear waveform through `(time, value)` corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pwl {
    pub points: Vec<(f64, f64)>,
}

impl Pwl {
    pub fn value_at(&self, t: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        for pair in self.points.windows(2) {
            let (t0, v0) = pair[0];
            let (t1, v1) = pair[1];
            if t >= t0 && t < t1 {
                return v0 + (v1 - v0) * (t - t0) / (t1 - t0);
            }
        }
        last.1
    }
}

/// A source waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Waveform {
    Pulse(Pulse),
    Sin(Sine),
    Pwl(Pwl),
}

impl Waveform {
    /// Evaluate the waveform at time `t` (seconds).
    pub fn value_at(&self, t: f64) -> f64 {
        match self {
            Waveform::Pulse(p) => p.value_at(t),
            Waveform::Sin(s) => s.value_at(t),
            Waveform::Pwl(p) => p.value_at(t),
        }
    }

    /// Check the waveform's parameters, returning the offending parameter name.
    pub fn validate(&self) -> std::result::Result<(), (&'static str, String)> {
        match self {
            Waveform::Pulse(p) => {
                for (name, value) in [
                    ("delay", p.delay),
                    ("rise", p.rise),
                    ("fall", p.fall),
                    ("width", p.width),
                    ("period", p.period),
                ] {
                    if !(value >= 0.0) {
                        return Err((name, format!("must be non-negative, got {value}")));
                    }
                }
                Ok(())
            }
            Waveform::Sin(s) => {
                if !(s.frequency >= 0.0) {
                    return Err(("frequency", format!("must be non-negative, got {}", s.frequency)));
                }
                Ok(())
            }
            Waveform::Pwl(p) => {
                if p.points.windows(2).any(|w| w[1].0 < w[0].0) {
                    return Err(("points", "times must be non-decreasing".to_string()));
                }
                Ok(())
            }
        }
    }
}
