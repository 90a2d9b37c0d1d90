//! Analysis requests.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Slack used when counting grid points, so `stop/step` landing a rounding
/// error below an integer still includes the last point.
const GRID_EPSILON: f64 = 1e-9;

/// Largest number of grid intervals a sweep or transient may request.
pub const MAX_GRID_POINTS: usize = u32::MAX as usize;

/// `floor(span / step)` with the rounding slack, or `None` when the grid is
/// too fine to count.
fn grid_intervals(span: f64, step: f64) -> Option<usize> {
    let n = (span / step + GRID_EPSILON).floor();
    (n.is_finite() && n <= MAX_GRID_POINTS as f64).then_some(n as usize)
}

/// Which analysis to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisConfig {
    /// DC operating point
    Op,
    /// Fixed-step transient analysis
    Tran(TranConfig),
    /// DC sweep of one independent source
    DcSweep(DcSweepConfig),
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig::Op
    }
}

/// Transient parameters: `.tran step stop [start]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranConfig {
    /// Timestep (s)
    pub step: f64,
    /// Stop time (s)
    pub stop: f64,
    /// First time at which points are recorded (s)
    #[serde(default)]
    pub start: Option<f64>,
}

impl TranConfig {
    pub fn new(step: f64, stop: f64) -> Self {
        Self {
            step,
            stop,
            start: None,
        }
    }

    /// Only record points at or after `start`.
    pub fn with_start(mut self, start: f64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn start_time(&self) -> f64 {
        self.start.unwrap_or(0.0)
    }

    /// Number of steps after t = 0.
    pub fn step_count(&self) -> usize {
        grid_intervals(self.stop, self.step).unwrap_or(MAX_GRID_POINTS)
    }

    /// Time of step `k` (k = 0 is the operating point).
    pub fn time_at(&self, k: usize) -> f64 {
        k as f64 * self.step
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(SimError::invalid_analysis(format!(
                "transient step must be positive, got {}",
                self.step
            )));
        }
        if !(self.stop > 0.0) || !self.stop.is_finite() {
            return Err(SimError::invalid_analysis(format!(
                "transient stop time must be positive, got {}",
                self.stop
            )));
        }
        let start = self.start_time();
        if !(start >= 0.0) || start > self.stop {
            return Err(SimError::invalid_analysis(format!(
                "transient start time {} must lie in [0, {}]",
                start, self.stop
            )));
        }
        if grid_intervals(self.stop, self.step).is_none() {
            return Err(SimError::invalid_analysis(format!(
                "transient step {} over {} s exceeds {} points",
                self.step, self.stop, MAX_GRID_POINTS
            )));
        }
        Ok(())
    }
}

/// DC sweep parameters: `.dc source start stop step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcSweepConfig {
    /// Name of the swept independent voltage or current source
    pub source: String,
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl DcSweepConfig {
    pub fn new(source: impl Into<String>, start: f64, stop: f64, step: f64) -> Self {
        Self {
            source: source.into(),
            start,
            stop,
            step,
        }
    }

    /// `floor((stop - start) / step) + 1`
    pub fn point_count(&self) -> usize {
        grid_intervals(self.stop - self.start, self.step)
            .unwrap_or(MAX_GRID_POINTS)
            .saturating_add(1)
    }

    /// Source value at sweep point `i`.
    pub fn value_at(&self, i: usize) -> f64 {
        self.start + i as f64 * self.step
    }

    pub fn validate(&self) -> Result<()> {
        if !self.start.is_finite() || !self.stop.is_finite() {
            return Err(SimError::invalid_analysis("sweep bounds must be finite"));
        }
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(SimError::invalid_analysis(format!(
                "sweep step must be positive, got {}",
                self.step
            )));
        }
        if self.stop < self.start {
            return Err(SimError::invalid_analysis(format!(
                "sweep stop {} is below start {}",
                self.stop, self.start
            )));
        }
        if grid_intervals(self.stop - self.start, self.step).is_none() {
            return Err(SimError::invalid_analysis(format!(
                "sweep of {} from {} to {} in steps of {} exceeds {} points",
                self.source, self.start, self.stop, self.step, MAX_GRID_POINTS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tran_step_count() {
        let tran = TranConfig::new(1e-5, 1e-3);
        assert_eq!(tran.step_count(), 100);
        assert!(tran.validate().is_ok());

        let tran = TranConfig::new(3e-6, 1e-5);
        assert_eq!(tran.step_count(), 3);
    }

    #[test]
    fn test_tran_validation() {
        assert!(TranConfig::new(0.0, 1e-3).validate().is_err());
        assert!(TranConfig::new(1e-6, 0.0).validate().is_err());
        assert!(TranConfig::new(1e-6, 1e-3).with_start(2e-3).validate().is_err());
        assert!(TranConfig::new(1e-6, 1e-3).with_start(-1.0).validate().is_err());
        assert!(TranConfig::new(1e-6, 1e-3).with_start(5e-4).validate().is_ok());
    }

    #[test]
    fn test_sweep_points() {
        let sweep = DcSweepConfig::new("V1", 0.0, 1.8, 0.1);
        assert_eq!(sweep.point_count(), 19);
        assert!((sweep.value_at(18) - 1.8).abs() < 1e-12);

        let single = DcSweepConfig::new("V1", 1.0, 1.0, 0.5);
        assert_eq!(single.point_count(), 1);
        assert!(single.validate().is_ok());
    }

    #[test]
    fn test_sweep_validation() {
        assert!(DcSweepConfig::new("V1", 0.0, 1.0, 0.0).validate().is_err());
        assert!(DcSweepConfig::new("V1", 1.0, 0.0, 0.1).validate().is_err());
        assert!(DcSweepConfig::new("V1", 0.0, f64::NAN, 0.1).validate().is_err());
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let sweep = DcSweepConfig::new("V1", 0.0, 1e20, 1.0);
        assert!(matches!(sweep.validate(), Err(SimError::InvalidAnalysis { .. })));
        assert_eq!(sweep.point_count(), MAX_GRID_POINTS + 1);

        let sweep = DcSweepConfig::new("V1", -f64::MAX, f64::MAX, 1.0);
        assert!(sweep.validate().is_err());

        let tran = TranConfig::new(1e-30, 1.0);
        assert!(matches!(tran.validate(), Err(SimError::InvalidAnalysis { .. })));
        assert_eq!(tran.step_count(), MAX_GRID_POINTS);
    }

    #[test]
    fn test_config_serde_tags() {
        let json = serde_json::to_string(&AnalysisConfig::Op).unwrap();
        assert_eq!(json, r#"{"type":"op"}"#);

        let parsed: AnalysisConfig =
            serde_json::from_str(r#"{"type":"tran","step":1e-6,"stop":1e-3}"#).unwrap();
        assert_eq!(parsed, AnalysisConfig::Tran(TranConfig::new(1e-6, 1e-3)));

        let parsed: AnalysisConfig = serde_json::from_str(
            r#"{"type":"dc_sweep","source":"V1","start":0,"stop":1,"step":0.5}"#,
        )
        .unwrap();
        assert_eq!(parsed, AnalysisConfig::DcSweep(DcSweepConfig::new("V1", 0.0, 1.0, 0.5)));
    }
}
