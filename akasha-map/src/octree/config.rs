//! Sensor model parameters for log-odds occupancy updates.

use serde::{Deserialize, Serialize};

/// Convert a probability to log-odds.
#[inline]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Convert log-odds back to a probability.
#[inline]
pub fn probability(log_odds: f64) -> f64 {
    1.0 - 1.0 / (1.0 + log_odds.exp())
}

/// Inverse sensor model.
///
/// Probabilities are stored as configured; the log-odds forms used by the
/// update rule are derived on demand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorModel {
    /// Probability that a voxel containing an endpoint is occupied
    #[serde(default = "default_prob_hit")]
    pub prob_hit: f64,

    /// Probability that a voxel traversed by a ray is occupied
    #[serde(default = "default_prob_miss")]
    pub prob_miss: f64,

    /// Lower saturation bound (probability)
    #[serde(default = "default_clamp_min")]
    pub clamp_min: f64,

    /// Upper saturation bound (probability)
    #[serde(default = "default_clamp_max")]
    pub clamp_max: f64,
}

fn default_prob_hit() -> f64 {
    0.7
}

fn default_prob_miss() -> f64 {
    0.4
}

fn default_clamp_min() -> f64 {
    0.12
}

fn default_clamp_max() -> f64 {
    0.97
}

impl Default for SensorModel {
    fn default() -> Self {
        Self {
            prob_hit: default_prob_hit(),   // +0.85 log-odds
            prob_miss: default_prob_miss(), // -0.41 log-odds
            clamp_min: default_clamp_min(), // -1.99 log-odds
            clamp_max: default_clamp_max(), // +3.48 log-odds
        }
    }
}

impl SensorModel {
    /// Log-odds increment for a hit.
    #[inline]
    pub fn hit_log_odds(&self) -> f64 {
        logit(self.prob_hit)
    }

    /// Log-odds increment for a miss (negative for `prob_miss < 0.5`).
    #[inline]
    pub fn miss_log_odds(&self) -> f64 {
        logit(self.prob_miss)
    }

    /// Lower clamp in log-odds.
    #[inline]
    pub fn clamp_min_log_odds(&self) -> f64 {
        logit(self.clamp_min)
    }

    /// Upper clamp in log-odds.
    #[inline]
    pub fn clamp_max_log_odds(&self) -> f64 {
        logit(self.clamp_max)
    }

    /// Apply one observation to a log-odds value and saturate.
    #[inline]
    pub fn integrate(&self, log_odds: f64, occupied: bool) -> f64 {
        let delta = if occupied {
            self.hit_log_odds()
        } else {
            self.miss_log_odds()
        };
        (log_odds + delta).clamp(self.clamp_min_log_odds(), self.clamp_max_log_odds())
    }

    /// Check that every probability is in `(0, 1)` and the clamps are ordered.
    pub fn is_valid(&self) -> bool {
        let open = |p: f64| p > 0.0 && p < 1.0;
        open(self.prob_hit)
            && open(self.prob_miss)
            && open(self.clamp_min)
            && open(self.clamp_max)
            && self.clamp_min < self.clamp_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_logit_inverse() {
        for &p in &[0.12, 0.4, 0.5, 0.7, 0.97] {
            assert_relative_eq!(probability(logit(p)), p, epsilon = 1e-12);
        }
        assert_relative_eq!(logit(0.5), 0.0);
    }

    #[test]
    fn test_integrate_saturates() {
        let model = SensorModel::default();
        let mut v = 0.0;
        for _ in 0..50 {
            v = model.integrate(v, true);
        }
        assert_relative_eq!(v, model.clamp_max_log_odds());
        for _ in 0..50 {
            v = model.integrate(v, false);
        }
        assert_relative_eq!(v, model.clamp_min_log_odds());
    }

    #[test]
    fn test_validity() {
        assert!(SensorModel::default().is_valid());
        let bad = SensorModel {
            clamp_min: 0.9,
            clamp_max: 0.1,
            ..SensorModel::default()
        };
        assert!(!bad.is_valid());
    }
}
