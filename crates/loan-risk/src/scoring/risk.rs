use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),
    #[error("thresholds must satisfy 0 < medium ({medium}) < high ({high}) < 1")]
    InvalidThresholds { medium: f64, high: f64 },
}

/// Discrete risk band derived from the default probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub const fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Medium => "Medium Risk",
            RiskBand::High => "High Risk",
        }
    }

    /// Display colour used by the gauge and banner.
    pub const fn color(self) -> &'static str {
        match self {
            RiskBand::Low => "green",
            RiskBand::Medium => "yellow",
            RiskBand::High => "red",
        }
    }

    fn context_tail(self) -> &'static str {
        match self {
            RiskBand::Low => "you're in a very safe range.",
            RiskBand::Medium => "generally safe, but review terms carefully.",
            RiskBand::High => "proceed with caution.",
        }
    }
}

/// Band boundaries. `medium` and `high` are the lowest probabilities placed in those bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskThresholds {
    medium: f64,
    high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.05,
            high: 0.10,
        }
    }
}

impl RiskThresholds {
    pub fn new(medium: f64, high: f64) -> Result<Self, RiskError> {
        let ordered = 0.0 < medium && medium < high && high < 1.0;
        if !ordered {
            return Err(RiskError::InvalidThresholds { medium, high });
        }
        Ok(Self { medium, high })
    }

    pub fn medium(&self) -> f64 {
        self.medium
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Gauge segments as percentage ranges, one per band in ascending order.
    pub fn gauge_steps(&self) -> [(RiskBand, f64, f64); 3] {
        [
            (RiskBand::Low, 0.0, self.medium * 100.0),
            (RiskBand::Medium, self.medium * 100.0, self.high * 100.0),
            (RiskBand::High, self.high * 100.0, 100.0),
        ]
    }
}

/// Places a probability in its band. Boundaries belong to the higher band.
pub fn classify(probability: f64, thresholds: &RiskThresholds) -> Result<RiskBand, RiskError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(RiskError::ProbabilityOutOfRange(probability));
    }

    let band = if probability < thresholds.medium {
        RiskBand::Low
    } else if probability < thresholds.high {
        RiskBand::Medium
    } else {
        RiskBand::High
    };

    Ok(band)
}

/// One-line summary such as "Your profile risk is higher than 6% of applicants; ...".
/// The percentage is truncated, not rounded.
pub fn context_message(probability: f64, band: RiskBand) -> String {
    let percent = (probability * 100.0).trunc() as u32;
    format!(
        "Your profile risk is higher than {}% of applicants; {}",
        percent,
        band.context_tail()
    )
}
