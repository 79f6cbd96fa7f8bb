use serde::{Deserialize, Serialize};

use crate::scoring::applicant::LoanGrade;

/// Thresholds consulted by the advisory rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Income strictly above this reads as strong repayment capacity.
    pub strong_income_threshold: u64,
    /// A loan above this share of annual income is flagged.
    pub max_loan_to_income_ratio: f64,
    /// Credit history shorter than this many years is flagged.
    pub min_credit_history_years: u32,
    pub strong_grades: Vec<LoanGrade>,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            strong_income_threshold: 400_000,
            max_loan_to_income_ratio: 0.5,
            min_credit_history_years: 2,
            strong_grades: vec![LoanGrade::A, LoanGrade::B],
        }
    }
}
