//! Fixed heuristics turning a record and its risk band into advice text.

mod conclusion;
mod config;
mod rules;

pub use config::AdvisoryConfig;

use serde::{Deserialize, Serialize};

use super::applicant::ApplicantRecord;
use super::risk::RiskBand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceTopic {
    RepaymentCapacity,
    LoanToIncome,
    CreditHistory,
    DefaultHistory,
    CreditGrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceItem {
    pub topic: AdviceTopic,
    pub sentiment: Sentiment,
    pub message: String,
}

/// Advice in rule order followed by the band's conclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub items: Vec<AdviceItem>,
    pub conclusion: String,
}

/// Stateless engine applying the configured thresholds.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryEngine {
    config: AdvisoryConfig,
}

impl AdvisoryEngine {
    pub fn new(config: AdvisoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdvisoryConfig {
        &self.config
    }

    pub fn advise(&self, record: &ApplicantRecord, band: RiskBand) -> Advisory {
        let items = rules::RULES
            .iter()
            .map(|rule| rule(record, &self.config))
            .collect();

        Advisory {
            items,
            conclusion: conclusion::conclusion_for(band).to_string(),
        }
    }
}
