//! Loan default risk scoring with additive explanations and rule-based advice.

pub mod config;
pub mod error;
pub mod scoring;
pub mod telemetry;
