use super::config::AdvisoryConfig;
use super::{AdviceItem, AdviceTopic, Sentiment};
use crate::scoring::applicant::ApplicantRecord;

type Rule = fn(&ApplicantRecord, &AdvisoryConfig) -> AdviceItem;

/// Presentation order. Each rule yields exactly one item and reads only the record.
pub(crate) const RULES: [Rule; 5] = [
    repayment_capacity,
    loan_to_income,
    credit_history,
    default_history,
    credit_grade,
];

fn pick(topic: AdviceTopic, positive: bool, praise: &str, caution: &str) -> AdviceItem {
    let (sentiment, message) = if positive {
        (Sentiment::Positive, praise)
    } else {
        (Sentiment::Negative, caution)
    };
    AdviceItem {
        topic,
        sentiment,
        message: message.to_string(),
    }
}

fn repayment_capacity(record: &ApplicantRecord, config: &AdvisoryConfig) -> AdviceItem {
    pick(
        AdviceTopic::RepaymentCapacity,
        record.annual_income() > config.strong_income_threshold,
        "Your higher income indicates strong repayment ability.",
        "Consider increasing income or reducing expenses to strengthen repayment capacity.",
    )
}

fn loan_to_income(record: &ApplicantRecord, config: &AdvisoryConfig) -> AdviceItem {
    let limit = config.max_loan_to_income_ratio * record.annual_income() as f64;
    pick(
        AdviceTopic::LoanToIncome,
        record.loan_amount() as f64 <= limit,
        "Your loan amount seems reasonable compared to your income level.",
        "Your requested loan is high relative to income; consider borrowing less or preparing a solid repayment plan.",
    )
}

fn credit_history(record: &ApplicantRecord, config: &AdvisoryConfig) -> AdviceItem {
    pick(
        AdviceTopic::CreditHistory,
        record.credit_history_length() >= config.min_credit_history_years,
        "Your credit history length supports your credibility as a borrower.",
        "A longer credit history would improve future approvals.",
    )
}

fn default_history(record: &ApplicantRecord, _config: &AdvisoryConfig) -> AdviceItem {
    pick(
        AdviceTopic::DefaultHistory,
        !record.prior_default(),
        "No previous defaults; this is a positive sign for approval.",
        "Previous defaults raise concerns; maintaining timely payments will help rebuild trust.",
    )
}

fn credit_grade(record: &ApplicantRecord, config: &AdvisoryConfig) -> AdviceItem {
    pick(
        AdviceTopic::CreditGrade,
        config.strong_grades.contains(&record.loan_grade()),
        "Your good credit grade strengthens your profile.",
        "Improving your credit grade would reduce risk and improve approval chances.",
    )
}
