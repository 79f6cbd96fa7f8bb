use crate::scoring::risk::RiskBand;

pub(crate) fn conclusion_for(band: RiskBand) -> &'static str {
    match band {
        RiskBand::High => {
            "Overall, your profile suggests higher risk. Reducing the loan size or improving income/credit habits could increase approval chances."
        }
        RiskBand::Medium => {
            "Overall, your profile suggests moderate risk. Proceed cautiously and review repayment terms carefully."
        }
        RiskBand::Low => {
            "Overall, your profile suggests low risk. You're likely to manage this loan comfortably."
        }
    }
}
