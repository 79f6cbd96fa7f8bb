use serde::{Deserialize, Serialize};

/// Schema names for the numeric applicant attributes.
pub mod feature_names {
    pub const AGE: &str = "person_age";
    pub const INCOME: &str = "person_income";
    pub const LOAN_AMOUNT: &str = "loan_amnt";
    pub const LOAN_PERCENT_INCOME: &str = "loan_percent_income";
    pub const CREDIT_HISTORY_LENGTH: &str = "cb_person_cred_hist_length";
}

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 100;

/// Raised when a categorical attribute carries a value outside its declared set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value '{value}' for categorical field {field}")]
pub struct UnknownCategoryValue {
    pub field: String,
    pub value: String,
}

/// Rejections raised while turning raw input into an [`ApplicantRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplicantError {
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategoryValue),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A closed set of category codes, expanded into indicator features by the encoder.
pub trait Categorical: Copy + Sized + 'static {
    /// Prefix shared by the indicator features of this attribute.
    const FIELD: &'static str;
    const ALL: &'static [Self];

    /// Code used in training data and indicator names.
    fn code(self) -> &'static str;

    fn alias(_normalized: &str) -> Option<Self> {
        None
    }

    fn parse(raw: &str) -> Result<Self, UnknownCategoryValue> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.code() == normalized)
            .or_else(|| Self::alias(&normalized))
            .ok_or_else(|| UnknownCategoryValue {
                field: Self::FIELD.to_string(),
                value: raw.to_string(),
            })
    }

    fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|value| value.code()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HomeOwnership {
    Rent,
    Mortgage,
    Own,
}

impl Categorical for HomeOwnership {
    const FIELD: &'static str = "person_home_ownership";
    const ALL: &'static [Self] = &[Self::Rent, Self::Mortgage, Self::Own];

    fn code(self) -> &'static str {
        match self {
            HomeOwnership::Rent => "RENT",
            HomeOwnership::Mortgage => "MORTGAGE",
            HomeOwnership::Own => "OWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanIntent {
    Education,
    Medical,
    Venture,
    Personal,
    DebtConsolidation,
    HomeImprovement,
}

impl Categorical for LoanIntent {
    const FIELD: &'static str = "loan_intent";
    const ALL: &'static [Self] = &[
        Self::Education,
        Self::Medical,
        Self::Venture,
        Self::Personal,
        Self::DebtConsolidation,
        Self::HomeImprovement,
    ];

    fn code(self) -> &'static str {
        match self {
            LoanIntent::Education => "EDUCATION",
            LoanIntent::Medical => "MEDICAL",
            LoanIntent::Venture => "VENTURE",
            LoanIntent::Personal => "PERSONAL",
            LoanIntent::DebtConsolidation => "DEBTCONSOLIDATION",
            LoanIntent::HomeImprovement => "HOMEIMPROVEMENT",
        }
    }

    fn alias(normalized: &str) -> Option<Self> {
        match normalized {
            "DEBT_CONSOLIDATION" => Some(Self::DebtConsolidation),
            "HOME_IMPROVEMENT" => Some(Self::HomeImprovement),
            _ => None,
        }
    }
}

/// Lender-assigned grade, `A` being the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoanGrade {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Categorical for LoanGrade {
    const FIELD: &'static str = "loan_grade";
    const ALL: &'static [Self] = &[
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
    ];

    fn code(self) -> &'static str {
        match self {
            LoanGrade::A => "A",
            LoanGrade::B => "B",
            LoanGrade::C => "C",
            LoanGrade::D => "D",
            LoanGrade::E => "E",
            LoanGrade::F => "F",
            LoanGrade::G => "G",
        }
    }
}

/// Credit bureau default flag as it appears in the training data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultOnFile {
    No,
    Yes,
}

impl Categorical for DefaultOnFile {
    const FIELD: &'static str = "cb_person_default_on_file";
    const ALL: &'static [Self] = &[Self::No, Self::Yes];

    fn code(self) -> &'static str {
        match self {
            DefaultOnFile::No => "N",
            DefaultOnFile::Yes => "Y",
        }
    }

    fn alias(normalized: &str) -> Option<Self> {
        match normalized {
            "NO" | "FALSE" => Some(Self::No),
            "YES" | "TRUE" => Some(Self::Yes),
            _ => None,
        }
    }
}

impl From<bool> for DefaultOnFile {
    fn from(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Prior default as submitted: either a JSON boolean or a `Y`/`N` code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriorDefaultInput {
    Flag(bool),
    Code(String),
}

impl PriorDefaultInput {
    fn resolve(&self) -> Result<bool, UnknownCategoryValue> {
        match self {
            PriorDefaultInput::Flag(flag) => Ok(*flag),
            PriorDefaultInput::Code(code) => {
                DefaultOnFile::parse(code).map(|flag| flag == DefaultOnFile::Yes)
            }
        }
    }
}

/// Unvalidated applicant attributes as received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantInput {
    pub age: u32,
    pub annual_income: u64,
    pub loan_amount: u64,
    pub loan_percent_income: f64,
    pub credit_history_length: u32,
    pub home_ownership: String,
    pub loan_intent: String,
    pub loan_grade: String,
    pub prior_default: PriorDefaultInput,
}

/// A validated applicant. Fields are private so a record cannot change after validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantRecord {
    age: u32,
    annual_income: u64,
    loan_amount: u64,
    loan_percent_income: f64,
    credit_history_length: u32,
    home_ownership: HomeOwnership,
    loan_intent: LoanIntent,
    loan_grade: LoanGrade,
    prior_default: bool,
}

impl TryFrom<ApplicantInput> for ApplicantRecord {
    type Error = ApplicantError;

    fn try_from(input: ApplicantInput) -> Result<Self, Self::Error> {
        if !(MIN_AGE..=MAX_AGE).contains(&input.age) {
            return Err(ApplicantError::InvalidField {
                field: "age",
                reason: format!("{} is outside {}..={}", input.age, MIN_AGE, MAX_AGE),
            });
        }

        if !input.loan_percent_income.is_finite()
            || !(0.0..=1.0).contains(&input.loan_percent_income)
        {
            return Err(ApplicantError::InvalidField {
                field: "loan_percent_income",
                reason: format!("{} is outside 0.0..=1.0", input.loan_percent_income),
            });
        }

        Ok(Self {
            age: input.age,
            annual_income: input.annual_income,
            loan_amount: input.loan_amount,
            loan_percent_income: input.loan_percent_income,
            credit_history_length: input.credit_history_length,
            home_ownership: HomeOwnership::parse(&input.home_ownership)?,
            loan_intent: LoanIntent::parse(&input.loan_intent)?,
            loan_grade: LoanGrade::parse(&input.loan_grade)?,
            prior_default: input.prior_default.resolve()?,
        })
    }
}

/// One categorical attribute of a record together with its full value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalFeature {
    pub field: &'static str,
    pub value: &'static str,
    pub domain: Vec<&'static str>,
}

impl CategoricalFeature {
    fn of<C: Categorical>(value: C) -> Self {
        Self {
            field: C::FIELD,
            value: value.code(),
            domain: C::codes(),
        }
    }
}

impl ApplicantRecord {
    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn annual_income(&self) -> u64 {
        self.annual_income
    }

    pub fn loan_amount(&self) -> u64 {
        self.loan_amount
    }

    pub fn loan_percent_income(&self) -> f64 {
        self.loan_percent_income
    }

    pub fn credit_history_length(&self) -> u32 {
        self.credit_history_length
    }

    pub fn home_ownership(&self) -> HomeOwnership {
        self.home_ownership
    }

    pub fn loan_intent(&self) -> LoanIntent {
        self.loan_intent
    }

    pub fn loan_grade(&self) -> LoanGrade {
        self.loan_grade
    }

    pub fn prior_default(&self) -> bool {
        self.prior_default
    }

    pub fn numeric_features(&self) -> [(&'static str, f64); 5] {
        [
            (feature_names::AGE, self.age as f64),
            (feature_names::INCOME, self.annual_income as f64),
            (feature_names::LOAN_AMOUNT, self.loan_amount as f64),
            (feature_names::LOAN_PERCENT_INCOME, self.loan_percent_income),
            (
                feature_names::CREDIT_HISTORY_LENGTH,
                self.credit_history_length as f64,
            ),
        ]
    }

    pub fn categorical_features(&self) -> [CategoricalFeature; 4] {
        [
            CategoricalFeature::of(self.home_ownership),
            CategoricalFeature::of(self.loan_intent),
            CategoricalFeature::of(self.loan_grade),
            CategoricalFeature::of(DefaultOnFile::from(self.prior_default)),
        ]
    }
}
