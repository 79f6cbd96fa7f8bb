use chrono::Utc;
use clap::Args;
use loan_risk::config::AppConfig;
use loan_risk::error::AppError;
use loan_risk::scoring::router::EvaluationView;
use loan_risk::scoring::{
    ApplicantInput, InferenceContext, ModelInfo, PriorDefaultInput, RiskThresholds,
    Sentiment,
};
use std::fmt;

const TOP_DRIVERS: usize = 5;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    #[arg(long, default_value_t = 30)]
    pub(crate) age: u32,
    /// Annual income in currency units
    #[arg(long, default_value_t = 500_000)]
    pub(crate) income: u64,
    #[arg(long, default_value_t = 200_000)]
    pub(crate) loan_amount: u64,
    /// Loan amount as a share of income, between 0 and 1
    #[arg(long, default_value_t = 0.2)]
    pub(crate) loan_percent_income: f64,
    #[arg(long, default_value_t = 5)]
    pub(crate) credit_history_years: u32,
    /// RENT, MORTGAGE or OWN
    #[arg(long, default_value = "RENT")]
    pub(crate) home_ownership: String,
    #[arg(long, default_value = "EDUCATION")]
    pub(crate) loan_intent: String,
    /// Grade A (best) through G
    #[arg(long, default_value = "A")]
    pub(crate) loan_grade: String,
    /// Y if the applicant has a default on file
    #[arg(long, default_value = "N")]
    pub(crate) prior_default: String,
    /// Print the evaluation as JSON instead of a report
    #[arg(long)]
    pub(crate) json: bool,
}

impl ScoreArgs {
    fn applicant(&self) -> ApplicantInput {
        ApplicantInput {
            age: self.age,
            annual_income: self.income,
            loan_amount: self.loan_amount,
            loan_percent_income: self.loan_percent_income,
            credit_history_length: self.credit_history_years,
            home_ownership: self.home_ownership.clone(),
            loan_intent: self.loan_intent.clone(),
            loan_grade: self.loan_grade.clone(),
            prior_default: PriorDefaultInput::Code(self.prior_default.clone()),
        }
    }
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let context = InferenceContext::load(&config.artifacts, config.policy)?;

    let evaluation = context.evaluate_input(args.applicant())?;
    let view = EvaluationView::new(evaluation, Utc::now());

    if args.json {
        match serde_json::to_string_pretty(&view) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Evaluation payload unavailable: {err}"),
        }
    } else {
        let report = ScoreReport {
            view: &view,
            model: context.model_info(),
            thresholds: context.thresholds(),
        };
        print!("{report}");
    }

    Ok(())
}

/// Plain-text report printed by `score` when `--json` is not set.
pub(crate) struct ScoreReport<'a> {
    pub(crate) view: &'a EvaluationView,
    pub(crate) model: &'a ModelInfo,
    pub(crate) thresholds: &'a RiskThresholds,
}

impl fmt::Display for ScoreReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ScoreReport {
            view,
            model,
            thresholds,
        } = self;

        writeln!(
            f,
            "Model: {} ({}) v{}",
            model.model_type,
            model.family.label(),
            model.version
        )?;
        if !model.metrics.is_empty() {
            let metrics: Vec<String> = model
                .metrics
                .iter()
                .map(|(name, value)| format!("{} {:.2}", name.to_ascii_uppercase(), value))
                .collect();
            writeln!(f, "{}", metrics.join(" | "))?;
        }

        writeln!(
            f,
            "\nDefault probability: {:.2}% ({})",
            view.percent, view.label
        )?;
        writeln!(f, "{}", view.context_message)?;
        let gauge: Vec<String> = thresholds
            .gauge_steps()
            .iter()
            .map(|(band, from, to)| format!("{:.0}-{:.0}% {}", from, to, band.color()))
            .collect();
        writeln!(f, "Gauge: {}", gauge.join(" | "))?;

        writeln!(f, "\nTop drivers (baseline {:.3})", view.baseline)?;
        for attribution in view.attributions.iter().take(TOP_DRIVERS) {
            writeln!(
                f,
                "  {:+.3}  {} = {}",
                attribution.contribution, attribution.feature, attribution.feature_value
            )?;
        }

        writeln!(f, "\nAdvice")?;
        for item in &view.advisory.items {
            let marker = match item.sentiment {
                Sentiment::Positive => '+',
                Sentiment::Negative => '-',
            };
            writeln!(f, "  {marker} {}", item.message)?;
        }
        writeln!(f, "\n{}", view.advisory.conclusion)
    }
}
