use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::plan::{ContractType, PlanId};
use crate::domain::preferences::CostPriority;
use crate::domain::usage::DataQuality;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub energy_cost: Decimal,
    pub fees: Decimal,
    pub promo_discount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

/// Projected yearly cost of one plan against one usage profile.
///
/// `uncertain` marks variable and indexed rates, where the current rate is only
/// a point estimate. Early-termination fees are never part of the projection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostProjection {
    pub plan_id: PlanId,
    pub annual_cost: Decimal,
    pub monthly_cost: Decimal,
    pub breakdown: CostBreakdown,
    pub uncertain: bool,
    pub steps: Vec<ProjectionStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskKind {
    HighTerminationFee { fee: Decimal, tolerance: Decimal },
    VariableRateExposure { contract_type: ContractType },
    PromoRateExpiring { promo_months: u32, contract_length_months: u32 },
    LowSupplierRating { rating: f64, threshold: f64 },
    InsufficientUsageData { data_quality: DataQuality, months_observed: u32 },
    UnclearTerms { missing: String },
}

impl RiskKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::HighTerminationFee { .. } => "high_termination_fee",
            Self::VariableRateExposure { .. } => "variable_rate_exposure",
            Self::PromoRateExpiring { .. } => "promo_rate_expiring",
            Self::LowSupplierRating { .. } => "low_supplier_rating",
            Self::InsufficientUsageData { .. } => "insufficient_usage_data",
            Self::UnclearTerms { .. } => "unclear_terms",
        }
    }

    pub fn reason_key(&self) -> String {
        format!("risk.{}", self.key())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    #[serde(flatten)]
    pub kind: RiskKind,
    pub severity: Severity,
    pub reason_key: String,
}

impl RiskFlag {
    pub fn new(kind: RiskKind, severity: Severity) -> Self {
        let reason_key = kind.reason_key();
        Self { kind, severity, reason_key }
    }

    pub fn key(&self) -> &'static str {
        self.kind.key()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchRationale {
    NoSavings,
    BreakevenBeforeContractEnd,
    NoPenaltyWindow,
    WaitForContractEnd,
}

impl SwitchRationale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSavings => "no_savings",
            Self::BreakevenBeforeContractEnd => "breakeven_before_contract_end",
            Self::NoPenaltyWindow => "no_penalty_window",
            Self::WaitForContractEnd => "wait_for_contract_end",
        }
    }
}

/// Whether leaving the current contract early pays for itself.
///
/// `switch_window_months` is set when waiting is advised and counts the months
/// from the as-of date until the current term ends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwitchingAnalysis {
    pub recommend_switch: bool,
    pub monthly_savings: Decimal,
    pub months_to_breakeven: Option<f64>,
    pub remaining_contract_months: u32,
    pub switch_window_months: Option<u32>,
    pub rationale: SwitchRationale,
}

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub cost: f64,
    pub renewable: f64,
    pub flexibility: f64,
    pub contract_match_bonus: f64,
    pub termination_fee_penalty: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExclusionReason {
    InvalidPlan { detail: String },
    DuplicatePlanId,
    BelowRatingFloor { rating: f64, floor: f64 },
    OverMonthlyBudget { monthly_cost: Decimal, limit: Decimal },
    OverAnnualBudget { annual_cost: Decimal, limit: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanExclusion {
    pub plan_id: PlanId,
    #[serde(flatten)]
    pub reason: ExclusionReason,
}

/// Structured facts handed to the explanation collaborator. Not prose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplanationInput {
    pub plan_id: PlanId,
    pub supplier_name: String,
    pub rank: u32,
    pub score: f64,
    pub contract_type: ContractType,
    pub rate_per_kwh: Decimal,
    pub annual_cost: Decimal,
    pub monthly_cost: Decimal,
    pub projected_annual_savings: Option<Decimal>,
    pub rate_uncertain: bool,
    /// Set for hybrid plans only.
    #[serde(default)]
    pub fixed_rate_months: Option<u32>,
    pub renewable_percentage: f64,
    pub contract_length_months: u32,
    pub early_termination_fee: Decimal,
    pub cost_priority: CostPriority,
    pub data_quality: DataQuality,
    pub risk_reason_keys: Vec<String>,
    pub recommend_switch: Option<bool>,
    pub switch_rationale: Option<SwitchRationale>,
    pub months_to_breakeven: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub plan_id: PlanId,
    pub supplier_name: String,
    pub rank: u32,
    pub score: f64,
    pub component_scores: ComponentScores,
    pub projected_annual_savings: Decimal,
    pub cost_projection: CostProjection,
    pub risk_flags: Vec<RiskFlag>,
    pub switching_analysis: Option<SwitchingAnalysis>,
    pub explanation_input: ExplanationInput,
}

impl Recommendation {
    pub fn has_flag(&self, key: &str) -> bool {
        self.risk_flags.iter().any(|flag| flag.key() == key)
    }
}
