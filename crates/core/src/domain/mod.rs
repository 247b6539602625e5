pub mod plan;
pub mod preferences;
pub mod recommendation;
pub mod usage;

pub use plan::{ContractType, CurrentPlan, EnergyPlan, PlanId, PlanPricing, PromotionalRate};
pub use preferences::{BudgetConstraints, CostPriority, UserPreferences};
pub use recommendation::{
    ComponentScores, CostBreakdown, CostProjection, ExclusionReason, ExplanationInput,
    PlanExclusion, ProjectionStep, Recommendation, RiskFlag, RiskKind, Severity,
    SwitchRationale, SwitchingAnalysis,
};
pub use usage::{BillingMonth, DataQuality, UsagePoint, UsageProfile, UsageTrend};
