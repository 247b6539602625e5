pub mod advisor;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod explanation;
pub mod pipeline;
pub mod profile;
pub mod projection;
pub mod ranking;
pub mod risk;
pub mod scoring;
pub mod switching;

pub use advisor::{AdvisedRecommendation, AdvisedRecommendations, PlanAdvisor};
pub use catalog::{CatalogError, InMemoryPlanCatalog, PlanCatalog};
pub use config::{ConfigError, ConfigOverrides, EngineConfig, LoadOptions, LogFormat};
pub use domain::plan::{ContractType, CurrentPlan, EnergyPlan, PlanId, PlanPricing, PromotionalRate};
pub use domain::preferences::{BudgetConstraints, CostPriority, UserPreferences};
pub use domain::recommendation::{
    CostProjection, ExclusionReason, ExplanationInput, PlanExclusion, Recommendation, RiskFlag,
    RiskKind, Severity, SwitchRationale, SwitchingAnalysis,
};
pub use domain::usage::{DataQuality, UsagePoint, UsageProfile, UsageTrend};
pub use errors::{EngineError, ExplanationError, InterfaceError, InvalidPlanError};
pub use explanation::{
    Explanation, ExplanationDegraded, ExplanationGenerator, ExplanationSource, TemplateExplainer,
};
pub use pipeline::{PipelineStage, PipelineTrace};
pub use profile::UsageProfileBuilder;
pub use projection::{CostProjector, DeterministicCostProjector};
pub use ranking::{RankedRecommendations, RecommendationEngine, RecommendationRequest};
pub use risk::{RiskAssessor, RuleBasedRiskAssessor};
pub use scoring::{PreferenceScorer, ScoringWeights};
pub use switching::SwitchingAdvisor;
