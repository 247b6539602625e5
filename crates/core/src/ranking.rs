//! The recommendation pipeline.
//!
//! A request moves through the stages recorded by [`PipelineTrace`]: validate,
//! build the usage profile once, filter and project every candidate, score,
//! rank, then annotate the top N with risk flags and switching advice. Any
//! fatal error aborts the request without a partial list.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::plan::{CurrentPlan, EnergyPlan};
use crate::domain::preferences::UserPreferences;
use crate::domain::recommendation::{
    CostProjection, ExclusionReason, ExplanationInput, PlanExclusion, Recommendation,
    SwitchingAnalysis,
};
use crate::domain::usage::{UsagePoint, UsageProfile};
use crate::errors::EngineError;
use crate::pipeline::{PipelineStage, PipelineTrace};
use crate::profile::UsageProfileBuilder;
use crate::projection::{CostProjector, DeterministicCostProjector};
use crate::risk::{RiskAssessor, RiskContext, RuleBasedRiskAssessor};
use crate::scoring::{PlanScore, PreferenceScorer, ScoringInput};
use crate::switching::SwitchingAdvisor;

pub const DEFAULT_TOP_N: usize = 3;

/// Everything one recommendation run needs. Nothing here is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub usage_points: Vec<UsagePoint>,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
    #[serde(default, alias = "plans")]
    pub candidate_plans: Vec<EnergyPlan>,
    #[serde(default)]
    pub current_plan: Option<CurrentPlan>,
    pub as_of: NaiveDate,
    /// Overrides the engine's configured result count.
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

impl RecommendationRequest {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            usage_points: Vec::new(),
            preferences: None,
            candidate_plans: Vec::new(),
            current_plan: None,
            as_of,
            top_n: None,
            correlation_id: None,
        }
    }

    pub fn with_usage(mut self, usage_points: Vec<UsagePoint>) -> Self {
        self.usage_points = usage_points;
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_plans(mut self, plans: Vec<EnergyPlan>) -> Self {
        self.candidate_plans = plans;
        self
    }

    pub fn with_current_plan(mut self, current_plan: CurrentPlan) -> Self {
        self.current_plan = Some(current_plan);
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn correlation_id(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or("unassigned")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedRecommendations {
    pub recommendations: Vec<Recommendation>,
    pub profile: UsageProfile,
    /// Zero when neither a current plan nor a complete billing history was supplied.
    pub current_annual_cost: Decimal,
    pub exclusions: Vec<PlanExclusion>,
    pub trace: PipelineTrace,
}

struct ScoredPlan<'a> {
    plan: &'a EnergyPlan,
    projection: CostProjection,
    score: PlanScore,
}

pub struct RecommendationEngine<P = DeterministicCostProjector, R = RuleBasedRiskAssessor> {
    projector: P,
    risk_assessor: R,
    scorer: PreferenceScorer,
    profile_builder: UsageProfileBuilder,
    switching_advisor: SwitchingAdvisor,
    top_n: usize,
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self::with_engines(DeterministicCostProjector, RuleBasedRiskAssessor::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_engines(
            DeterministicCostProjector,
            RuleBasedRiskAssessor::new(config.risk.thresholds()),
        )
        .with_scorer(
            PreferenceScorer::with_weights(config.scoring.weights())
                .with_tie_epsilon(config.scoring.tie_epsilon),
        )
        .with_profile_builder(UsageProfileBuilder::with_settings(config.usage.profile_settings()))
        .with_top_n(config.ranking.top_n)
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> RecommendationEngine<P, R> {
    pub fn with_engines(projector: P, risk_assessor: R) -> Self {
        Self {
            projector,
            risk_assessor,
            scorer: PreferenceScorer::new(),
            profile_builder: UsageProfileBuilder::new(),
            switching_advisor: SwitchingAdvisor,
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_scorer(mut self, scorer: PreferenceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_profile_builder(mut self, profile_builder: UsageProfileBuilder) -> Self {
        self.profile_builder = profile_builder;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }
}

impl<P, R> RecommendationEngine<P, R>
where
    P: CostProjector,
    R: RiskAssessor,
{
    pub fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RankedRecommendations, EngineError> {
        let correlation_id = request.correlation_id();
        let mut trace = PipelineTrace::new();

        let preferences = validate_request(request)?;
        let top_n = request.top_n.unwrap_or(self.top_n);
        trace.advance(PipelineStage::Validated)?;

        let profile = self.profile_builder.build(&request.usage_points, request.as_of);
        let current_projection = match &request.current_plan {
            Some(current) => Some(
                self.projector
                    .project(&current.as_energy_plan(), &profile)
                    .map_err(|error| EngineError::Validation(format!("current_plan: {error}")))?,
            ),
            None => None,
        };
        let current_annual_cost = current_projection
            .as_ref()
            .map(|projection| projection.annual_cost)
            .or(profile.annual_billed_cost)
            .unwrap_or(Decimal::ZERO);
        debug!(
            event_name = "engine.ranking.profile_built",
            correlation_id,
            data_quality = profile.data_quality.as_str(),
            months_observed = profile.months_observed,
            annual_kwh = %profile.annual_kwh,
            current_annual_cost = %current_annual_cost,
            "usage profile built"
        );
        trace.advance(PipelineStage::ProfileBuilt)?;

        let (eligible, exclusions) = self.filter_candidates(request, preferences, &profile);
        trace.advance(PipelineStage::Filtered)?;
        if eligible.is_empty() {
            warn!(
                event_name = "engine.ranking.no_eligible_plans",
                correlation_id,
                candidates = request.candidate_plans.len(),
                "every candidate plan was excluded"
            );
            return Err(EngineError::NoEligiblePlans { exclusions });
        }

        let mut scored: Vec<ScoredPlan<'_>> = eligible
            .into_iter()
            .map(|(plan, projection)| {
                let score = self.scorer.score(ScoringInput {
                    plan,
                    preferences,
                    projection: &projection,
                    current_annual_cost,
                });
                ScoredPlan { plan, projection, score }
            })
            .collect();
        trace.advance(PipelineStage::Scored)?;

        scored.sort_by(|left, right| {
            self.scorer.compare((left.plan, left.score.score), (right.plan, right.score.score))
        });
        scored.truncate(top_n);
        trace.advance(PipelineStage::Ranked)?;

        let recommendations: Vec<Recommendation> = scored
            .into_iter()
            .zip(1_u32..)
            .map(|(candidate, rank)| {
                self.annotate(
                    candidate,
                    rank,
                    request,
                    preferences,
                    &profile,
                    current_projection.as_ref(),
                )
            })
            .collect();
        trace.advance(PipelineStage::Annotated)?;
        trace.advance(PipelineStage::Completed)?;

        info!(
            event_name = "engine.ranking.completed",
            correlation_id,
            candidates = request.candidate_plans.len(),
            excluded = exclusions.len(),
            returned = recommendations.len(),
            top_plan = recommendations.first().map(|rec| rec.plan_id.as_str()).unwrap_or(""),
            "recommendations ranked"
        );

        Ok(RankedRecommendations {
            recommendations,
            profile,
            current_annual_cost,
            exclusions,
            trace,
        })
    }

    fn filter_candidates<'a>(
        &self,
        request: &'a RecommendationRequest,
        preferences: &UserPreferences,
        profile: &UsageProfile,
    ) -> (Vec<(&'a EnergyPlan, CostProjection)>, Vec<PlanExclusion>) {
        let correlation_id = request.correlation_id();
        let mut seen = BTreeSet::new();
        let mut eligible = Vec::with_capacity(request.candidate_plans.len());
        let mut exclusions = Vec::new();

        for plan in &request.candidate_plans {
            if !seen.insert(&plan.plan_id) {
                warn!(
                    event_name = "engine.ranking.plan_excluded",
                    correlation_id,
                    plan_id = %plan.plan_id,
                    reason = "duplicate_plan_id",
                    "duplicate plan id excluded"
                );
                exclusions.push(PlanExclusion {
                    plan_id: plan.plan_id.clone(),
                    reason: ExclusionReason::DuplicatePlanId,
                });
                continue;
            }

            let projection =
                match plan.validate().and_then(|()| self.projector.project(plan, profile)) {
                    Ok(projection) => projection,
                    Err(error) => {
                        warn!(
                            event_name = "engine.ranking.plan_excluded",
                            correlation_id,
                            plan_id = %plan.plan_id,
                            reason = "invalid_plan",
                            error = %error,
                            "invalid plan excluded"
                        );
                        exclusions.push(PlanExclusion {
                            plan_id: plan.plan_id.clone(),
                            reason: ExclusionReason::InvalidPlan { detail: error.to_string() },
                        });
                        continue;
                    }
                };

            if let Some(reason) = self.scorer.hard_filter(plan, &projection, preferences) {
                debug!(
                    event_name = "engine.ranking.plan_filtered",
                    correlation_id,
                    plan_id = %plan.plan_id,
                    reason = ?reason,
                    "plan removed by hard filter"
                );
                exclusions.push(PlanExclusion { plan_id: plan.plan_id.clone(), reason });
                continue;
            }

            eligible.push((plan, projection));
        }

        (eligible, exclusions)
    }

    fn annotate(
        &self,
        candidate: ScoredPlan<'_>,
        rank: u32,
        request: &RecommendationRequest,
        preferences: &UserPreferences,
        profile: &UsageProfile,
        current_projection: Option<&CostProjection>,
    ) -> Recommendation {
        let ScoredPlan { plan, projection, score } = candidate;

        let risk_flags = self.risk_assessor.assess(RiskContext {
            plan,
            projection: &projection,
            profile,
            preferences,
        });

        let switching_analysis: Option<SwitchingAnalysis> =
            request.current_plan.as_ref().zip(current_projection).map(|(current, baseline)| {
                self.switching_advisor.analyze(current, baseline, &projection, request.as_of)
            });

        let explanation_input = ExplanationInput {
            plan_id: plan.plan_id.clone(),
            supplier_name: plan.supplier_name.clone(),
            rank,
            score: score.score,
            contract_type: plan.contract_type(),
            rate_per_kwh: plan.rate_per_kwh(),
            annual_cost: projection.annual_cost,
            monthly_cost: projection.monthly_cost,
            projected_annual_savings: score
                .savings_scored
                .then_some(score.projected_annual_savings),
            rate_uncertain: projection.uncertain,
            fixed_rate_months: plan.pricing.fixed_rate_months(),
            renewable_percentage: plan.renewable_percentage,
            contract_length_months: plan.contract_length_months,
            early_termination_fee: plan.early_termination_fee,
            cost_priority: preferences.cost_savings_priority,
            data_quality: profile.data_quality,
            risk_reason_keys: risk_flags.iter().map(|flag| flag.reason_key.clone()).collect(),
            recommend_switch: switching_analysis.as_ref().map(|analysis| analysis.recommend_switch),
            switch_rationale: switching_analysis.as_ref().map(|analysis| analysis.rationale),
            months_to_breakeven: switching_analysis
                .as_ref()
                .and_then(|analysis| analysis.months_to_breakeven),
        };

        Recommendation {
            plan_id: plan.plan_id.clone(),
            supplier_name: plan.supplier_name.clone(),
            rank,
            score: score.score,
            component_scores: score.components,
            projected_annual_savings: score.projected_annual_savings,
            cost_projection: projection,
            risk_flags,
            switching_analysis,
            explanation_input,
        }
    }
}

fn validate_request(request: &RecommendationRequest) -> Result<&UserPreferences, EngineError> {
    let preferences = request
        .preferences
        .as_ref()
        .ok_or_else(|| EngineError::Validation("preferences are required".to_string()))?;
    preferences.validate()?;

    if request.candidate_plans.is_empty() {
        return Err(EngineError::Validation(
            "at least one candidate plan is required".to_string(),
        ));
    }

    if request.top_n == Some(0) {
        return Err(EngineError::Validation("top_n must be at least 1".to_string()));
    }

    if let Some(current) = &request.current_plan {
        if current.rate_per_kwh <= Decimal::ZERO {
            return Err(EngineError::Validation(
                "current_plan.rate_per_kwh must be positive".to_string(),
            ));
        }
        if current.early_termination_fee < Decimal::ZERO {
            return Err(EngineError::Validation(
                "current_plan.early_termination_fee must not be negative".to_string(),
            ));
        }
    }

    Ok(preferences)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{RecommendationEngine, RecommendationRequest};
    use crate::domain::plan::{EnergyPlan, PlanPricing};
    use crate::domain::preferences::UserPreferences;
    use crate::domain::recommendation::ExclusionReason;
    use crate::domain::usage::UsagePoint;
    use crate::errors::EngineError;
    use crate::pipeline::PipelineStage;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date")
    }

    fn year_of_usage(kwh: i64) -> Vec<UsagePoint> {
        (1..=12)
            .map(|month| {
                UsagePoint::new(
                    NaiveDate::from_ymd_opt(2024, month, 1).expect("valid date"),
                    Decimal::from(kwh),
                )
            })
            .collect()
    }

    fn request(plans: Vec<EnergyPlan>) -> RecommendationRequest {
        RecommendationRequest::new(as_of())
            .with_usage(year_of_usage(600))
            .with_preferences(UserPreferences::default())
            .with_plans(plans)
            .with_correlation_id("req-test")
    }

    #[test]
    fn missing_preferences_fail_validation() {
        let request = RecommendationRequest::new(as_of())
            .with_plans(vec![EnergyPlan::fixed("a", "Acme", Decimal::new(12, 2))]);

        let error = RecommendationEngine::new().recommend(&request).expect_err("no preferences");
        assert_eq!(error, EngineError::Validation("preferences are required".to_string()));
    }

    #[test]
    fn empty_candidate_list_fails_validation() {
        let error = RecommendationEngine::new().recommend(&request(Vec::new())).expect_err("empty");

        assert_eq!(error.error_class(), "validation");
    }

    #[test]
    fn invalid_and_duplicate_plans_are_excluded_with_reasons() {
        let plans = vec![
            EnergyPlan::fixed("good", "Acme", Decimal::new(12, 2)),
            EnergyPlan::fixed("good", "Acme", Decimal::new(10, 2)),
            EnergyPlan::fixed("zero-rate", "Broken", Decimal::ZERO),
        ];

        let result = RecommendationEngine::new().recommend(&request(plans)).expect("one valid plan");

        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].plan_id.as_str(), "good");
        assert_eq!(result.exclusions.len(), 2);
        assert_eq!(result.exclusions[0].reason, ExclusionReason::DuplicatePlanId);
        assert!(matches!(result.exclusions[1].reason, ExclusionReason::InvalidPlan { .. }));
    }

    #[test]
    fn candidate_set_emptied_by_invalid_plans_reports_no_eligible_plans() {
        let plans = vec![EnergyPlan::new(
            "negative",
            "Broken",
            PlanPricing::Variable { rate_per_kwh: Decimal::new(-5, 2), promotional_rate: None },
        )];

        let error = RecommendationEngine::new().recommend(&request(plans)).expect_err("none left");
        assert!(matches!(error, EngineError::NoEligiblePlans { ref exclusions } if exclusions.len() == 1));
    }

    #[test]
    fn hybrid_locked_period_reaches_the_explanation_input() {
        let plans = vec![
            EnergyPlan::new(
                "hybrid-24",
                "Blend Energy",
                PlanPricing::Hybrid {
                    rate_per_kwh: Decimal::new(11, 2),
                    fixed_months: 6,
                    promotional_rate: None,
                },
            ),
            EnergyPlan::fixed("fixed-12", "Acme", Decimal::new(12, 2)),
        ];

        let result = RecommendationEngine::new().recommend(&request(plans)).expect("plans rank");

        let fixed_periods: Vec<_> = result
            .recommendations
            .iter()
            .map(|rec| (rec.plan_id.as_str(), rec.explanation_input.fixed_rate_months))
            .collect();
        assert!(fixed_periods.contains(&("hybrid-24", Some(6))));
        assert!(fixed_periods.contains(&("fixed-12", None)));
    }

    #[test]
    fn results_are_truncated_ranked_and_traced() {
        let plans = (1..=5)
            .map(|index| EnergyPlan::fixed(format!("plan-{index}"), "Acme", Decimal::new(10 + index, 2)))
            .collect();

        let result = RecommendationEngine::new()
            .with_top_n(2)
            .recommend(&request(plans))
            .expect("plans should rank");

        let ranks: Vec<u32> = result.recommendations.iter().map(|rec| rec.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
        assert_eq!(result.recommendations[0].plan_id.as_str(), "plan-1");
        assert!(result.trace.is_completed());
        assert_eq!(result.trace.stages().first(), Some(&PipelineStage::Validated));
    }

    #[test]
    fn request_top_n_overrides_engine_default_and_zero_is_rejected() {
        let plans: Vec<EnergyPlan> = (1..=4)
            .map(|index| EnergyPlan::fixed(format!("plan-{index}"), "Acme", Decimal::new(10 + index, 2)))
            .collect();

        let result = RecommendationEngine::new()
            .recommend(&request(plans.clone()).with_top_n(4))
            .expect("plans should rank");
        assert_eq!(result.recommendations.len(), 4);

        let error = RecommendationEngine::new()
            .recommend(&request(plans).with_top_n(0))
            .expect_err("zero results requested");
        assert_eq!(error, EngineError::Validation("top_n must be at least 1".to_string()));
    }

    #[test]
    fn billed_history_supplies_current_cost_when_no_current_plan_is_given() {
        let usage = year_of_usage(600)
            .into_iter()
            .map(|point| point.with_cost(Decimal::from(78)))
            .collect();
        let request = request(vec![EnergyPlan::fixed("cheap", "Acme", Decimal::new(12, 2))])
            .with_usage(usage);

        let result = RecommendationEngine::new().recommend(&request).expect("plan should rank");

        assert_eq!(result.current_annual_cost, Decimal::from(936));
        assert_eq!(result.recommendations[0].projected_annual_savings, Decimal::from(72));
        assert!(result.recommendations[0].switching_analysis.is_none());
    }

    #[test]
    fn request_deserializes_with_plans_alias() {
        let request: RecommendationRequest = serde_json::from_str(
            r#"{
                "as_of": "2024-12-31",
                "preferences": { "cost_savings_priority": "high" },
                "plans": [
                    {
                        "plan_id": "basic",
                        "supplier_name": "Acme",
                        "pricing": { "contract_type": "variable", "rate_per_kwh": "0.11" },
                        "supplier_rating": 4.0
                    }
                ]
            }"#,
        )
        .expect("request should deserialize");

        assert_eq!(request.candidate_plans.len(), 1);
        assert!(request.usage_points.is_empty());
        assert_eq!(request.correlation_id(), "unassigned");
    }
}
