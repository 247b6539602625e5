use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{CatalogError, PlanCatalog};
use crate::config::EngineConfig;
use crate::domain::recommendation::{PlanExclusion, Recommendation};
use crate::domain::usage::UsageProfile;
use crate::errors::EngineError;
use crate::explanation::{
    Explanation, ExplanationDegraded, ExplanationGenerator, ExplanationStep, TemplateExplainer,
};
use crate::pipeline::PipelineTrace;
use crate::ranking::{RecommendationEngine, RecommendationRequest};

pub const DEFAULT_EXPLANATION_BUDGET: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisedRecommendation {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub explanation: Explanation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdvisedRecommendations {
    pub recommendations: Vec<AdvisedRecommendation>,
    pub profile: UsageProfile,
    pub current_annual_cost: Decimal,
    pub exclusions: Vec<PlanExclusion>,
    pub trace: PipelineTrace,
    pub explanation_degraded: Option<ExplanationDegraded>,
}

/// Entry point that wires the ranking engine to its collaborators.
pub struct PlanAdvisor {
    engine: RecommendationEngine,
    catalog: Option<Arc<dyn PlanCatalog>>,
    explanations: ExplanationStep,
    explanations_enabled: bool,
}

impl PlanAdvisor {
    pub fn new(engine: RecommendationEngine) -> Self {
        Self {
            engine,
            catalog: None,
            explanations: ExplanationStep::new(DEFAULT_EXPLANATION_BUDGET),
            explanations_enabled: true,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            engine: RecommendationEngine::from_config(config),
            catalog: None,
            explanations: ExplanationStep::new(config.explanation.budget()),
            explanations_enabled: config.explanation.enabled,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn PlanCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_explainer(mut self, generator: Arc<dyn ExplanationGenerator>) -> Self {
        self.explanations = self.explanations.with_generator(generator);
        self
    }

    pub fn with_template_explainer(mut self, templates: TemplateExplainer) -> Self {
        self.explanations = self.explanations.with_fallback(templates);
        self
    }

    pub fn with_explanation_budget(mut self, budget: Duration) -> Self {
        self.explanations = self.explanations.with_budget(budget);
        self
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    pub async fn generate_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> Result<AdvisedRecommendations, EngineError> {
        let correlation_id = request.correlation_id();
        let ranked = self.engine.recommend(request)?;

        let inputs: Vec<_> = ranked
            .recommendations
            .iter()
            .map(|recommendation| recommendation.explanation_input.clone())
            .collect();
        let outcome = if self.explanations_enabled {
            self.explanations.explain_all(&inputs, correlation_id).await
        } else {
            self.explanations.templates_only().explain_all(&inputs, correlation_id).await
        };

        info!(
            event_name = "engine.advisor.completed",
            correlation_id,
            returned = ranked.recommendations.len(),
            explanation_degraded = outcome.degraded.is_some(),
            "recommendations advised"
        );

        let recommendations = ranked
            .recommendations
            .into_iter()
            .zip(outcome.explanations)
            .map(|(recommendation, explanation)| AdvisedRecommendation {
                recommendation,
                explanation,
            })
            .collect();

        Ok(AdvisedRecommendations {
            recommendations,
            profile: ranked.profile,
            current_annual_cost: ranked.current_annual_cost,
            exclusions: ranked.exclusions,
            trace: ranked.trace,
            explanation_degraded: outcome.degraded,
        })
    }

    /// Fills the candidate list from the configured catalog before ranking.
    pub async fn recommend_for_region(
        &self,
        region: &str,
        mut request: RecommendationRequest,
    ) -> Result<AdvisedRecommendations, EngineError> {
        let catalog = self.catalog.as_ref().ok_or(CatalogError::NotConfigured)?;
        request.candidate_plans = catalog.plans_for_region(region)?;
        self.generate_recommendations(&request).await
    }
}

impl Default for PlanAdvisor {
    fn default() -> Self {
        Self::new(RecommendationEngine::new())
    }
}
