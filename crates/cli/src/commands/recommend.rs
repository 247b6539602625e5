use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;
use wattwise_core::config::{ConfigOverrides, EngineConfig, LoadOptions};
use wattwise_core::{AdvisedRecommendations, PlanAdvisor, RecommendationRequest};

use crate::commands::{CommandResult, EXIT_INPUT, EXIT_INTERNAL};

pub fn run(input: &Path, top_n: Option<usize>, json: bool) -> CommandResult {
    let overrides = ConfigOverrides { top_n, ..ConfigOverrides::default() };
    let config = match EngineConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "recommend",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_INPUT,
            )
        }
    };

    let mut request = match load_request(input) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure("recommend", "input", format!("{error:#}"), EXIT_INPUT)
        }
    };
    if top_n.is_some() {
        request.top_n = top_n;
    }
    if request.correlation_id.is_none() {
        request.correlation_id = Some(Uuid::new_v4().to_string());
    }
    let correlation_id = request.correlation_id().to_string();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "recommend",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_INTERNAL,
            )
        }
    };

    let advisor = PlanAdvisor::from_config(&config);
    let advised = match runtime.block_on(advisor.generate_recommendations(&request)) {
        Ok(advised) => advised,
        Err(error) => return CommandResult::engine_failure("recommend", error, &correlation_id),
    };

    info!(
        event_name = "cli.recommend.completed",
        correlation_id = %correlation_id,
        returned = advised.recommendations.len(),
        "recommend command completed"
    );

    if json {
        let message = format!(
            "ranked {} plan(s) for request {correlation_id}",
            advised.recommendations.len()
        );
        return match serde_json::to_value(&advised) {
            Ok(data) => CommandResult::success_with_data("recommend", message, Some(data)),
            Err(error) => CommandResult::failure(
                "recommend",
                "serialization",
                format!("failed to serialize recommendations: {error}"),
                EXIT_INTERNAL,
            ),
        };
    }

    CommandResult::text(render_text(&advised, &correlation_id))
}

fn load_request(path: &Path) -> Result<RecommendationRequest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read request file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("request file `{}` is not a valid request", path.display()))
}

pub(crate) fn render_text(advised: &AdvisedRecommendations, correlation_id: &str) -> String {
    let profile = &advised.profile;
    let mut lines = vec![
        format!("request {correlation_id}"),
        format!(
            "usage: {} kWh/year over {} month(s), data quality {}",
            profile.annual_kwh.round_dp(1),
            profile.months_observed,
            profile.data_quality.as_str()
        ),
        format!("current annual cost: {}", advised.current_annual_cost.round_dp(2)),
    ];

    for advised_plan in &advised.recommendations {
        let recommendation = &advised_plan.recommendation;
        lines.push(format!(
            "#{} {} ({}) score {:.3}, {}/year, savings {}",
            recommendation.rank,
            recommendation.plan_id,
            recommendation.supplier_name,
            recommendation.score,
            recommendation.cost_projection.annual_cost.round_dp(2),
            recommendation.projected_annual_savings.round_dp(2),
        ));
        if !recommendation.risk_flags.is_empty() {
            let flags: Vec<_> = recommendation.risk_flags.iter().map(|flag| flag.key()).collect();
            lines.push(format!("   risks: {}", flags.join(", ")));
        }
        if let Some(analysis) = &recommendation.switching_analysis {
            lines.push(format!(
                "   switch now: {} ({})",
                if analysis.recommend_switch { "yes" } else { "no" },
                analysis.rationale.as_str()
            ));
        }
        lines.push(format!("   {}", advised_plan.explanation.text));
    }

    for exclusion in &advised.exclusions {
        let reason = serde_json::to_value(&exclusion.reason)
            .ok()
            .and_then(|value| value.get("reason").and_then(|reason| reason.as_str().map(str::to_owned)))
            .unwrap_or_else(|| "excluded".to_string());
        lines.push(format!("excluded {}: {reason}", exclusion.plan_id));
    }

    if let Some(degraded) = &advised.explanation_degraded {
        lines.push(format!("explanations degraded: {}", degraded.reason));
    }

    lines.join("\n")
}
