use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use wattwise_core::config::{EngineConfig, LoadOptions};
use wattwise_core::{
    ContractType, CostPriority, CurrentPlan, EnergyPlan, InMemoryPlanCatalog, PlanAdvisor,
    PlanPricing, PromotionalRate, RecommendationRequest, UsagePoint, UserPreferences,
};

use crate::commands::recommend::render_text;
use crate::commands::{CommandResult, EXIT_INPUT, EXIT_INTERNAL};

pub const DEMO_REGION: &str = "demo-north";
pub const DEMO_CORRELATION_ID: &str = "demo";

pub fn run() -> CommandResult {
    let config = match EngineConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "demo",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_INPUT,
            )
        }
    };

    let Some(request) = demo_request() else {
        return CommandResult::failure(
            "demo",
            "fixture",
            "built-in demo fixture has an invalid date",
            EXIT_INTERNAL,
        );
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "demo",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_INTERNAL,
            )
        }
    };

    let advisor = PlanAdvisor::from_config(&config)
        .with_catalog(Arc::new(InMemoryPlanCatalog::new().with_region(DEMO_REGION, demo_plans())));

    match runtime.block_on(advisor.recommend_for_region(DEMO_REGION, request)) {
        Ok(advised) => CommandResult::text(render_text(&advised, DEMO_CORRELATION_ID)),
        Err(error) => CommandResult::engine_failure("demo", error, DEMO_CORRELATION_ID),
    }
}

/// A household on a 14p fixed contract with a winter peak, eight months before renewal.
fn demo_request() -> Option<RecommendationRequest> {
    let as_of = NaiveDate::from_ymd_opt(2024, 12, 31)?;
    let monthly_kwh = [720, 680, 590, 510, 450, 400, 410, 430, 470, 560, 640, 710];
    let usage = monthly_kwh
        .iter()
        .enumerate()
        .map(|(index, kwh)| {
            let month = u32::try_from(index).ok()? + 1;
            let start = NaiveDate::from_ymd_opt(as_of.year(), month, 1)?;
            let kwh = Decimal::from(*kwh);
            Some(UsagePoint::new(start, kwh).with_cost(kwh * Decimal::new(14, 2)))
        })
        .collect::<Option<Vec<_>>>()?;

    let preferences = UserPreferences {
        cost_savings_priority: CostPriority::Medium,
        flexibility_preference_months: 12,
        renewable_energy_preference: 60.0,
        supplier_rating_preference: 3.0,
        contract_type_preference: Some(ContractType::Fixed),
        early_termination_fee_tolerance: Decimal::from(100),
        budget_constraints: None,
    };

    Some(
        RecommendationRequest::new(as_of)
            .with_usage(usage)
            .with_preferences(preferences)
            .with_current_plan(CurrentPlan {
                rate_per_kwh: Decimal::new(14, 2),
                contract_end_date: NaiveDate::from_ymd_opt(2025, 8, 31),
                early_termination_fee: Decimal::from(60),
            })
            .with_correlation_id(DEMO_CORRELATION_ID),
    )
}

fn demo_plans() -> Vec<EnergyPlan> {
    vec![
        EnergyPlan::fixed("green-fix-12", "Meadow Energy", Decimal::new(12, 2))
            .with_contract(12, Decimal::from(50))
            .with_renewable_percentage(100.0)
            .with_supplier_rating(4.6)
            .with_terms_url("https://meadow.example/terms"),
        EnergyPlan::new(
            "tracker-var",
            "Pulse Power",
            PlanPricing::Variable { rate_per_kwh: Decimal::new(11, 2), promotional_rate: None },
        )
        .with_renewable_percentage(35.0)
        .with_supplier_rating(3.9),
        EnergyPlan::new(
            "starter-24",
            "Beacon Utilities",
            PlanPricing::Fixed {
                rate_per_kwh: Decimal::new(13, 2),
                promotional_rate: Some(PromotionalRate { rate: Decimal::new(10, 2), months: 3 }),
            },
        )
        .with_contract(24, Decimal::from(300))
        .with_renewable_percentage(50.0)
        .with_supplier_rating(4.0)
        .with_terms_url("https://beacon.example/terms"),
        EnergyPlan::fixed("saver-36", "Discount Grid", Decimal::new(9, 2))
            .with_contract(36, Decimal::from(200))
            .with_supplier_rating(2.2),
    ]
}

#[cfg(test)]
mod tests {
    use super::{demo_plans, demo_request};

    #[test]
    fn demo_fixture_covers_a_full_year_and_the_whole_catalog() {
        let request = demo_request().expect("fixture dates are valid");

        assert_eq!(request.usage_points.len(), 12);
        assert!(request.current_plan.is_some());
        assert!(request.candidate_plans.is_empty());
        assert!(demo_plans().iter().all(|plan| plan.validate().is_ok()));
    }
}
