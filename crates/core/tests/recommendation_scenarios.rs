use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use wattwise_core::domain::BillingMonth;
use wattwise_core::{
    BudgetConstraints, ContractType, CostPriority, CurrentPlan, DataQuality, EnergyPlan,
    EngineError, ExclusionReason, ExplanationError, ExplanationGenerator, ExplanationInput,
    ExplanationSource, PlanAdvisor, PlanPricing, PromotionalRate, RecommendationEngine,
    RecommendationRequest, SwitchRationale, UsagePoint, UsageProfileBuilder, UserPreferences,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Twelve monthly readings ending with the month of `as_of`.
fn flat_year(as_of: NaiveDate, kwh: i64) -> Vec<UsagePoint> {
    let last = BillingMonth::of(as_of);
    (0..12)
        .map(|back| {
            let month = last.offset(-back);
            UsagePoint::new(date(month.year, month.month, 1), Decimal::from(kwh))
        })
        .collect()
}

fn preferences() -> UserPreferences {
    UserPreferences {
        cost_savings_priority: CostPriority::High,
        flexibility_preference_months: 12,
        renewable_energy_preference: 50.0,
        supplier_rating_preference: 3.0,
        contract_type_preference: Some(ContractType::Fixed),
        early_termination_fee_tolerance: Decimal::from(100),
        budget_constraints: None,
    }
}

fn catalog() -> Vec<EnergyPlan> {
    vec![
        EnergyPlan::fixed("steady-12", "Acme Power", Decimal::new(12, 2))
            .with_contract(12, Decimal::from(50))
            .with_renewable_percentage(50.0)
            .with_supplier_rating(4.5)
            .with_terms_url("https://acme.example/terms"),
        EnergyPlan::new(
            "flex-var",
            "Flex Energy",
            PlanPricing::Variable { rate_per_kwh: Decimal::new(11, 2), promotional_rate: None },
        )
        .with_renewable_percentage(20.0)
        .with_supplier_rating(3.8),
        EnergyPlan::new(
            "intro-24",
            "Bright Supply",
            PlanPricing::Fixed {
                rate_per_kwh: Decimal::new(13, 2),
                promotional_rate: Some(PromotionalRate { rate: Decimal::new(9, 2), months: 6 }),
            },
        )
        .with_contract(24, Decimal::from(400))
        .with_renewable_percentage(100.0)
        .with_supplier_rating(4.1),
        EnergyPlan::new(
            "grid-index",
            "Wholesale Direct",
            PlanPricing::Indexed {
                rate_per_kwh: Decimal::new(10, 2),
                index_name: Some("day-ahead".to_string()),
            },
        )
        .with_monthly_fee(Decimal::new(499, 2))
        .with_supplier_rating(3.2),
        EnergyPlan::fixed("budget-36", "Shaky Energy", Decimal::new(9, 2))
            .with_contract(36, Decimal::from(250))
            .with_supplier_rating(2.4),
    ]
}

#[test]
fn scenario_a_projects_savings_against_the_current_plan() {
    let as_of = date(2024, 12, 31);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 600))
        .with_preferences(preferences())
        .with_plans(vec![EnergyPlan::fixed("fixed-12", "Acme Power", Decimal::new(12, 2))])
        .with_current_plan(CurrentPlan {
            rate_per_kwh: Decimal::new(13, 2),
            contract_end_date: None,
            early_termination_fee: Decimal::ZERO,
        });

    let result = RecommendationEngine::new().recommend(&request).expect("plan should rank");

    assert_eq!(result.profile.average_monthly_kwh, Decimal::from(600));
    assert_eq!(result.current_annual_cost, Decimal::from(936));
    let top = &result.recommendations[0];
    assert_eq!(top.cost_projection.annual_cost, Decimal::from(864));
    assert_eq!(top.projected_annual_savings, Decimal::from(72));
    assert_eq!(top.explanation_input.projected_annual_savings, Some(Decimal::from(72)));
}

#[test]
fn scenario_b_breakeven_before_contract_end_recommends_switching() {
    let as_of = date(2024, 6, 15);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 500))
        .with_preferences(preferences())
        .with_plans(vec![EnergyPlan::fixed("fixed-12", "Acme Power", Decimal::new(12, 2))])
        .with_current_plan(CurrentPlan {
            rate_per_kwh: Decimal::new(14, 2),
            contract_end_date: Some(date(2025, 12, 15)),
            early_termination_fee: Decimal::from(150),
        });

    let result = RecommendationEngine::new().recommend(&request).expect("plan should rank");

    let analysis =
        result.recommendations[0].switching_analysis.as_ref().expect("current plan was given");
    assert_eq!(analysis.monthly_savings, Decimal::from(10));
    assert_eq!(analysis.months_to_breakeven, Some(15.0));
    assert_eq!(analysis.remaining_contract_months, 18);
    assert!(analysis.recommend_switch);
    assert_eq!(analysis.rationale, SwitchRationale::BreakevenBeforeContractEnd);
}

#[test]
fn scenario_c_thin_history_flags_every_recommendation() {
    let as_of = date(2024, 12, 31);
    let usage = vec![
        UsagePoint::new(date(2024, 11, 1), Decimal::from(580)),
        UsagePoint::new(date(2024, 12, 1), Decimal::from(620)),
    ];
    let request = RecommendationRequest::new(as_of)
        .with_usage(usage)
        .with_preferences(preferences())
        .with_plans(catalog());

    let result = RecommendationEngine::new().recommend(&request).expect("plans should rank");

    assert_eq!(result.profile.data_quality, DataQuality::Insufficient);
    assert!(!result.recommendations.is_empty());
    for recommendation in &result.recommendations {
        assert!(recommendation.has_flag("insufficient_usage_data"));
    }
}

#[test]
fn scenario_d_rating_floor_excludes_every_plan() {
    let plans = (1..=3)
        .map(|index| {
            EnergyPlan::fixed(format!("low-{index}"), "Shaky Energy", Decimal::new(10, 2))
                .with_supplier_rating(2.0)
        })
        .collect();
    let request = RecommendationRequest::new(date(2024, 12, 31))
        .with_preferences(UserPreferences { supplier_rating_preference: 3.5, ..preferences() })
        .with_plans(plans);

    let error = RecommendationEngine::new().recommend(&request).expect_err("all excluded");

    let EngineError::NoEligiblePlans { exclusions } = &error else {
        panic!("expected no eligible plans, got {error:?}");
    };
    assert_eq!(exclusions.len(), 3);
    assert!(exclusions
        .iter()
        .all(|exclusion| matches!(exclusion.reason, ExclusionReason::BelowRatingFloor { .. })));
    let interface = error.into_interface("req-d");
    assert!(interface.user_message().starts_with("No plans match your preferences."));
}

struct StalledGenerator;

#[async_trait]
impl ExplanationGenerator for StalledGenerator {
    async fn explain(&self, _input: &ExplanationInput) -> Result<String, ExplanationError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("never delivered".to_string())
    }
}

#[tokio::test]
async fn scenario_e_explanation_timeout_falls_back_to_templates() {
    let as_of = date(2024, 12, 31);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 600))
        .with_preferences(preferences())
        .with_plans(catalog())
        .with_correlation_id("req-e");
    let advisor = PlanAdvisor::default()
        .with_explainer(Arc::new(StalledGenerator))
        .with_explanation_budget(Duration::from_millis(50));

    let result = advisor.generate_recommendations(&request).await.expect("ranking succeeds");

    assert_eq!(result.recommendations.len(), 3);
    assert!(result.explanation_degraded.is_some());
    for advised in &result.recommendations {
        assert_eq!(advised.explanation.source, ExplanationSource::Template);
        assert!(advised.explanation.text.contains(&advised.recommendation.supplier_name));
    }
}

#[test]
fn ranking_is_bounded_ordered_and_deterministic() {
    let as_of = date(2024, 12, 31);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 600))
        .with_preferences(preferences())
        .with_plans(catalog())
        .with_current_plan(CurrentPlan {
            rate_per_kwh: Decimal::new(13, 2),
            contract_end_date: Some(date(2025, 6, 30)),
            early_termination_fee: Decimal::from(90),
        });
    let engine = RecommendationEngine::new();

    let first = engine.recommend(&request).expect("plans should rank");
    let second = engine.recommend(&request).expect("plans should rank");

    assert_eq!(first, second);
    assert!(first.recommendations.len() <= 3);
    assert!(first
        .recommendations
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
    assert!(first
        .recommendations
        .iter()
        .all(|recommendation| (0.0..=1.0).contains(&recommendation.score)));
    assert!(first
        .recommendations
        .iter()
        .all(|recommendation| recommendation.plan_id.as_str() != "budget-36"));
    assert!(first.exclusions.iter().any(|exclusion| exclusion.plan_id.as_str() == "budget-36"));
}

#[test]
fn switching_is_never_advised_without_monthly_savings() {
    let as_of = date(2024, 12, 31);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 600))
        .with_preferences(preferences())
        .with_plans(catalog())
        .with_top_n(5)
        .with_current_plan(CurrentPlan {
            rate_per_kwh: Decimal::new(8, 2),
            contract_end_date: None,
            early_termination_fee: Decimal::ZERO,
        });

    let result = RecommendationEngine::new().recommend(&request).expect("plans should rank");

    for recommendation in &result.recommendations {
        let analysis = recommendation.switching_analysis.as_ref().expect("analysis present");
        assert!(analysis.monthly_savings <= Decimal::ZERO);
        assert!(!analysis.recommend_switch);
        assert_eq!(analysis.rationale, SwitchRationale::NoSavings);
    }
}

#[test]
fn budget_ceiling_removes_expensive_plans() {
    let as_of = date(2024, 12, 31);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 600))
        .with_preferences(UserPreferences {
            budget_constraints: Some(BudgetConstraints {
                max_monthly_cost: Some(Decimal::from(70)),
                max_annual_cost: None,
            }),
            ..preferences()
        })
        .with_plans(catalog());

    let result = RecommendationEngine::new().recommend(&request).expect("cheap plans remain");

    assert!(result
        .recommendations
        .iter()
        .all(|recommendation| recommendation.cost_projection.monthly_cost <= Decimal::from(70)));
    assert!(result.exclusions.iter().any(|exclusion| matches!(
        exclusion.reason,
        ExclusionReason::OverMonthlyBudget { .. }
    )));
}

#[test]
fn usage_profile_builder_is_idempotent() {
    let as_of = date(2024, 12, 31);
    let mut usage = flat_year(as_of, 450);
    usage.push(UsagePoint::new(date(2024, 7, 20), Decimal::from(900)));
    let builder = UsageProfileBuilder::new();

    assert_eq!(builder.build(&usage, as_of), builder.build(&usage, as_of));
}

#[test]
fn contract_ending_later_this_month_keeps_its_termination_fee() {
    let as_of = date(2024, 6, 15);
    let request = RecommendationRequest::new(as_of)
        .with_usage(flat_year(as_of, 600))
        .with_preferences(preferences())
        .with_plans(vec![EnergyPlan::fixed("fixed-12", "Acme Power", Decimal::new(1299, 4))])
        .with_current_plan(CurrentPlan {
            rate_per_kwh: Decimal::new(13, 2),
            contract_end_date: Some(date(2024, 7, 14)),
            early_termination_fee: Decimal::from(500),
        });

    let result = RecommendationEngine::new().recommend(&request).expect("plan should rank");

    let analysis =
        result.recommendations[0].switching_analysis.as_ref().expect("current plan was given");
    assert_eq!(analysis.monthly_savings, Decimal::new(6, 2));
    assert_eq!(analysis.remaining_contract_months, 1);
    assert!(!analysis.recommend_switch);
    assert_eq!(analysis.rationale, SwitchRationale::WaitForContractEnd);
}

#[test]
fn plan_whose_cost_overflows_is_excluded_instead_of_panicking() {
    let as_of = date(2024, 12, 31);
    let huge = Decimal::from_i128_with_scale(10_i128.pow(25), 0);
    let usage: Vec<_> = (1..=12).map(|month| UsagePoint::new(date(2024, month, 1), huge)).collect();
    let overpriced = EnergyPlan::fixed("overpriced", "Costly Energy", Decimal::from(1_000));
    let request = RecommendationRequest::new(as_of)
        .with_usage(usage)
        .with_preferences(preferences())
        .with_plans(vec![
            overpriced.clone(),
            EnergyPlan::fixed("fixed-12", "Acme Power", Decimal::new(12, 2)),
        ]);

    let result = RecommendationEngine::new().recommend(&request).expect("one plan still ranks");

    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(result.recommendations[0].plan_id.as_str(), "fixed-12");
    assert!(result.exclusions.iter().any(|exclusion| {
        exclusion.plan_id.as_str() == "overpriced"
            && matches!(exclusion.reason, ExclusionReason::InvalidPlan { .. })
    }));

    let alone = request.with_plans(vec![overpriced]);
    let error = RecommendationEngine::new().recommend(&alone).expect_err("nothing left to rank");
    assert!(matches!(error, EngineError::NoEligiblePlans { .. }));
}
