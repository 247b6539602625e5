//! Prose for ranked recommendations.
//!
//! The engine only produces [`ExplanationInput`] facts. An external
//! [`ExplanationGenerator`] may turn those into prose; when it is absent, fails,
//! or overruns the shared budget, the deterministic [`TemplateExplainer`] text is
//! used instead and the degradation is reported alongside the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::warn;

use crate::domain::plan::PlanId;
use crate::domain::recommendation::{ExplanationInput, SwitchRationale};
use crate::errors::ExplanationError;

#[async_trait]
pub trait ExplanationGenerator: Send + Sync {
    async fn explain(&self, input: &ExplanationInput) -> Result<String, ExplanationError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationSource {
    Generated,
    Template,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub text: String,
    pub source: ExplanationSource,
}

/// Set when at least one explanation fell back to template text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationDegraded {
    pub reason: String,
    pub affected: Vec<PlanId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplanationOutcome {
    pub explanations: Vec<Explanation>,
    pub degraded: Option<ExplanationDegraded>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationTemplates {
    pub headline: String,
    pub fixed_period: String,
    pub savings: String,
    pub extra_cost: String,
    pub switch_now: String,
    pub switch_free: String,
    pub wait: String,
    /// Keyed by risk reason key, e.g. `risk.variable_rate_exposure`.
    pub risk_notes: HashMap<String, String>,
}

impl Default for ExplanationTemplates {
    fn default() -> Self {
        let risk_notes = [
            (
                "risk.high_termination_fee",
                "Its early termination fee of {{early_termination_fee}} is above your tolerance.",
            ),
            ("risk.variable_rate_exposure", "The {{contract_type}} rate can change during the contract."),
            ("risk.promo_rate_expiring", "The introductory rate ends before the contract does."),
            ("risk.low_supplier_rating", "The supplier has a low customer rating."),
            (
                "risk.insufficient_usage_data",
                "Estimates rely on {{data_quality}} usage history.",
            ),
            ("risk.unclear_terms", "Some contract terms are not published."),
        ]
        .into_iter()
        .map(|(key, note)| (key.to_string(), note.to_string()))
        .collect();

        Self {
            headline: "#{{rank}} {{supplier_name}} ({{plan_id}}): {{contract_type}} plan at {{rate_per_kwh}}/kWh, about {{annual_cost}} a year ({{monthly_cost}} a month).".to_string(),
            fixed_period: "The rate is locked for the first {{fixed_rate_months}} months, then follows the market.".to_string(),
            savings: "That is {{savings}} a year less than you pay today.".to_string(),
            extra_cost: "That is {{extra_cost}} a year more than you pay today.".to_string(),
            switch_now: "Switching now recovers your current termination fee in {{months_to_breakeven}} months.".to_string(),
            switch_free: "You can switch without a termination fee.".to_string(),
            wait: "Waiting until your current contract ends avoids the termination fee.".to_string(),
            risk_notes,
        }
    }
}

/// Deterministic `{{variable}}` templates over the explanation input.
#[derive(Clone, Debug, Default)]
pub struct TemplateExplainer {
    templates: ExplanationTemplates,
}

impl TemplateExplainer {
    pub fn new(templates: ExplanationTemplates) -> Self {
        let risk_notes = templates
            .risk_notes
            .into_iter()
            .map(|(key, note)| (normalize_key(&key), note))
            .collect();
        Self { templates: ExplanationTemplates { risk_notes, ..templates } }
    }

    pub fn render(&self, input: &ExplanationInput) -> String {
        let variables = template_variables(input);
        let templates = &self.templates;
        let mut sentences = vec![substitute_variables(&templates.headline, &variables)];
        if input.fixed_rate_months.is_some_and(|months| months > 0) {
            sentences.push(substitute_variables(&templates.fixed_period, &variables));
        }

        match input.projected_annual_savings {
            Some(savings) if savings > Decimal::ZERO => {
                sentences.push(substitute_variables(&templates.savings, &variables));
            }
            Some(savings) if savings < Decimal::ZERO => {
                sentences.push(substitute_variables(&templates.extra_cost, &variables));
            }
            _ => {}
        }

        let switching = match input.switch_rationale {
            Some(SwitchRationale::BreakevenBeforeContractEnd) => Some(&templates.switch_now),
            Some(SwitchRationale::NoPenaltyWindow) => Some(&templates.switch_free),
            Some(SwitchRationale::WaitForContractEnd) => Some(&templates.wait),
            Some(SwitchRationale::NoSavings) | None => None,
        };
        if let Some(template) = switching {
            sentences.push(substitute_variables(template, &variables));
        }

        for key in &input.risk_reason_keys {
            if let Some(note) = templates.risk_notes.get(&normalize_key(key)) {
                sentences.push(substitute_variables(note, &variables));
            }
        }

        sentences.join(" ")
    }
}

#[async_trait]
impl ExplanationGenerator for TemplateExplainer {
    async fn explain(&self, input: &ExplanationInput) -> Result<String, ExplanationError> {
        Ok(self.render(input))
    }
}

/// Explains a ranked list under one shared deadline.
#[derive(Clone)]
pub struct ExplanationStep {
    generator: Option<Arc<dyn ExplanationGenerator>>,
    fallback: TemplateExplainer,
    budget: Duration,
}

impl ExplanationStep {
    pub fn new(budget: Duration) -> Self {
        Self { generator: None, fallback: TemplateExplainer::default(), budget }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ExplanationGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_fallback(mut self, fallback: TemplateExplainer) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Same step with the generator detached.
    pub fn templates_only(&self) -> Self {
        Self { generator: None, fallback: self.fallback.clone(), budget: self.budget }
    }

    pub async fn explain_all(
        &self,
        inputs: &[ExplanationInput],
        correlation_id: &str,
    ) -> ExplanationOutcome {
        let Some(generator) = &self.generator else {
            return ExplanationOutcome {
                explanations: inputs.iter().map(|input| self.templated(input)).collect(),
                degraded: None,
            };
        };

        let deadline = Instant::now() + self.budget;
        let budget_ms = u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX);
        let mut explanations = Vec::with_capacity(inputs.len());
        let mut first_error: Option<ExplanationError> = None;
        let mut affected = Vec::new();

        for input in inputs {
            let result = if Instant::now() >= deadline {
                Err(ExplanationError::TimedOut { budget_ms })
            } else {
                match timeout_at(deadline, generator.explain(input)).await {
                    Ok(Ok(text)) if text.trim().is_empty() => Err(ExplanationError::EmptyText),
                    Ok(result) => result,
                    Err(_) => Err(ExplanationError::TimedOut { budget_ms }),
                }
            };

            match result {
                Ok(text) => {
                    explanations.push(Explanation { text, source: ExplanationSource::Generated })
                }
                Err(error) => {
                    warn!(
                        event_name = "engine.explanation.degraded",
                        correlation_id,
                        plan_id = %input.plan_id,
                        error = %error,
                        "explanation generator unavailable, using template text"
                    );
                    affected.push(input.plan_id.clone());
                    first_error.get_or_insert(error);
                    explanations.push(self.templated(input));
                }
            }
        }

        ExplanationOutcome {
            explanations,
            degraded: first_error
                .map(|error| ExplanationDegraded { reason: error.to_string(), affected }),
        }
    }

    fn templated(&self, input: &ExplanationInput) -> Explanation {
        Explanation { text: self.fallback.render(input), source: ExplanationSource::Template }
    }
}

fn template_variables(input: &ExplanationInput) -> HashMap<String, String> {
    let mut variables = HashMap::from([
        ("plan_id".to_string(), input.plan_id.to_string()),
        ("supplier_name".to_string(), input.supplier_name.clone()),
        ("rank".to_string(), input.rank.to_string()),
        ("score".to_string(), format!("{:.2}", input.score)),
        ("contract_type".to_string(), input.contract_type.as_str().to_string()),
        ("rate_per_kwh".to_string(), input.rate_per_kwh.normalize().to_string()),
        ("annual_cost".to_string(), money(input.annual_cost)),
        ("monthly_cost".to_string(), money(input.monthly_cost)),
        ("renewable_percentage".to_string(), format!("{:.0}", input.renewable_percentage)),
        ("contract_length_months".to_string(), input.contract_length_months.to_string()),
        ("early_termination_fee".to_string(), money(input.early_termination_fee)),
        ("cost_priority".to_string(), input.cost_priority.as_str().to_string()),
        ("data_quality".to_string(), input.data_quality.as_str().to_string()),
    ]);

    if let Some(savings) = input.projected_annual_savings {
        variables.insert("savings".to_string(), money(savings.abs()));
        variables.insert("extra_cost".to_string(), money(savings.abs()));
    }
    if let Some(months) = input.fixed_rate_months {
        variables.insert("fixed_rate_months".to_string(), months.to_string());
    }
    if let Some(months) = input.months_to_breakeven {
        variables.insert("months_to_breakeven".to_string(), format!("{months:.1}"));
    }

    variables
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Replaces `{{name}}` placeholders in one left-to-right pass. Substituted
/// values are never rescanned and unknown placeholders are kept verbatim.
fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            output.push_str(&rest[open..]);
            return output;
        };

        let placeholder = &rest[open..open + close + 4];
        match variables.get(&after_open[..close]) {
            Some(value) => output.push_str(value),
            None => output.push_str(placeholder),
        }
        rest = &after_open[close + 2..];
    }

    output.push_str(rest);
    output
}

fn normalize_key(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}
