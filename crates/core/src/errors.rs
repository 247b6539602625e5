use rust_decimal::Decimal;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::domain::plan::PlanId;
use crate::domain::recommendation::PlanExclusion;
use crate::pipeline::StageTransitionError;

/// Fatal request errors. Any of these aborts the request with zero recommendations.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("request validation failed: {0}")]
    Validation(String),
    #[error("no eligible plans: all {} candidate(s) were excluded", exclusions.len())]
    NoEligiblePlans { exclusions: Vec<PlanExclusion> },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Pipeline(#[from] StageTransitionError),
}

/// A malformed plan record. Only that plan is excluded.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvalidPlanError {
    #[error("plan record has an empty plan_id")]
    MissingPlanId,
    #[error("plan `{plan_id}` has non-positive rate_per_kwh {rate}")]
    NonPositiveRate { plan_id: PlanId, rate: Decimal },
    #[error("plan `{plan_id}` has an invalid promotional rate {rate} for {months} month(s)")]
    InvalidPromotion { plan_id: PlanId, rate: Decimal, months: u32 },
    #[error("plan `{plan_id}` has {field} {value} outside its allowed range")]
    OutOfRange { plan_id: PlanId, field: &'static str, value: f64 },
    #[error("plan `{plan_id}` has negative {field} {amount}")]
    NegativeAmount { plan_id: PlanId, field: &'static str, amount: Decimal },
    #[error("plan `{plan_id}` cost projection overflowed at the {stage} step")]
    CostOverflow { plan_id: PlanId, stage: &'static str },
}

/// Failure of the explanation collaborator. Never fatal to a request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExplanationError {
    #[error("explanation generator failed: {0}")]
    Generator(String),
    #[error("explanation generator returned empty text")]
    EmptyText,
    #[error("explanation budget of {budget_ms}ms exhausted")]
    TimedOut { budget_ms: u64 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("no matching plans: {message}")]
    NoMatchingPlans { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NoMatchingPlans { .. } => {
                "No plans match your preferences. Try relaxing the supplier rating or budget limits."
            }
            Self::ServiceUnavailable { .. } => {
                "The plan catalog is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NoMatchingPlans { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl EngineError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::Validation(_) => InterfaceError::BadRequest { message, correlation_id },
            Self::NoEligiblePlans { .. } => {
                InterfaceError::NoMatchingPlans { message, correlation_id }
            }
            Self::Catalog(_) => InterfaceError::ServiceUnavailable { message, correlation_id },
            Self::Pipeline(_) => InterfaceError::Internal { message, correlation_id },
        }
    }

    /// Stable machine-readable class used by CLI payloads and logs.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NoEligiblePlans { .. } => "no_eligible_plans",
            Self::Catalog(_) => "catalog",
            Self::Pipeline(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::CatalogError;
    use crate::domain::plan::PlanId;
    use crate::domain::recommendation::{ExclusionReason, PlanExclusion};
    use crate::errors::{EngineError, InterfaceError};

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface = EngineError::Validation("preferences are required".to_owned())
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn no_eligible_plans_maps_to_user_visible_no_matching_plans() {
        let error = EngineError::NoEligiblePlans {
            exclusions: vec![PlanExclusion {
                plan_id: PlanId::new("low-rated"),
                reason: ExclusionReason::BelowRatingFloor { rating: 2.0, floor: 3.5 },
            }],
        };
        assert_eq!(error.error_class(), "no_eligible_plans");
        assert!(error.to_string().contains("all 1 candidate(s)"));

        let interface = error.into_interface("req-2");
        assert!(matches!(interface, InterfaceError::NoMatchingPlans { .. }));
        assert!(interface.user_message().starts_with("No plans match your preferences."));
    }

    #[test]
    fn catalog_error_maps_to_service_unavailable() {
        let interface = EngineError::from(CatalogError::Unavailable("upstream timeout".to_owned()))
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
    }
}
