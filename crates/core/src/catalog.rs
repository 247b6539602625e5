use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::plan::EnergyPlan;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("plan catalog has no plans for region `{0}`")]
    UnknownRegion(String),
    #[error("plan catalog unavailable: {0}")]
    Unavailable(String),
    #[error("no plan catalog is configured")]
    NotConfigured,
}

/// Read-only source of candidate plans for a region.
pub trait PlanCatalog: Send + Sync {
    fn plans_for_region(&self, region: &str) -> Result<Vec<EnergyPlan>, CatalogError>;
}

/// Map-backed catalog. Region keys are matched case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPlanCatalog {
    regions: BTreeMap<String, Vec<EnergyPlan>>,
}

impl InMemoryPlanCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: &str, plans: Vec<EnergyPlan>) -> Self {
        self.regions.insert(normalize_region(region), plans);
        self
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }
}

impl PlanCatalog for InMemoryPlanCatalog {
    fn plans_for_region(&self, region: &str) -> Result<Vec<EnergyPlan>, CatalogError> {
        self.regions
            .get(&normalize_region(region))
            .cloned()
            .ok_or_else(|| CatalogError::UnknownRegion(region.to_string()))
    }
}

fn normalize_region(region: &str) -> String {
    region.trim().to_ascii_lowercase()
}
