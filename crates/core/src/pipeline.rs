use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stages of a single recommendation request. The order is fixed and linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validated,
    ProfileBuilt,
    Filtered,
    Scored,
    Ranked,
    Annotated,
    Completed,
}

impl PipelineStage {
    pub const INITIAL: Self = Self::Validated;

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Validated => Some(Self::ProfileBuilt),
            Self::ProfileBuilt => Some(Self::Filtered),
            Self::Filtered => Some(Self::Scored),
            Self::Scored => Some(Self::Ranked),
            Self::Ranked => Some(Self::Annotated),
            Self::Annotated => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::ProfileBuilt => "profile_built",
            Self::Filtered => "filtered",
            Self::Scored => "scored",
            Self::Ranked => "ranked",
            Self::Annotated => "annotated",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid pipeline transition from {from:?} to {to:?}")]
pub struct StageTransitionError {
    pub from: Option<PipelineStage>,
    pub to: PipelineStage,
}

/// Ordered record of the stages a request has passed through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTrace {
    stages: Vec<PipelineStage>,
}

impl PipelineTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<PipelineStage> {
        self.stages.last().copied()
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn is_completed(&self) -> bool {
        self.current() == Some(PipelineStage::Completed)
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), StageTransitionError> {
        let from = self.current();
        let expected = match from {
            None => Some(PipelineStage::INITIAL),
            Some(stage) => stage.next(),
        };

        if expected != Some(to) {
            return Err(StageTransitionError { from, to });
        }

        tracing::debug!(
            event_name = "engine.pipeline.stage_entered",
            stage = to.as_str(),
            "pipeline stage entered"
        );
        self.stages.push(to);
        Ok(())
    }
}
