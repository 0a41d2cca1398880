//! Deployment pipeline state machine.
//!
//! The order is fixed: Idle -> Deploying -> Wiring -> Confirming ->
//! (Verifying ->) Done. A fault in any active stage moves the pipeline to
//! `Failed`, keeping the stage it failed in.

use serde::{Deserialize, Serialize};

/// An active stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Idle,
    Deploying,
    Wiring,
    Confirming,
    Verifying,
}

/// Full pipeline state, including the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Active(Stage),
    Done,
    Failed { at: Stage },
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState::Active(Stage::Idle)
    }
}

impl PipelineState {
    /// The stage currently running, if the pipeline has not terminated.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Active(stage) => Some(*stage),
            PipelineState::Done | PipelineState::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage().is_none()
    }
}

/// Inputs that drive the pipeline forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The plan was validated; start deploying.
    Begin,
    /// Every component has a submitted deployment.
    Deployed,
    /// Every wiring call is confirmed.
    Wired,
    /// Every deployment reached settlement depth.
    Settled { verify: bool },
    /// Every verification request has an outcome.
    Verified,
    /// A fatal error happened in the current stage.
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid pipeline transition from {from:?} on {event:?}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub event: PipelineEvent,
}

/// Compute the next state. Pure: no I/O, no side effects.
pub fn transition(
    state: PipelineState,
    event: PipelineEvent,
) -> Result<PipelineState, TransitionError> {
    use PipelineEvent as E;
    use PipelineState::{Active, Done, Failed};

    let next = match (state, event) {
        (Active(stage), E::Fault) => Failed { at: stage },
        (Active(Stage::Idle), E::Begin) => Active(Stage::Deploying),
        (Active(Stage::Deploying), E::Deployed) => Active(Stage::Wiring),
        (Active(Stage::Wiring), E::Wired) => Active(Stage::Confirming),
        (Active(Stage::Confirming), E::Settled { verify: true }) => Active(Stage::Verifying),
        (Active(Stage::Confirming), E::Settled { verify: false }) => Done,
        (Active(Stage::Verifying), E::Verified) => Done,
        (from, event) => return Err(TransitionError { from, event }),
    };

    Ok(next)
}
