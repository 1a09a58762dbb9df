//! Per-step status tracking for a single flow run

use crate::error::{TracerError, TracerResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The five verification stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowStep {
    OriginTransaction,
    EventEmission,
    RscCapture,
    CallbackTransaction,
    DestinationExecution,
}

impl FlowStep {
    pub const ALL: [FlowStep; 5] = [
        FlowStep::OriginTransaction,
        FlowStep::EventEmission,
        FlowStep::RscCapture,
        FlowStep::CallbackTransaction,
        FlowStep::DestinationExecution,
    ];

    /// Get step name for metrics and API output
    pub fn name(&self) -> &'static str {
        match self {
            FlowStep::OriginTransaction => "originTransaction",
            FlowStep::EventEmission => "eventEmission",
            FlowStep::RscCapture => "rscCapture",
            FlowStep::CallbackTransaction => "callbackTransaction",
            FlowStep::DestinationExecution => "destinationExecution",
        }
    }

    fn index(&self) -> usize {
        match self {
            FlowStep::OriginTransaction => 0,
            FlowStep::EventEmission => 1,
            FlowStep::RscCapture => 2,
            FlowStep::CallbackTransaction => 3,
            FlowStep::DestinationExecution => 4,
        }
    }

    /// Steps that must succeed before this one may complete
    pub fn predecessors(&self) -> &'static [FlowStep] {
        &Self::ALL[..self.index()]
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Success,
    Error,
}

impl StepState {
    pub fn name(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Success => "success",
            StepState::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStatus {
    pub status: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When `status` last changed
    pub timestamp: DateTime<Utc>,
}

impl StepStatus {
    fn pending() -> Self {
        Self {
            status: StepState::Pending,
            data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepState::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == StepState::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == StepState::Error
    }
}

/// Derived summary of a flow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "camelCase")]
pub enum FlowOutcome {
    /// Every step succeeded
    Completed,
    /// Halted at this step
    Failed(FlowStep),
    /// Stopped before finishing without an error (cancelled)
    Incomplete,
}

/// Ordered record of all five steps of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStatus {
    pub origin_transaction: StepStatus,
    pub event_emission: StepStatus,
    pub rsc_capture: StepStatus,
    pub callback_transaction: StepStatus,
    pub destination_execution: StepStatus,
}

impl Default for FlowStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowStatus {
    /// All five steps pending
    pub fn new() -> Self {
        Self {
            origin_transaction: StepStatus::pending(),
            event_emission: StepStatus::pending(),
            rsc_capture: StepStatus::pending(),
            callback_transaction: StepStatus::pending(),
            destination_execution: StepStatus::pending(),
        }
    }

    pub fn step(&self, step: FlowStep) -> &StepStatus {
        match step {
            FlowStep::OriginTransaction => &self.origin_transaction,
            FlowStep::EventEmission => &self.event_emission,
            FlowStep::RscCapture => &self.rsc_capture,
            FlowStep::CallbackTransaction => &self.callback_transaction,
            FlowStep::DestinationExecution => &self.destination_execution,
        }
    }

    fn step_mut(&mut self, step: FlowStep) -> &mut StepStatus {
        match step {
            FlowStep::OriginTransaction => &mut self.origin_transaction,
            FlowStep::EventEmission => &mut self.event_emission,
            FlowStep::RscCapture => &mut self.rsc_capture,
            FlowStep::CallbackTransaction => &mut self.callback_transaction,
            FlowStep::DestinationExecution => &mut self.destination_execution,
        }
    }

    /// Steps paired with their status, in pipeline order
    pub fn steps(&self) -> impl Iterator<Item = (FlowStep, &StepStatus)> {
        FlowStep::ALL.into_iter().map(move |s| (s, self.step(s)))
    }

    /// Record a successful step with its payload
    pub fn mark_success(&mut self, step: FlowStep, data: Value) -> TracerResult<()> {
        self.check_transition(step, StepState::Success)?;
        let entry = self.step_mut(step);
        entry.status = StepState::Success;
        entry.data = Some(data);
        entry.timestamp = Utc::now();
        Ok(())
    }

    /// Record a failed step with its message
    pub fn mark_error(&mut self, step: FlowStep, message: impl Into<String>) -> TracerResult<()> {
        self.check_transition(step, StepState::Error)?;
        let entry = self.step_mut(step);
        entry.status = StepState::Error;
        entry.error = Some(message.into());
        entry.timestamp = Utc::now();
        Ok(())
    }

    /// A step leaves `pending` once, and only after every earlier step succeeded
    fn check_transition(&self, step: FlowStep, to: StepState) -> TracerResult<()> {
        let current = self.step(step).status;
        let blocked = step
            .predecessors()
            .iter()
            .any(|p| !self.step(*p).is_success());

        if current != StepState::Pending || blocked {
            return Err(TracerError::InvalidStateTransition {
                step: step.name().to_string(),
                from: current.name().to_string(),
                to: to.name().to_string(),
            });
        }
        Ok(())
    }

    pub fn outcome(&self) -> FlowOutcome {
        if let Some((step, _)) = self.steps().find(|(_, s)| s.is_error()) {
            return FlowOutcome::Failed(step);
        }
        if self.steps().any(|(_, s)| s.is_pending()) {
            FlowOutcome::Incomplete
        } else {
            FlowOutcome::Completed
        }
    }
}
