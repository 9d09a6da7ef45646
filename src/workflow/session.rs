//! Per-run state: identity, current page, step counter and the step log

use super::submitter::SubmissionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Hard ceiling on loop iterations per run
pub const MAX_STEPS: u32 = 10;

/// Number of characters of markup kept when the submit endpoint is unresolved
pub const MARKUP_SAMPLE_CHARS: usize = 500;

/// Credential pair forwarded with every submission
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("email", &self.email)
            .field("secret", &"***")
            .finish()
    }
}

/// Where a step currently is; used for log context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Rendering,
    Resolving,
    Dispatching,
    Submitting,
    Continuing,
    Done,
    Aborted,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Rendering => "rendering",
            StepPhase::Resolving => "resolving",
            StepPhase::Dispatching => "dispatching",
            StepPhase::Submitting => "submitting",
            StepPhase::Continuing => "continuing",
            StepPhase::Done => "done",
            StepPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One completed loop iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step_index: u32,
    pub page_url: String,
    pub submit_url: String,
    pub computed_answer: String,
    pub submission_result: SubmissionResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A submission response carried no continuation URL
    Completed,
    /// The step ceiling was reached
    StepLimit,
    /// The current page could not be rendered
    RenderFailed,
    /// No submission endpoint could be found on the current page
    SubmitUrlNotFound,
}

impl Termination {
    pub fn is_aborted(self) -> bool {
        matches!(self, Termination::RenderFailed | Termination::SubmitUrlNotFound)
    }
}

/// Outcome of one run, returned to the caller as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub done: bool,
    pub termination: Termination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_sample: Option<String>,
    pub step_log: Vec<StepRecord>,
}

/// Mutable state owned by exactly one run
#[derive(Debug)]
pub struct Session {
    pub run_id: Uuid,
    pub identity: Identity,
    pub current_url: String,
    pub step_index: u32,
    step_log: Vec<StepRecord>,
}

impl Session {
    pub fn new(identity: Identity, start_url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            identity,
            current_url: start_url.into(),
            step_index: 0,
            step_log: Vec::new(),
        }
    }

    pub fn has_steps_left(&self) -> bool {
        self.step_index < MAX_STEPS
    }

    /// Append a record for the current step and advance the counter
    pub fn record(&mut self, record: StepRecord) {
        self.step_log.push(record);
        self.step_index += 1;
    }

    pub fn step_log(&self) -> &[StepRecord] {
        &self.step_log
    }

    pub fn completed(self) -> WorkflowResult {
        self.finish(Termination::Completed)
    }

    pub fn step_limit_reached(self) -> WorkflowResult {
        WorkflowResult {
            reason: Some("max steps reached".to_string()),
            ..self.finish(Termination::StepLimit)
        }
    }

    pub fn render_failed(self, error: String) -> WorkflowResult {
        let url = self.current_url.clone();
        WorkflowResult {
            error: Some(error),
            url: Some(url),
            ..self.finish(Termination::RenderFailed)
        }
    }

    pub fn submit_url_not_found(self, markup: &str) -> WorkflowResult {
        let url = self.current_url.clone();
        WorkflowResult {
            error: Some("Submit URL not found. Quiz page format unexpected.".to_string()),
            url: Some(url),
            markup_sample: Some(markup_sample(markup)),
            ..self.finish(Termination::SubmitUrlNotFound)
        }
    }

    fn finish(self, termination: Termination) -> WorkflowResult {
        WorkflowResult {
            run_id: self.run_id,
            done: termination == Termination::Completed,
            termination,
            reason: None,
            error: None,
            url: None,
            markup_sample: None,
            step_log: self.step_log,
        }
    }
}

/// First `MARKUP_SAMPLE_CHARS` characters of the markup
pub fn markup_sample(markup: &str) -> String {
    markup.chars().take(MARKUP_SAMPLE_CHARS).collect()
}
