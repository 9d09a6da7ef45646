//! The step loop
//!
//! Render, resolve, dispatch, submit, follow. The loop is strictly sequential
//! and bounded by `MAX_STEPS`. Only two things end a run early: a page that
//! cannot be rendered and a page with no submission endpoint. Everything else
//! that goes wrong inside a step is recorded in the step log.

use super::dispatcher::{TaskContext, TaskDispatcher};
use super::resolver::SubmitUrlResolver;
use super::session::{Identity, Session, StepPhase, StepRecord, WorkflowResult};
use super::submitter::{AnswerSubmitter, SubmissionPayload};
use crate::config::WorkflowSection;
use crate::error::sanitize_error_message;
use crate::extract::DocumentExtractor;
use crate::llm::AnswerReasoner;
use crate::render::PageRenderer;
use crate::{run_span, step_span};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};
use url::Url;

/// Behaviour switches for the loop
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// Answer submitted on fixed-answer demonstration pages
    pub demo_answer: String,
    /// Ask the reasoner to summarise each page before dispatching
    pub interpret_instructions: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from(&WorkflowSection::default())
    }
}

impl From<&WorkflowSection> for WorkflowSettings {
    fn from(section: &WorkflowSection) -> Self {
        Self {
            demo_answer: section.demo_answer.clone(),
            interpret_instructions: section.interpret_instructions,
        }
    }
}

/// Why a step could not produce a record
#[derive(Debug)]
enum StepAbort {
    RenderFailed(String),
    SubmitUrlNotFound { markup: String },
}

/// Drives one run from the start URL to a terminal state
pub struct StepLoopController {
    renderer: Arc<dyn PageRenderer>,
    resolver: SubmitUrlResolver,
    dispatcher: TaskDispatcher,
    submitter: Arc<dyn AnswerSubmitter>,
    settings: WorkflowSettings,
}

impl StepLoopController {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        reasoner: Arc<dyn AnswerReasoner>,
        extractor: Arc<dyn DocumentExtractor>,
        submitter: Arc<dyn AnswerSubmitter>,
        settings: WorkflowSettings,
    ) -> Self {
        let dispatcher = TaskDispatcher::new(
            renderer.clone(),
            reasoner,
            extractor,
            settings.demo_answer.clone(),
        );

        Self {
            renderer,
            resolver: SubmitUrlResolver::new(),
            dispatcher,
            submitter,
            settings,
        }
    }

    /// Run the workflow starting at `start_url`
    pub async fn run(&self, identity: &Identity, start_url: &str) -> WorkflowResult {
        let session = Session::new(identity.clone(), start_url);
        let span = run_span!(run_id = %session.run_id, start_url = %start_url);

        self.drive(session).instrument(span).await
    }

    async fn drive(&self, mut session: Session) -> WorkflowResult {
        info!(email = %session.identity.email, "Workflow run started");

        while session.has_steps_left() {
            let step_index = session.step_index;
            let page_url = session.current_url.clone();

            let step = self
                .run_step(&session.identity, step_index, &page_url)
                .instrument(step_span!(step_index, page_url = %page_url))
                .await;

            let record = match step {
                Ok(record) => record,
                Err(StepAbort::RenderFailed(message)) => {
                    error!(phase = %StepPhase::Aborted, "Run aborted: {}", message);
                    return session.render_failed(message);
                }
                Err(StepAbort::SubmitUrlNotFound { markup }) => {
                    warn!(
                        phase = %StepPhase::Aborted,
                        page_url = %page_url,
                        "Run aborted: submit URL not found"
                    );
                    return session.submit_url_not_found(&markup);
                }
            };

            let next_url = record
                .submission_result
                .continuation()
                .map(|next| continuation_target(&record.submit_url, next));
            session.record(record);

            match next_url {
                Some(next_url) => {
                    debug!(phase = %StepPhase::Continuing, next_url = %next_url, "Following next URL");
                    session.current_url = next_url;
                }
                None => {
                    info!(
                        phase = %StepPhase::Done,
                        steps = session.step_index,
                        "Workflow completed"
                    );
                    return session.completed();
                }
            }
        }

        warn!(phase = %StepPhase::Done, "Step limit reached");
        session.step_limit_reached()
    }

    async fn run_step(
        &self,
        identity: &Identity,
        step_index: u32,
        page_url: &str,
    ) -> Result<StepRecord, StepAbort> {
        debug!(phase = %StepPhase::Rendering, "Rendering page");
        let page = self.renderer.render(page_url).await.map_err(|e| {
            StepAbort::RenderFailed(sanitize_error_message(&format!("Render failed: {e}")))
        })?;

        debug!(phase = %StepPhase::Resolving, "Resolving submit URL");
        let Some(submit_url) = self
            .resolver
            .resolve(&page.markup, &page.plain_text, page_url)
        else {
            return Err(StepAbort::SubmitUrlNotFound {
                markup: page.markup,
            });
        };

        debug!(phase = %StepPhase::Dispatching, submit_url = %submit_url, "Computing answer");
        let instruction = if self.settings.interpret_instructions {
            self.dispatcher.interpret(&page.plain_text).await
        } else {
            None
        };
        let ctx = TaskContext::new(page_url, &page.markup, &page.plain_text)
            .with_instruction(instruction.as_deref());
        let answer = self.dispatcher.compute_with_context(&ctx).await;

        debug!(phase = %StepPhase::Submitting, "Submitting answer");
        let payload = SubmissionPayload {
            email: identity.email.clone(),
            secret: identity.secret.clone(),
            url: page_url.to_string(),
            answer: answer.clone(),
        };
        let submission_result = self.submitter.submit(&submit_url, &payload).await;

        if let Some(error) = &submission_result.error {
            warn!(step_index, "Submission failed: {}", error);
        }

        Ok(StepRecord {
            step_index,
            page_url: page_url.to_string(),
            submit_url,
            computed_answer: answer,
            submission_result,
            instruction,
            timestamp: Utc::now(),
        })
    }
}

/// Absolute continuation URL; relative values are joined against the endpoint
fn continuation_target(submit_url: &str, next: &str) -> String {
    Url::parse(submit_url)
        .and_then(|base| base.join(next))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| next.to_string())
}
