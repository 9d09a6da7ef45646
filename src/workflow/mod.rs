//! The quiz workflow: step loop, endpoint resolution, task dispatch and
//! answer submission

pub mod controller;
pub mod dispatcher;
pub mod resolver;
pub mod session;
pub mod submitter;

pub use controller::{StepLoopController, WorkflowSettings};
pub use dispatcher::{classify, TaskContext, TaskDispatcher, TaskKind, DISPATCH_RULES};
pub use resolver::SubmitUrlResolver;
pub use session::{
    Identity, Session, StepPhase, StepRecord, Termination, WorkflowResult, MAX_STEPS,
};
pub use submitter::{AnswerSubmitter, HttpSubmitter, SubmissionPayload, SubmissionResult};
