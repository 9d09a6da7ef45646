//! quizchain - multi-step remote quiz runner
//!
//! Given a start URL and a credential pair, quizchain renders the quiz page,
//! finds where the answer must be posted, computes an answer (fixed
//! heuristics for demonstration pages, an LLM for everything else), submits
//! it and follows the returned `nextUrl` until the server stops handing out
//! pages or ten steps have run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use quizchain::testing::mocks::{finished, MockExtractor, MockReasoner, MockRenderer, MockSubmitter};
//! use quizchain::workflow::{Identity, StepLoopController, WorkflowSettings};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let renderer = MockRenderer::new().with_page(
//!     "https://q.example/demo",
//!     r#"<p>POST to <code>/submit</code></p>"#,
//! );
//! let controller = StepLoopController::new(
//!     Arc::new(renderer),
//!     Arc::new(MockReasoner::fixed("42")),
//!     Arc::new(MockExtractor::new()),
//!     Arc::new(MockSubmitter::always(finished())),
//!     WorkflowSettings::default(),
//! );
//!
//! let result = controller
//!     .run(&Identity::new("me@example.com", "s3cret"), "https://q.example/demo")
//!     .await;
//! assert!(result.done);
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod observability;
pub mod render;
pub mod server;
pub mod testing;
pub mod workflow;

pub use config::QuizConfig;
pub use error::{QuizError, QuizResult};
pub use workflow::{Identity, StepLoopController, WorkflowResult, WorkflowSettings};
