//! Observability: structured logging and run-scoped spans

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

pub use logging::{run_span, step_span};
