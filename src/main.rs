//! quizchain command-line entry point

use clap::{Parser, Subcommand};
use quizchain::config::QuizConfig;
use quizchain::error::QuizError;
use quizchain::extract::HttpExtractor;
use quizchain::llm::{LlmProvider, LlmReasoner, OpenAiConfig, OpenAiProvider};
use quizchain::observability::init_default_logging;
use quizchain::render::{BrowserlessConfig, BrowserlessRenderer};
use quizchain::server::{QuizServer, ServerState};
use quizchain::workflow::{HttpSubmitter, Identity, StepLoopController, WorkflowSettings};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Multi-step remote quiz runner
#[derive(Parser)]
#[command(name = "quizchain")]
#[command(about = "Render quiz pages, compute answers, submit and follow the chain")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP entry point
    Serve {
        /// Listen port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one workflow and print the result as JSON
    Run {
        #[arg(long)]
        email: String,
        #[arg(long, env = "QUIZ_SECRET", hide_env_values = true)]
        secret: String,
        /// Start URL
        #[arg(long)]
        url: String,
    },
    /// Validate configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
        /// Probe the LLM backend with the configured key
        #[arg(long)]
        check_llm: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting quizchain v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Run { email, secret, url } => run_once(config, email, secret, url).await,
        Commands::Config { show, check_llm } => handle_config_command(&config, show, check_llm).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<QuizConfig, QuizError> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(QuizConfig::load_from_file(path)?);
    }

    for candidate in ["quizchain.toml", "config/quizchain.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(QuizConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(QuizConfig::default())
}

/// Wire concrete collaborators from configuration
fn build_controller(config: &QuizConfig) -> Result<StepLoopController, QuizError> {
    let browserless = BrowserlessConfig {
        base_url: config.renderer.base_url.clone(),
        api_key: config.get_renderer_api_key()?,
        timeout: Duration::from_secs(config.renderer.timeout_secs),
    };

    let renderer = BrowserlessRenderer::new(browserless.clone())?;
    let extractor = HttpExtractor::new(browserless)?;

    let reasoner = match config.get_llm_api_key() {
        Some(api_key) => {
            let provider = OpenAiProvider::new(OpenAiConfig {
                api_key,
                base_url: config.llm.base_url.clone(),
                timeout: Duration::from_secs(config.llm.timeout_secs),
            })?;
            LlmReasoner::new(
                Arc::new(provider),
                config.llm.model.clone(),
                config.llm.system_prompt.clone(),
            )
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
        }
        None => {
            warn!(
                env = %config.llm.api_key_env,
                "No LLM API key set; reasoning answers will be error strings"
            );
            LlmReasoner::unconfigured()
        }
    };

    let submitter = HttpSubmitter::new(
        Duration::from_secs(config.workflow.submit_timeout_secs),
        config.workflow.continuation_field.clone(),
    )
    .map_err(|e| QuizError::internal_error(format!("building submission client: {e}")))?;

    Ok(StepLoopController::new(
        Arc::new(renderer),
        Arc::new(reasoner),
        Arc::new(extractor),
        Arc::new(submitter),
        WorkflowSettings::from(&config.workflow),
    ))
}

async fn serve(config: QuizConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let secret = config.get_server_secret()?;
    let controller = Arc::new(build_controller(&config)?);
    let state = Arc::new(ServerState::new(controller, secret));

    QuizServer::new(state, port.unwrap_or(config.server.port))
        .run()
        .await?;

    Ok(())
}

async fn run_once(
    config: QuizConfig,
    email: String,
    secret: String,
    url: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let controller = build_controller(&config)?;
    let result = controller.run(&Identity::new(email, secret), &url).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.termination.is_aborted() {
        return Err(format!("run aborted: {:?}", result.termination).into());
    }
    Ok(())
}

async fn handle_config_command(
    config: &QuizConfig,
    show: bool,
    check_llm: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    info!("Configuration is valid");

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    if check_llm {
        let api_key = config
            .get_llm_api_key()
            .ok_or_else(|| format!("{} is not set", config.llm.api_key_env))?;
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key,
            base_url: config.llm.base_url.clone(),
            timeout: Duration::from_secs(config.llm.timeout_secs),
        })?;
        provider.health_check().await?;
        info!(provider = provider.name(), "LLM backend reachable");
    }

    Ok(())
}
