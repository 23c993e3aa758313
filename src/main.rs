mod cli;
mod config;
mod discovery;
mod error;
mod extract;
mod grading;
mod llm;
mod logging;
mod moodle;
mod prompt;
mod report;
mod state;
mod ui;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::MultiProgress;
use tracing::{debug, info, warn};

use cli::{Cli, Command};
use config::GraderConfig;
use error::GraderError;
use grading::{BoundedDispatcher, Grader, Orchestrator};
use llm::{ChatClient, RetryPolicy, RetryingTransport};
use prompt::PromptRenderer;
use report::{ComparisonReport, FeedbackWriter};
use state::JsonStateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_loaded = dotenvy::from_path(&cli.env_file).is_ok();

    let mut config = GraderConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli)?;

    let multi = MultiProgress::new();
    let log_file = logging::init_tracing(cli.verbose, &config.log_level, &config.log_dir, multi.clone())?;
    if let Some(path) = &log_file {
        info!(path = %path.display(), "logging to file");
    }
    if env_loaded {
        debug!(path = %cli.env_file.display(), "environment file loaded");
    }

    match cli.command {
        Command::Grade {
            ref submissions_dir,
            resume,
        } => {
            let progress = (!cli.no_progress).then_some(multi);
            grade(&config, submissions_dir, resume, progress).await
        }
        Command::Status => status(&config),
    }
}

fn apply_overrides(config: &mut GraderConfig, cli: &Cli) -> Result<(), GraderError> {
    if let Some(attempts) = cli.attempts {
        if attempts == 0 {
            return Err(GraderError::Config("--attempts must be at least 1".into()));
        }
        config.assessment.llm_attempts = attempts;
    }
    if let Some(threads) = cli.threads {
        if threads == 0 {
            return Err(GraderError::Config("--threads must be at least 1".into()));
        }
        config.processing.parallel_threads = threads;
    }
    if let Some(policy) = cli.policy {
        config.assessment.selection_criteria = policy.to_string();
    }
    Ok(())
}

async fn grade(
    config: &GraderConfig,
    submissions_dir: &std::path::Path,
    resume: bool,
    progress: Option<MultiProgress>,
) -> Result<()> {
    let api_key = config
        .credential()
        .ok_or(GraderError::MissingCredential)?
        .to_string();

    let store = JsonStateStore::new(config.state_file());
    let restored = if resume { store.load()? } else { None };
    let mut submissions = match restored {
        Some(saved) => {
            info!(count = saved.len(), path = %store.path().display(), "resuming from saved state");
            saved
        }
        None => {
            if resume {
                warn!("no saved state found, discovering submissions");
            }
            discovery::discover(submissions_dir, &config.questions)?
        }
    };
    if submissions.is_empty() {
        return Err(GraderError::NoSubmissions(submissions_dir.display().to_string()).into());
    }

    let client = ChatClient::new(config.api.url.clone(), Some(api_key)).map_err(GraderError::from)?;
    let transport = RetryingTransport::new(
        client,
        config.api.models.clone(),
        config.api.system_prompt.clone(),
        config.api.max_tokens,
        config.api.temperature,
        RetryPolicy::with_timeout(config.api.timeout_secs),
    );
    let renderer = PromptRenderer::new(
        config.prompt_templates.clone(),
        &config.assessment,
        config.questions.clone(),
    );
    let dispatcher = BoundedDispatcher::new(
        config.processing.parallel_threads,
        Duration::from_secs(config.processing.wave_delay_secs),
    );
    let attempts = config.assessment.llm_attempts;
    let policy = config.selection_policy();

    let mut orchestrator = Orchestrator::new(
        Grader::new(transport, renderer),
        dispatcher,
        store,
        attempts,
        policy,
    );
    if let Some(multi) = progress {
        orchestrator = orchestrator.with_progress(multi);
    }
    let (_, report) = orchestrator.run(&mut submissions).await;

    FeedbackWriter::new(
        &config.processing.output_dir,
        config.assessment.name.clone(),
        attempts,
        policy,
    )
    .write_all(&submissions)?;

    ui::print_report(&report);

    if ComparisonReport::has_moodle_data(&submissions) {
        let comparison = ComparisonReport::from_submissions(&submissions, &config.questions);
        comparison.write(&config.processing.output_dir)?;
        ui::print_comparison(&comparison);
    }
    Ok(())
}

fn status(config: &GraderConfig) -> Result<()> {
    let store = JsonStateStore::new(config.state_file());
    match store.load()? {
        Some(submissions) => ui::print_status(&submissions),
        None => println!("No saved state at {}", store.path().display()),
    }
    Ok(())
}
