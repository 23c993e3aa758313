//! Drives all grading rounds and consolidates the results.

use std::time::Duration;

use indicatif::MultiProgress;
use tokio::time::sleep;
use tracing::{error, info};

use crate::llm::CompletionSender;
use crate::report::RunReport;
use crate::state::Checkpoint;
use crate::ui::RoundProgress;

use super::consolidator::consolidate;
use super::dispatcher::BoundedDispatcher;
use super::grader::Grader;
use super::policy::SelectionPolicy;
use super::round::{AttemptRound, RoundOutcome};
use super::submission::Submission;

/// Upper bound of the pause between rounds, in seconds.
pub const MAX_COOLDOWN_SECS: u64 = 60;

/// Pause after round `round`: 10s per finished round, capped.
pub fn cooldown_after(round: u32) -> Duration {
    Duration::from_secs((10 * u64::from(round)).min(MAX_COOLDOWN_SECS))
}

pub struct Orchestrator<S, C> {
    grader: Grader<S>,
    dispatcher: BoundedDispatcher,
    checkpoint: C,
    attempts: u32,
    policy: SelectionPolicy,
    /// Where round progress bars are drawn; `None` keeps them hidden.
    progress: Option<MultiProgress>,
}

impl<S: CompletionSender, C: Checkpoint> Orchestrator<S, C> {
    pub fn new(
        grader: Grader<S>,
        dispatcher: BoundedDispatcher,
        checkpoint: C,
        attempts: u32,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            grader,
            dispatcher,
            checkpoint,
            attempts,
            policy,
            progress: None,
        }
    }

    /// Draw one progress bar per round on `multi`.
    pub fn with_progress(mut self, multi: MultiProgress) -> Self {
        self.progress = Some(multi);
        self
    }

    #[cfg(test)]
    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    /// Run rounds `1..=attempts` in order, then consolidate every submission.
    pub async fn run(&self, submissions: &mut [Submission]) -> (Vec<RoundOutcome>, RunReport) {
        info!(
            students = submissions.len(),
            attempts = self.attempts,
            policy = %self.policy,
            "starting grading run"
        );

        let round_runner = AttemptRound {
            dispatcher: &self.dispatcher,
            grader: &self.grader,
            checkpoint: &self.checkpoint,
        };

        let mut outcomes = Vec::with_capacity(self.attempts as usize);
        for round in 1..=self.attempts {
            let progress = match &self.progress {
                Some(multi) => RoundProgress::start(multi, round, self.attempts, submissions.len()),
                None => RoundProgress::hidden(),
            };
            outcomes.push(round_runner.run(submissions, round, &progress).await);
            progress.finish();

            if round < self.attempts {
                let pause = cooldown_after(round);
                info!(round, "pausing {}s before the next round", pause.as_secs());
                sleep(pause).await;
            }
        }

        consolidate(submissions, self.attempts, self.policy);

        if let Err(e) = self.checkpoint.save(submissions) {
            error!("failed to save final state: {e}");
        }

        let report = RunReport::from_submissions(submissions);
        info!(
            graded = report.graded,
            failed = report.failed.len(),
            "run finished ({:.1}% graded)",
            report.success_rate()
        );
        (outcomes, report)
    }
}
