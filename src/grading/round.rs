use tracing::{error, info};

use crate::llm::CompletionSender;
use crate::state::Checkpoint;
use crate::ui::RoundProgress;

use super::dispatcher::BoundedDispatcher;
use super::grader::Grader;
use super::submission::Submission;

/// Tally of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u32,
    /// Submissions that gained a result this round.
    pub graded: usize,
    /// Submissions dispatched.
    pub attempted: usize,
}

impl RoundOutcome {
    /// Percentage of dispatched submissions that were graded.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.graded as f64 * 100.0 / self.attempted as f64
        }
    }
}

/// One full dispatcher pass over every submission, followed by a checkpoint.
pub struct AttemptRound<'a, S, C> {
    pub dispatcher: &'a BoundedDispatcher,
    pub grader: &'a Grader<S>,
    pub checkpoint: &'a C,
}

impl<S: CompletionSender, C: Checkpoint> AttemptRound<'_, S, C> {
    pub async fn run(
        &self,
        submissions: &mut [Submission],
        round: u32,
        progress: &RoundProgress,
    ) -> RoundOutcome {
        info!(
            round,
            students = submissions.len(),
            threads = self.dispatcher.concurrency(),
            "starting round"
        );

        let graded = self
            .dispatcher
            .dispatch(self.grader, submissions, round, progress)
            .await;

        if let Err(e) = self.checkpoint.save(submissions) {
            error!(round, "failed to save state: {e}");
        }

        let outcome = RoundOutcome {
            round,
            graded,
            attempted: submissions.len(),
        };
        info!(
            round,
            "round finished: {}/{} graded ({:.1}%)",
            outcome.graded,
            outcome.attempted,
            outcome.success_rate()
        );
        outcome
    }
}
