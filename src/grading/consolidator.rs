//! Reduces each submission's per-round history to one final grade.

use tracing::info;

use super::policy::SelectionPolicy;
use super::submission::{AttemptResult, Submission, SubmissionStatus};

/// Feedback stored on submissions that never got a grading.
pub const NO_EVALUATION_FEEDBACK: &str = "No successful evaluation was received from the LLM.";

/// Consolidate every submission. `attempts` is the configured number of rounds.
pub fn consolidate(submissions: &mut [Submission], attempts: u32, policy: SelectionPolicy) {
    if attempts > 1 {
        info!("consolidating final results with policy '{policy}'");
    } else {
        info!("consolidating final results of the single attempt");
    }

    for submission in submissions.iter_mut() {
        consolidate_one(submission, attempts, policy);
        if submission.status == SubmissionStatus::Graded {
            info!(
                student = %submission.name,
                records = submission.history().len(),
                "final grade {:.2}",
                submission.final_grade
            );
        }
    }
}

/// Consolidate one submission. Never touches its history.
pub fn consolidate_one(submission: &mut Submission, attempts: u32, policy: SelectionPolicy) {
    let Some((grade, chosen)) = select(submission.history(), attempts, policy) else {
        submission.status = SubmissionStatus::Failed;
        submission.final_grade = 0.0;
        submission.feedback = NO_EVALUATION_FEEDBACK.to_string();
        submission.question_scores.clear();
        submission.prompt.clear();
        return;
    };

    let feedback = chosen.feedback.clone();
    let question_scores = chosen.question_scores.clone();
    let prompt = chosen.prompt.clone();

    submission.final_grade = grade;
    submission.feedback = feedback;
    submission.question_scores = question_scores;
    submission.prompt = prompt;
    submission.status = SubmissionStatus::Graded;
}

/// Pick the final grade and the record whose feedback is shown.
/// `None` only for an empty history.
pub fn select(
    history: &[AttemptResult],
    attempts: u32,
    policy: SelectionPolicy,
) -> Option<(f64, &AttemptResult)> {
    let first = history.first()?;
    if attempts <= 1 || history.len() == 1 {
        return Some((first.total_score, first));
    }

    match policy {
        SelectionPolicy::Highest => {
            let chosen = first_by(history, |candidate, best| candidate.total_score > best.total_score);
            Some((chosen.total_score, chosen))
        }
        SelectionPolicy::Lowest => {
            let chosen = first_by(history, |candidate, best| candidate.total_score < best.total_score);
            Some((chosen.total_score, chosen))
        }
        SelectionPolicy::Average => {
            let mean = history.iter().map(|r| r.total_score).sum::<f64>() / history.len() as f64;
            let chosen = first_by(history, |candidate, best| {
                (candidate.total_score - mean).abs() < (best.total_score - mean).abs()
            });
            Some((mean, chosen))
        }
    }
}

// Ties keep the earliest record: a later one only wins when strictly better.
fn first_by<F>(history: &[AttemptResult], better: F) -> &AttemptResult
where
    F: Fn(&AttemptResult, &AttemptResult) -> bool,
{
    let mut best = &history[0];
    for candidate in &history[1..] {
        if better(candidate, best) {
            best = candidate;
        }
    }
    best
}
