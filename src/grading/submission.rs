use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::moodle::MoodleGrades;

/// Lifecycle of a submission within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Not consolidated yet.
    Pending,
    /// At least one grading was received and a final grade was chosen.
    Graded,
    /// Every round failed for this submission.
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "pending"),
            SubmissionStatus::Graded => write!(f, "graded"),
            SubmissionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One successful grading of one submission in one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub round: u32,
    pub total_score: f64,
    /// Raw completion text.
    pub feedback: String,
    pub question_scores: BTreeMap<String, f64>,
    /// Exact prompt that produced this result.
    pub prompt: String,
    pub graded_at: DateTime<Utc>,
}

impl AttemptResult {
    pub fn new(
        round: u32,
        total_score: f64,
        feedback: String,
        question_scores: BTreeMap<String, f64>,
        prompt: String,
    ) -> Self {
        Self {
            round,
            total_score: total_score.max(0.0),
            feedback,
            question_scores,
            prompt,
            graded_at: Utc::now(),
        }
    }
}

/// One student's gradeable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub name: String,
    pub login: String,
    /// Directory of the submission that was picked for grading.
    pub folder: PathBuf,
    /// Question id → source file.
    pub files: BTreeMap<String, PathBuf>,
    /// Grading jobs started for this submission, across rounds and runs.
    pub api_calls: u32,
    history: Vec<AttemptResult>,
    pub status: SubmissionStatus,
    pub final_grade: f64,
    pub feedback: String,
    pub question_scores: BTreeMap<String, f64>,
    /// Prompt of the result the final grade was taken from.
    pub prompt: String,
    /// Reference grades from the Moodle execution log, if any.
    #[serde(default)]
    pub moodle: MoodleGrades,
}

impl Submission {
    pub fn new(
        name: impl Into<String>,
        login: impl Into<String>,
        folder: PathBuf,
        files: BTreeMap<String, PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            login: login.into(),
            folder,
            files,
            api_calls: 0,
            history: Vec::new(),
            status: SubmissionStatus::Pending,
            final_grade: 0.0,
            feedback: String::new(),
            question_scores: BTreeMap::new(),
            prompt: String::new(),
            moodle: MoodleGrades::default(),
        }
    }

    /// Append a grading. History is never edited otherwise.
    pub fn record(&mut self, result: AttemptResult) {
        self.history.push(result);
    }

    pub fn history(&self) -> &[AttemptResult] {
        &self.history
    }

    #[cfg(test)]
    pub fn graded_in_round(&self, round: u32) -> bool {
        self.history.iter().any(|r| r.round == round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(round: u32, score: f64) -> AttemptResult {
        AttemptResult::new(round, score, "fb".into(), BTreeMap::new(), "p".into())
    }

    #[test]
    fn new_submission_is_pending_and_empty() {
        let sub = Submission::new("Ana Lima", "alima", PathBuf::from("x"), BTreeMap::new());
        assert_eq!(sub.status, SubmissionStatus::Pending);
        assert_eq!(sub.api_calls, 0);
        assert!(sub.history().is_empty());
    }

    #[test]
    fn record_appends_in_order() {
        let mut sub = Submission::new("Ana Lima", "alima", PathBuf::from("x"), BTreeMap::new());
        sub.record(result(1, 5.0));
        sub.record(result(2, 7.0));
        let rounds: Vec<u32> = sub.history().iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 2]);
        assert!(sub.graded_in_round(2));
        assert!(!sub.graded_in_round(3));
    }

    #[test]
    fn negative_score_is_clamped() {
        assert_eq!(result(1, -3.0).total_score, 0.0);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&SubmissionStatus::Graded).unwrap(), "\"graded\"");
        assert_eq!(SubmissionStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn submission_serialization_roundtrip_keeps_history() {
        let mut sub = Submission::new("Ana Lima", "alima", PathBuf::from("x"), BTreeMap::new());
        sub.record(result(1, 5.0));
        let json = serde_json::to_string(&sub).unwrap();
        let back: Submission = serde_json::from_str(&json).unwrap();
        assert_eq!(back.history().len(), 1);
        assert_eq!(back.login, "alima");
    }
}
