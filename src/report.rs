//! Run summary, per-student feedback files and the comparison against the
//! Moodle reference grades.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::config::QuestionConfig;
use crate::error::GraderError;
use crate::grading::{SelectionPolicy, Submission, SubmissionStatus};

/// A student that never received a grading.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedStudent {
    pub name: String,
    pub login: String,
    pub api_calls: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total: usize,
    /// Submissions graded at least once.
    pub graded: usize,
    pub failed: Vec<FailedStudent>,
}

impl RunReport {
    /// Summarize consolidated submissions.
    pub fn from_submissions(submissions: &[Submission]) -> Self {
        let failed: Vec<FailedStudent> = submissions
            .iter()
            .filter(|s| s.status != SubmissionStatus::Graded)
            .map(|s| FailedStudent {
                name: s.name.clone(),
                login: s.login.clone(),
                api_calls: s.api_calls,
            })
            .collect();
        Self {
            total: submissions.len(),
            graded: submissions.len() - failed.len(),
            failed,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.graded as f64 * 100.0 / self.total as f64
        }
    }
}

/// Writes `<name>_<login>_feedback.txt` and `<name>_<login>_prompt.txt`
/// for every graded submission.
pub struct FeedbackWriter {
    dir: PathBuf,
    assessment_name: String,
    attempts: u32,
    policy: SelectionPolicy,
}

impl FeedbackWriter {
    pub fn new(
        output_dir: &Path,
        assessment_name: impl Into<String>,
        attempts: u32,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            dir: output_dir.join("feedbacks"),
            assessment_name: assessment_name.into(),
            attempts,
            policy,
        }
    }

    /// Returns how many feedback files were written.
    pub fn write_all(&self, submissions: &[Submission]) -> Result<usize, GraderError> {
        std::fs::create_dir_all(&self.dir)?;
        let mut written = 0;
        for sub in submissions {
            if sub.status != SubmissionStatus::Graded {
                continue;
            }
            match self.write_one(sub) {
                Ok(()) => written += 1,
                Err(e) => warn!(student = %sub.name, "could not write feedback: {e}"),
            }
        }
        info!(dir = %self.dir.display(), "{written} feedback file(s) written");
        Ok(written)
    }

    fn write_one(&self, sub: &Submission) -> Result<(), GraderError> {
        let stem = format!("{}_{}", file_safe(&sub.name), file_safe(&sub.login));
        std::fs::write(
            self.dir.join(format!("{stem}_feedback.txt")),
            self.feedback_text(sub),
        )?;
        if !sub.prompt.is_empty() {
            std::fs::write(self.dir.join(format!("{stem}_prompt.txt")), &sub.prompt)?;
        }
        Ok(())
    }

    pub fn feedback_text(&self, sub: &Submission) -> String {
        let records = sub.history().len();
        let grade_title = if self.attempts > 1 && records > 1 {
            let grade_kind = match self.policy {
                SelectionPolicy::Average => "AVERAGE GRADE",
                _ => "FINAL GRADE",
            };
            format!(
                "{grade_kind} ({} of {records} evaluations): {:.2}\nFeedback below is from {}.",
                self.policy.label(),
                sub.final_grade,
                self.policy.describes()
            )
        } else {
            format!("FINAL GRADE: {:.2}", sub.final_grade)
        };

        let rule = "=".repeat(60);
        format!(
            "{rule}\nFEEDBACK - {}\n{rule}\nStudent: {} ({})\nDate: {}\n\n{grade_title}\nAPI calls: {}\n\n{}\n",
            self.assessment_name,
            sub.name,
            sub.login,
            Local::now().format("%d/%m/%Y %H:%M"),
            sub.api_calls,
            sub.feedback
        )
    }
}

/// AI and Moodle points of one question for one student.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuestionComparison {
    pub ai: f64,
    pub moodle: f64,
    pub moodle_percent: f64,
}

impl QuestionComparison {
    pub fn difference(&self) -> f64 {
        round2(self.ai - self.moodle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub name: String,
    pub login: String,
    pub status: SubmissionStatus,
    pub ai_total: f64,
    /// Sum of the per-question Moodle points; the `Grade :=>>` value is not used.
    pub moodle_total: f64,
    /// One entry per configured question, in configuration order.
    pub questions: Vec<QuestionComparison>,
}

impl ComparisonRow {
    pub fn difference(&self) -> f64 {
        round2(self.ai_total - self.moodle_total)
    }
}

/// Per-student AI vs. Moodle grades. Missing grades count as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub question_ids: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonReport {
    pub fn from_submissions(submissions: &[Submission], questions: &[QuestionConfig]) -> Self {
        let rows = submissions
            .iter()
            .map(|sub| ComparisonRow {
                name: sub.name.clone(),
                login: sub.login.clone(),
                status: sub.status,
                ai_total: sub.final_grade,
                moodle_total: round2(sub.moodle.total_points()),
                questions: questions
                    .iter()
                    .map(|q| QuestionComparison {
                        ai: sub.question_scores.get(&q.id).copied().unwrap_or(0.0),
                        moodle: sub.moodle.points.get(&q.id).copied().unwrap_or(0.0),
                        moodle_percent: sub.moodle.percent.get(&q.id).copied().unwrap_or(0.0),
                    })
                    .collect(),
            })
            .collect();
        Self {
            question_ids: questions.iter().map(|q| q.id.clone()).collect(),
            rows,
        }
    }

    /// Whether any student had an `execution.txt`.
    pub fn has_moodle_data(submissions: &[Submission]) -> bool {
        submissions.iter().any(|s| !s.moodle.is_empty())
    }

    /// Plain-text table, one line per student. Question cells read
    /// `AI/Moodle (Moodle%) diff`.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:<28} {:<14} {:>7} {:>7} {:>7} {:>7}",
            "STUDENT", "LOGIN", "STATUS", "AI", "MOODLE", "DIFF"
        );
        for id in &self.question_ids {
            out.push_str(&format!(" {:>26}", id));
        }
        out.push('\n');

        for row in &self.rows {
            out.push_str(&format!(
                "{:<28} {:<14} {:>7} {:>7.2} {:>7.2} {:>+7.2}",
                row.name,
                row.login,
                row.status.to_string(),
                row.ai_total,
                row.moodle_total,
                row.difference()
            ));
            for q in &row.questions {
                let cell = format!(
                    "{:.2}/{:.2} ({:.0}%) {:+.2}",
                    q.ai,
                    q.moodle,
                    q.moodle_percent,
                    q.difference()
                );
                out.push_str(&format!(" {cell:>26}"));
            }
            out.push('\n');
        }
        out
    }

    /// Write the table to `<output_dir>/comparison.txt`.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, GraderError> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join("comparison.txt");
        std::fs::write(&path, self.render())?;
        info!(path = %path.display(), "comparison with Moodle grades written");
        Ok(path)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// File-name-safe version of `s`: path separators and other reserved
/// characters become `_`.
fn file_safe(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
