//! Builds the grading prompt for one submission from the configured templates.

use std::collections::HashMap;

use chrono::Local;
use tracing::warn;

use crate::config::{AssessmentConfig, PromptTemplates, QuestionConfig};
use crate::grading::Submission;

/// Format of `{current_date}` in the header.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct PromptRenderer {
    templates: PromptTemplates,
    assessment_name: String,
    detailed: bool,
    questions: Vec<QuestionConfig>,
}

impl PromptRenderer {
    pub fn new(
        templates: PromptTemplates,
        assessment: &AssessmentConfig,
        questions: Vec<QuestionConfig>,
    ) -> Self {
        Self {
            templates,
            assessment_name: assessment.name.clone(),
            detailed: assessment.detailed_feedback,
            questions,
        }
    }

    /// Header followed by one block per question the student submitted,
    /// in configuration order.
    pub fn render(&self, submission: &Submission) -> String {
        let header_template = if self.detailed {
            &self.templates.header_detailed
        } else {
            &self.templates.header_concise
        };
        let mut vars = HashMap::new();
        vars.insert("assessment_name", self.assessment_name.clone());
        vars.insert("current_date", Local::now().format(DATE_FORMAT).to_string());

        let mut parts = vec![fill(header_template, &vars)];

        for question in &self.questions {
            let Some(path) = submission.files.get(&question.id) else {
                continue;
            };
            let code = match std::fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(student = %submission.name, file = %path.display(), "could not read file: {e}");
                    continue;
                }
            };

            let mut vars = HashMap::new();
            vars.insert("question_name", question.name.clone());
            vars.insert("question_id", question.id.clone());
            vars.insert("max_points", question.max_points.to_string());
            vars.insert("rubric", question.rubric.clone());
            vars.insert("code", code);
            parts.push(fill(&self.templates.question_block, &vars));
        }

        parts.join("\n")
    }
}

/// Replace every `{key}` with its value. Unknown placeholders are kept as is.
fn fill(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if vars.contains_key(&after[..end]) => {
                out.push_str(&vars[&after[..end]]);
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
