//! Body of one grading job: prompt → transport → scores → history.

use tracing::{debug, info, warn};

use crate::extract::ScoreExtractor;
use crate::llm::{CompletionSender, RetryingTransport};
use crate::prompt::PromptRenderer;

use super::submission::{AttemptResult, Submission};

pub struct Grader<S> {
    transport: RetryingTransport<S>,
    renderer: PromptRenderer,
    extractor: ScoreExtractor,
}

impl<S: CompletionSender> Grader<S> {
    pub fn new(transport: RetryingTransport<S>, renderer: PromptRenderer) -> Self {
        Self {
            transport,
            renderer,
            extractor: ScoreExtractor::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &RetryingTransport<S> {
        &self.transport
    }

    /// Grade `submission` once for `round`. Returns whether a result was
    /// appended to its history; on failure the submission only has its
    /// call counter bumped.
    pub async fn grade(&self, submission: &mut Submission, round: u32) -> bool {
        submission.api_calls += 1;
        info!(
            student = %submission.name,
            round,
            call = submission.api_calls,
            "grading submission"
        );

        let prompt = self.renderer.render(submission);
        debug!(student = %submission.name, chars = prompt.len(), "prompt rendered");

        let reply = self.transport.complete(&prompt, round).await;
        let Some(content) = reply.content else {
            warn!(student = %submission.name, round, "no usable grading received");
            return false;
        };

        let scores = self.extractor.per_question(&content);
        let total = self.extractor.total(&scores, &content);
        info!(
            student = %submission.name,
            round,
            questions = scores.len(),
            "graded with total {total:.2}"
        );
        submission.record(AttemptResult::new(round, total, content, scores, reply.prompt));
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::config::{AssessmentConfig, PromptTemplates, QuestionConfig};
    use crate::llm::transport::tests::{LONG_REPLY, ScriptedSender};
    use crate::llm::{LlmError, RetryPolicy};

    pub(crate) fn renderer() -> PromptRenderer {
        let assessment = AssessmentConfig {
            name: "Lista".into(),
            llm_attempts: 1,
            selection_criteria: "highest".into(),
            detailed_feedback: false,
        };
        let templates = PromptTemplates {
            header_detailed: "grade {assessment_name}".into(),
            header_concise: "grade {assessment_name}".into(),
            question_block: "{question_id}".into(),
        };
        let question = QuestionConfig {
            id: "Q1".into(),
            name: "Q1".into(),
            max_points: 10.0,
            accepted_extensions: vec![".py".into()],
            rubric: String::new(),
        };
        PromptRenderer::new(templates, &assessment, vec![question])
    }

    pub(crate) fn submission(name: &str) -> Submission {
        Submission::new(name, name.to_lowercase(), "x".into(), BTreeMap::new())
    }

    fn grader(script: Vec<Result<String, LlmError>>) -> Grader<ScriptedSender> {
        let transport = RetryingTransport::new(
            ScriptedSender::new(script),
            vec!["m".into()],
            "system".into(),
            100,
            0.0,
            RetryPolicy::default(),
        );
        Grader::new(transport, renderer())
    }

    #[tokio::test(start_paused = true)]
    async fn success_appends_result_with_scores_and_prompt() {
        let g = grader(vec![Ok(LONG_REPLY.to_string())]);
        let mut sub = submission("Ana");

        assert!(g.grade(&mut sub, 2).await);

        assert_eq!(sub.api_calls, 1);
        assert_eq!(sub.history().len(), 1);
        let result = &sub.history()[0];
        assert_eq!(result.round, 2);
        assert_eq!(result.total_score, 7.0);
        assert_eq!(result.question_scores.get("Q1"), Some(&7.0));
        assert_eq!(result.feedback, LONG_REPLY);
        assert_eq!(result.prompt, "grade Lista");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_only_counts_the_call() {
        let g = grader(vec![
            Err(LlmError::EmptyResponse),
            Err(LlmError::EmptyResponse),
            Err(LlmError::EmptyResponse),
        ]);
        let mut sub = submission("Ana");

        assert!(!g.grade(&mut sub, 1).await);

        assert_eq!(sub.api_calls, 1);
        assert!(sub.history().is_empty());
        assert_eq!(g.transport().sender().calls(), 3);
    }
}
