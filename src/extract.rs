//! Pulls scores out of free-text grading responses.
//!
//! The prompt templates ask the model for one `QUESTAO_<id>: <score>/<max>`
//! line per question and a `NOTA FINAL: <total>` line. The per-question
//! lines are authoritative; the final-grade patterns are only a fallback.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::warn;

pub struct ScoreExtractor {
    per_question: Regex,
    fallbacks: Vec<Regex>,
}

impl ScoreExtractor {
    pub fn new() -> Self {
        let per_question = Regex::new(
            r"(?im)QUEST(?:AO|ÃO|ION)_(\w+):\s*(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)",
        )
        .expect("per-question pattern is valid");
        let fallbacks = [
            r"(?i)NOTA FINAL[:\s]+(\d+(?:\.\d+)?)",
            r"(?i)Total[:\s]+(\d+(?:\.\d+)?)",
            r"(?i)Pontuação[:\s]+(\d+(?:\.\d+)?)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("fallback pattern is valid"))
        .collect();
        Self {
            per_question,
            fallbacks,
        }
    }

    /// Question id → score, for every well-formed line whose score lies in
    /// `0..=max`. A later line for the same id overwrites an earlier one.
    pub fn per_question(&self, text: &str) -> BTreeMap<String, f64> {
        let mut scores = BTreeMap::new();
        for caps in self.per_question.captures_iter(text) {
            let id = &caps[1];
            let (Ok(score), Ok(max)) = (caps[2].parse::<f64>(), caps[3].parse::<f64>()) else {
                warn!(question = id, "could not parse score line");
                continue;
            };
            if (0.0..=max).contains(&score) {
                scores.insert(id.to_string(), score);
            } else {
                warn!(question = id, "score out of range: {score}/{max}");
            }
        }
        scores
    }

    /// First match of the final-grade patterns, tried in order; 0 when none match.
    pub fn fallback_total(&self, text: &str) -> f64 {
        self.fallbacks
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0.0)
    }

    /// Sum of the per-question scores when there are any, else the fallback.
    pub fn total(&self, scores: &BTreeMap<String, f64>, text: &str) -> f64 {
        if scores.is_empty() {
            self.fallback_total(text)
        } else {
            scores.values().sum()
        }
    }
}

impl Default for ScoreExtractor {
    fn default() -> Self {
        Self::new()
    }
}
