//! Retrying completion transport.
//!
//! [`RetryingTransport`] wraps a [`CompletionSender`] and turns one prompt
//! into at most [`RetryPolicy::max_attempts`] HTTP calls. Every attempt
//! draws a model at random from the configured pool, gets a longer timeout
//! than the previous one, and failures are spaced out by status-aware
//! sleeps: a fixed doubling wait after HTTP 429, exponential backoff with
//! jitter after anything else.

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::client::CompletionSender;
use super::error::LlmError;
use super::types::ChatRequest;

/// A completion shorter than this (after trimming) is not a grading.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Model used when the pool is empty.
pub const FALLBACK_MODEL: &str = "llama-3.1-8b-instant";

/// Timing knobs for retries. All durations are whole seconds except the jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Timeout of the first attempt.
    pub timeout_base_secs: u64,
    /// Added to the timeout for every further attempt.
    pub timeout_step_secs: u64,
    pub rate_limit_base_secs: u64,
    pub rate_limit_cap_secs: u64,
    pub backoff_cap_secs: f64,
    /// Upper bound of the uniform jitter added to the backoff.
    pub max_jitter_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_base_secs: 120,
            timeout_step_secs: 20,
            rate_limit_base_secs: 15,
            rate_limit_cap_secs: 60,
            backoff_cap_secs: 30.0,
            max_jitter_secs: 5.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with the default schedule and the given first-attempt timeout.
    pub fn with_timeout(timeout_base_secs: u64) -> Self {
        Self {
            timeout_base_secs,
            ..Default::default()
        }
    }

    /// timeout = base + step * attempt
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.timeout_base_secs + self.timeout_step_secs * u64::from(attempt))
    }

    /// delay = min(cap, base * 2^attempt)
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_secs(
            self.rate_limit_base_secs
                .saturating_mul(factor)
                .min(self.rate_limit_cap_secs),
        )
    }

    /// delay = min(cap, 3^attempt + jitter)
    pub fn backoff_delay(&self, attempt: u32, jitter_secs: f64) -> Duration {
        let exp = 3f64.powi(attempt as i32);
        Duration::from_secs_f64((exp + jitter_secs).min(self.backoff_cap_secs))
    }
}

/// Result of [`RetryingTransport::complete`]: the response text, if any
/// attempt produced a usable one, and the prompt that was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub content: Option<String>,
    pub prompt: String,
}

impl TransportReply {
    fn failed(prompt: &str) -> Self {
        Self {
            content: None,
            prompt: prompt.to_string(),
        }
    }
}

/// Whether a completion is long enough to count as a grading.
pub fn is_substantive(content: &str) -> bool {
    content.trim().chars().count() > MIN_CONTENT_CHARS
}

pub struct RetryingTransport<S> {
    sender: S,
    models: Vec<String>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    policy: RetryPolicy,
}

impl<S: CompletionSender> RetryingTransport<S> {
    pub fn new(
        sender: S,
        models: Vec<String>,
        system_prompt: String,
        max_tokens: u32,
        temperature: f32,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            sender,
            models,
            system_prompt,
            max_tokens,
            temperature,
            policy,
        }
    }

    #[cfg(test)]
    pub(crate) fn sender(&self) -> &S {
        &self.sender
    }

    /// Send `prompt` with retries. Never fails: exhausting the attempts, or
    /// a missing credential, yields a reply without content.
    pub async fn complete(&self, prompt: &str, round: u32) -> TransportReply {
        if !self.sender.has_credential() {
            error!("API key not configured (API_KEY / GROQ_API_KEY); skipping request");
            return TransportReply::failed(prompt);
        }

        let last = self.policy.max_attempts.saturating_sub(1);
        for attempt in 0..self.policy.max_attempts {
            let model = pick_model(&self.models);
            let req = ChatRequest::grading(
                &model,
                &self.system_prompt,
                prompt,
                self.max_tokens,
                self.temperature,
            );
            let timeout = self.policy.timeout_for_attempt(attempt);
            debug!(round, attempt = attempt + 1, %model, timeout_secs = timeout.as_secs(), "sending completion request");

            match self.sender.send_completion(&req, timeout).await {
                Ok(content) if is_substantive(&content) => {
                    return TransportReply {
                        content: Some(content),
                        prompt: prompt.to_string(),
                    };
                }
                Ok(content) => {
                    warn!(
                        round,
                        attempt = attempt + 1,
                        %model,
                        chars = content.trim().chars().count(),
                        "completion too short to be a grading"
                    );
                }
                Err(LlmError::RateLimited) => {
                    if attempt < last {
                        let wait = self.policy.rate_limit_delay(attempt);
                        warn!(round, attempt = attempt + 1, "rate limited (429), waiting {}s", wait.as_secs());
                        sleep(wait).await;
                    } else {
                        warn!(round, attempt = attempt + 1, "rate limited (429) on final attempt");
                    }
                    continue;
                }
                Err(err) => {
                    error!(round, attempt = attempt + 1, %model, "completion request failed: {err}");
                }
            }

            if attempt < last {
                let wait = self
                    .policy
                    .backoff_delay(attempt, draw_jitter(self.policy.max_jitter_secs));
                debug!(round, attempt = attempt + 1, "backing off {:.1}s", wait.as_secs_f64());
                sleep(wait).await;
            }
        }

        TransportReply::failed(prompt)
    }
}

fn pick_model(models: &[String]) -> String {
    models
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

fn draw_jitter(max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    rand::thread_rng().gen_range(0.0..max)
}
