use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use super::error::LlmError;
use super::types::{ChatRequest, ChatResponse};

/// How much of an error body is kept for logging.
const ERROR_BODY_PREVIEW: usize = 200;

/// One completion request, no retries. The seam the retrying transport is
/// written against, so retry and backoff can be tested with a fake.
pub trait CompletionSender {
    /// Whether a credential is configured. Without one no request is sent.
    fn has_credential(&self) -> bool {
        true
    }

    /// Send `req` once and return `choices[0].message.content`.
    fn send_completion(
        &self,
        req: &ChatRequest,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

pub struct ChatClient {
    api_key: Option<String>,
    client: Client,
    url: String,
}

impl ChatClient {
    pub fn new(url: String, api_key: Option<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            client,
            url,
        })
    }
}

impl CompletionSender for ChatClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send_completion(
        &self,
        req: &ChatRequest,
        timeout: Duration,
    ) -> Result<String, LlmError> {
        let mut builder = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .header("content-type", "application/json")
            .json(req);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        let body = response.json::<ChatResponse>().await?;
        body.first_content()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}
