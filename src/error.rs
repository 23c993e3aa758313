//! Erros fatais do corretor. Falhas por aluno nunca chegam aqui: elas
//! viram status `Failed` na consolidação.

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum GraderError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("API key not configured: set API_KEY or GROQ_API_KEY, or 'api.api_key' in the config file")]
    MissingCredential,

    #[error("No submissions found in {0}")]
    NoSubmissions(String),

    #[error("LLM client error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let err: GraderError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn missing_credential_names_the_variables() {
        let msg = GraderError::MissingCredential.to_string();
        assert!(msg.contains("API_KEY"));
        assert!(msg.contains("GROQ_API_KEY"));
    }
}
