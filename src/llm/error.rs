//! Tipos de erro para o cliente da API de chat completions.
//!
//! Define [`LlmError`] com variantes para rate limiting, erros HTTP,
//! respostas sem conteúdo e erros de rede. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer em uma única chamada ao endpoint de completions.
///
/// - [`RateLimited`](LlmError::RateLimited): o servidor retornou HTTP 429
/// - [`ApiError`](LlmError::ApiError): qualquer outro status diferente de 2xx
/// - [`EmptyResponse`](LlmError::EmptyResponse): HTTP 200 sem `choices`
/// - [`NetworkError`](LlmError::NetworkError): falha na camada de rede ou timeout
#[derive(Debug, Error)]
pub enum LlmError {
    /// O servidor retornou HTTP 429.
    #[error("rate limited (status 429)")]
    RateLimited,

    /// Erro retornado pela API (ex.: 401 chave inválida, 500 erro interno).
    /// `message` guarda no máximo os primeiros 200 caracteres do corpo.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// HTTP 200, mas o corpo não trouxe nenhuma `choice` com conteúdo.
    #[error("API returned no completion choices")]
    EmptyResponse,

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, JSON inválido).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
