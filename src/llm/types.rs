//! Tipos de dados para requisições e respostas de chat completions
//! no formato compatível com a OpenAI (Groq, OpenRouter, vLLM, ...).
//!
//! Só os campos que o corretor usa são modelados; campos extras da
//! resposta são ignorados na desserialização.

use serde::{Deserialize, Serialize};

/// Corpo da requisição para o endpoint `/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Identificador do modelo sorteado para esta tentativa.
    pub model: String,
    /// Mensagens de sistema e de usuário, nesta ordem.
    pub messages: Vec<ChatMessage>,
    /// Número máximo de tokens na resposta.
    pub max_tokens: u32,
    /// Temperatura de amostragem.
    pub temperature: f32,
    /// Sempre `false`: a resposta é lida de uma vez.
    pub stream: bool,
}

impl ChatRequest {
    /// Monta a requisição padrão de correção: uma mensagem de sistema
    /// seguida do prompt renderizado como mensagem de usuário.
    pub fn grading(
        model: &str,
        system_prompt: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
            stream: false,
        }
    }
}

/// Uma única mensagem da conversa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Papel do remetente: "system", "user" ou "assistant".
    pub role: String,
    /// Conteúdo textual da mensagem.
    pub content: String,
}

/// Resposta do endpoint `/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Alternativas geradas; o corretor usa apenas a primeira.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Conteúdo de `choices[0].message.content`, se existir.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
    }
}

/// Uma alternativa de resposta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

/// Mensagem do assistente dentro de uma [`Choice`]. O conteúdo pode vir
/// `null` em algumas APIs (ex.: chamadas de ferramenta).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}
