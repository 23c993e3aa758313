//! Configuração do corretor carregada a partir de um arquivo TOML
//! (por padrão `grader.toml`).
//!
//! As seções `[api]`, `[assessment]` e `[[questions]]` são obrigatórias;
//! os demais campos usam defaults sensíveis. A chave da API vem das
//! variáveis de ambiente `API_KEY` ou `GROQ_API_KEY`, que têm precedência
//! sobre `api.api_key` no arquivo.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::GraderError;
use crate::grading::SelectionPolicy;

/// Variáveis de ambiente consultadas para a chave da API, em ordem.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GROQ_API_KEY"];

/// Configuração de nível superior.
#[derive(Debug, Clone, Deserialize)]
pub struct GraderConfig {
    /// Nível de log padrão quando `RUST_LOG` não está definido.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Pasta dos arquivos `avaliacao_<data>.log`.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    pub api: ApiConfig,

    pub assessment: AssessmentConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    pub questions: Vec<QuestionConfig>,

    #[serde(default)]
    pub prompt_templates: PromptTemplates,
}

/// Endpoint de chat completions e parâmetros da requisição.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// URL completa do endpoint (ex.: `https://api.groq.com/openai/v1/chat/completions`).
    pub url: String,

    /// Chave da API; sobrescrita pelas variáveis de ambiente.
    #[serde(default)]
    pub api_key: String,

    /// Modelos sorteados a cada tentativa.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Timeout da primeira tentativa, em segundos.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Mensagem de sistema enviada antes do prompt.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

/// Parâmetros da avaliação.
#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentConfig {
    #[serde(default = "default_assessment_name")]
    pub name: String,

    /// Número de rodadas independentes de correção.
    #[serde(default = "default_llm_attempts")]
    pub llm_attempts: u32,

    /// `highest`, `lowest` ou `average`.
    #[serde(default = "default_selection_criteria")]
    pub selection_criteria: String,

    /// Usa o cabeçalho detalhado em vez do conciso.
    #[serde(default)]
    pub detailed_feedback: bool,
}

/// Paralelismo e saída.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Máximo de correções simultâneas.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Intervalo entre ondas de `parallel_threads` correções, em segundos.
    #[serde(default = "default_wave_delay_secs")]
    pub wave_delay_secs: u64,

    /// Diretório do estado salvo e dos arquivos de feedback.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Uma questão da avaliação.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionConfig {
    /// Prefixo do arquivo entregue (ex.: `Q1`).
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub max_points: f64,

    /// Extensões aceitas, testadas em ordem (ex.: `[".java", ".py"]`).
    #[serde(default = "default_extensions")]
    pub accepted_extensions: Vec<String>,

    /// Critérios de correção enviados ao modelo.
    #[serde(default)]
    pub rubric: String,
}

/// Templates do prompt. Placeholders entre chaves, ex.: `{code}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplates {
    #[serde(default = "default_header_detailed")]
    pub header_detailed: String,

    #[serde(default = "default_header_concise")]
    pub header_concise: String,

    #[serde(default = "default_question_block")]
    pub question_block: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_models() -> Vec<String> {
    vec![crate::llm::transport::FALLBACK_MODEL.to_string()]
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_system_prompt() -> String {
    "You are an efficient and rigorous code grader.".to_string()
}

fn default_assessment_name() -> String {
    "Assessment".to_string()
}

fn default_llm_attempts() -> u32 {
    1
}

fn default_selection_criteria() -> String {
    "highest".to_string()
}

fn default_parallel_threads() -> usize {
    4
}

fn default_wave_delay_secs() -> u64 {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_extensions() -> Vec<String> {
    vec![".java".to_string(), ".py".to_string()]
}

fn default_header_detailed() -> String {
    "You are grading the assessment \"{assessment_name}\" ({current_date}).\n\
     For every question below, explain in detail what is correct, what is wrong and how to fix it.\n\
     For each question write a line exactly in the form QUESTAO_<id>: <score>/<max_points>.\n\
     End with a line NOTA FINAL: <sum of all scores>.\n"
        .to_string()
}

fn default_header_concise() -> String {
    "You are grading the assessment \"{assessment_name}\" ({current_date}).\n\
     Give short, objective feedback for every question below.\n\
     For each question write a line exactly in the form QUESTAO_<id>: <score>/<max_points>.\n\
     End with a line NOTA FINAL: <sum of all scores>.\n"
        .to_string()
}

fn default_question_block() -> String {
    "\n## {question_id} - {question_name} ({max_points} points)\n\
     ### Rubric\n{rubric}\n\
     ### Student code\n```\n{code}\n```\n"
        .to_string()
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            wave_delay_secs: default_wave_delay_secs(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            header_detailed: default_header_detailed(),
            header_concise: default_header_concise(),
            question_block: default_question_block(),
        }
    }
}

impl GraderConfig {
    /// Carrega e valida a configuração de `path`. A ausência do arquivo é fatal.
    pub fn load(path: &Path) -> Result<Self, GraderError> {
        if !path.exists() {
            return Err(GraderError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;

        // Variável de ambiente tem precedência sobre o arquivo para a chave da API.
        if let Some(key) = api_key_from_env() {
            config.api.api_key = key;
        }

        Ok(config)
    }

    /// Desserializa e valida um documento TOML, sem consultar o ambiente.
    pub fn parse(contents: &str) -> Result<Self, GraderError> {
        let mut config: GraderConfig = toml::from_str(contents)?;
        if config.api.models.is_empty() {
            config.api.models = default_models();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), GraderError> {
        if self.api.url.trim().is_empty() {
            return Err(GraderError::Config("'api.url' must not be empty".into()));
        }
        if self.questions.is_empty() {
            return Err(GraderError::Config("at least one [[questions]] entry is required".into()));
        }
        if let Some(q) = self.questions.iter().find(|q| q.id.trim().is_empty()) {
            return Err(GraderError::Config(format!(
                "question '{}' has an empty id",
                q.name
            )));
        }
        if self.assessment.llm_attempts == 0 {
            return Err(GraderError::Config("'assessment.llm_attempts' must be at least 1".into()));
        }
        if self.processing.parallel_threads == 0 {
            return Err(GraderError::Config(
                "'processing.parallel_threads' must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Política de seleção; valores desconhecidos caem para `highest` com um aviso.
    pub fn selection_policy(&self) -> SelectionPolicy {
        match self.assessment.selection_criteria.parse() {
            Ok(policy) => policy,
            Err(_) => {
                warn!(
                    "invalid selection criteria '{}', using 'highest'",
                    self.assessment.selection_criteria
                );
                SelectionPolicy::Highest
            }
        }
    }

    /// Chave da API, se configurada.
    pub fn credential(&self) -> Option<&str> {
        let key = self.api.api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Caminho do estado salvo entre rodadas.
    pub fn state_file(&self) -> PathBuf {
        self.processing.output_dir.join("processing_state.json")
    }
}

fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [api]
        url = "https://api.example.com/v1/chat/completions"

        [assessment]
        name = "Lista 1"

        [[questions]]
        id = "Q1"
    "#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = GraderConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.api.models, vec!["llama-3.1-8b-instant"]);
        assert_eq!(config.api.timeout_secs, 120);
        assert_eq!(config.api.max_tokens, 4000);
        assert_eq!(config.assessment.llm_attempts, 1);
        assert_eq!(config.selection_policy(), SelectionPolicy::Highest);
        assert_eq!(config.processing.parallel_threads, 4);
        assert_eq!(config.processing.wave_delay_secs, 2);
        assert_eq!(config.questions[0].accepted_extensions, vec![".java", ".py"]);
        assert!(config.prompt_templates.question_block.contains("{code}"));
        assert!(config.credential().is_none());
    }

    #[test]
    fn full_config_deserializes() {
        let toml_str = r#"
            log_level = "debug"

            [api]
            url = "https://api.example.com/v1/chat/completions"
            api_key = "sk-file"
            models = ["m1", "m2"]
            timeout_secs = 60

            [assessment]
            name = "Prova 2"
            llm_attempts = 3
            selection_criteria = "Average"
            detailed_feedback = true

            [processing]
            parallel_threads = 8
            output_dir = "out"

            [[questions]]
            id = "Q1"
            name = "Soma"
            max_points = 2.5
            accepted_extensions = [".c"]
            rubric = "correct sum"

            [[questions]]
            id = "Q2"

            [prompt_templates]
            question_block = "{question_id}: {code}"
        "#;
        let config = GraderConfig::parse(toml_str).unwrap();
        assert_eq!(config.api.models, vec!["m1", "m2"]);
        assert_eq!(config.assessment.llm_attempts, 3);
        assert_eq!(config.selection_policy(), SelectionPolicy::Average);
        assert!(config.assessment.detailed_feedback);
        assert_eq!(config.processing.parallel_threads, 8);
        assert_eq!(config.processing.wave_delay_secs, 2);
        assert_eq!(config.state_file(), PathBuf::from("out/processing_state.json"));
        assert_eq!(config.questions.len(), 2);
        assert_eq!(config.questions[0].max_points, 2.5);
        assert_eq!(config.prompt_templates.question_block, "{question_id}: {code}");
        assert!(config.prompt_templates.header_concise.contains("{assessment_name}"));
        assert_eq!(config.credential(), Some("sk-file"));
    }

    #[test]
    fn missing_required_sections_fail() {
        let no_api = r#"
            [assessment]
            [[questions]]
            id = "Q1"
        "#;
        assert!(matches!(GraderConfig::parse(no_api), Err(GraderError::Toml(_))));

        let no_questions = r#"
            [api]
            url = "u"
            [assessment]
        "#;
        assert!(GraderConfig::parse(no_questions).is_err());

        let no_url = r#"
            [api]
            [assessment]
            [[questions]]
            id = "Q1"
        "#;
        assert!(GraderConfig::parse(no_url).is_err());
    }

    #[test]
    fn zero_threads_or_attempts_rejected() {
        let zero_threads = format!("{MINIMAL}\n[processing]\nparallel_threads = 0\n");
        assert!(matches!(GraderConfig::parse(&zero_threads), Err(GraderError::Config(_))));

        let zero_attempts = MINIMAL.replace("name = \"Lista 1\"", "llm_attempts = 0");
        assert!(matches!(GraderConfig::parse(&zero_attempts), Err(GraderError::Config(_))));
    }

    #[test]
    fn empty_model_list_gets_default() {
        let config = GraderConfig::parse(&MINIMAL.replace(
            "url = \"https://api.example.com/v1/chat/completions\"",
            "url = \"u\"\nmodels = []",
        ))
        .unwrap();
        assert_eq!(config.api.models, vec!["llama-3.1-8b-instant"]);
    }

    #[test]
    fn unknown_policy_falls_back_to_highest() {
        let config = GraderConfig::parse(&MINIMAL.replace(
            "name = \"Lista 1\"",
            "selection_criteria = \"median\"",
        ))
        .unwrap();
        assert_eq!(config.selection_policy(), SelectionPolicy::Highest);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = GraderConfig::load(Path::new("/definitely/not/here/grader.toml")).unwrap_err();
        assert!(matches!(err, GraderError::Config(_)));
    }
}
