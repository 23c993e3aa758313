//! Persistência do estado entre rodadas (JSON em `processing_state.json`).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::GraderError;
use crate::grading::Submission;

/// Gancho de checkpoint chamado ao fim de cada rodada e da execução.
pub trait Checkpoint {
    fn save(&self, submissions: &[Submission]) -> Result<(), GraderError>;
}

/// Salva a lista de submissões como JSON formatado.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Estado salvo, ou `None` se ainda não existe.
    pub fn load(&self) -> Result<Option<Vec<Submission>>, GraderError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let submissions = serde_json::from_str(&contents)?;
        Ok(Some(submissions))
    }
}

impl Checkpoint for JsonStateStore {
    fn save(&self, submissions: &[Submission]) -> Result<(), GraderError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(submissions)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), count = submissions.len(), "state saved");
        Ok(())
    }
}
