//! Finds the student submissions under a base directory.
//!
//! Layout expected (one folder per student, as exported by Moodle):
//!
//! ```text
//! base/
//!   Ana Lima - alima/
//!     2024-05-01 10h00/      <- newest non-.ceg sub-directory is graded
//!       Q1_soma.py
//!       Q2.java
//!     2024-05-01 10h00.ceg/  <- execution.txt with the Moodle grades
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::QuestionConfig;
use crate::error::GraderError;
use crate::grading::Submission;
use crate::moodle::ExecutionParser;

/// Suffix of sub-directories that never hold a gradeable submission.
const IGNORED_SUFFIX: &str = ".ceg";

/// One [`Submission`] per student folder that has at least one matched file,
/// sorted by folder name (case-insensitive).
pub fn discover(base_dir: &Path, questions: &[QuestionConfig]) -> Result<Vec<Submission>, GraderError> {
    if !base_dir.is_dir() {
        return Err(GraderError::Config(format!(
            "submissions directory not found: {}",
            base_dir.display()
        )));
    }

    let mut folders: Vec<PathBuf> = std::fs::read_dir(base_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    folders.sort_by_key(|path| folder_name(path).to_lowercase());

    let moodle = ExecutionParser::new();
    let mut submissions = Vec::new();
    for folder in folders {
        let dir_name = folder_name(&folder);
        let Some((name, login)) = parse_student_folder(&dir_name) else {
            warn!(folder = %dir_name, "folder name is not '<Name> - <login>', skipping");
            continue;
        };

        let Some(latest) = latest_submission_dir(&folder)? else {
            warn!(student = name, "no submission directory found, skipping");
            continue;
        };

        let files = match_question_files(&latest, questions);
        if files.is_empty() {
            warn!(student = name, dir = %latest.display(), "no question files found, skipping");
            continue;
        }

        debug!(student = name, files = files.len(), "submission found");
        let mut submission = Submission::new(name, login, latest, files);
        submission.moodle = moodle.read(&folder, questions);
        submissions.push(submission);
    }

    info!(count = submissions.len(), base = %base_dir.display(), "submissions discovered");
    Ok(submissions)
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Split `"<Name> - <login>"` on the last separator.
fn parse_student_folder(dir_name: &str) -> Option<(&str, &str)> {
    let (name, login) = dir_name.rsplit_once(" - ")?;
    let (name, login) = (name.trim(), login.trim());
    if name.is_empty() || login.is_empty() {
        return None;
    }
    Some((name, login))
}

/// Most recently modified sub-directory not ending in `.ceg`.
fn latest_submission_dir(student_dir: &Path) -> Result<Option<PathBuf>, GraderError> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(student_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || folder_name(&path).ends_with(IGNORED_SUFFIX) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().is_none_or(|(best, _)| modified > *best) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

/// Question id → first file matching `<id>*<ext>`, extensions in order.
fn match_question_files(dir: &Path, questions: &[QuestionConfig]) -> BTreeMap<String, PathBuf> {
    let mut files = BTreeMap::new();
    for question in questions {
        let found = question.accepted_extensions.iter().find_map(|ext| {
            let pattern = dir.join(format!(
                "{}*{}",
                glob::Pattern::escape(&question.id),
                glob::Pattern::escape(ext)
            ));
            let mut matches: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
                .ok()?
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            matches.sort();
            matches.into_iter().next()
        });
        if let Some(path) = found {
            files.insert(question.id.clone(), path);
        }
    }
    files
}
