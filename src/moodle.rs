//! Notas de referência do Moodle (VPL) lidas de `execution.txt`.
//!
//! O arquivo fica na sub-pasta `.ceg` mais recente do aluno ou, se não há
//! nenhuma, direto na pasta do aluno. Cada questão aparece como uma linha
//! `- Question N:` seguida, mais adiante, de um percentual `(xx%)`; a nota
//! global vem na linha `Grade :=>> x`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::QuestionConfig;

const EXECUTION_FILE: &str = "execution.txt";
const CEG_SUFFIX: &str = ".ceg";

/// Notas do Moodle de um aluno. Vazio quando não há `execution.txt`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodleGrades {
    /// Questão (`Q1`, `Q2`, ...) → percentual de acerto.
    pub percent: BTreeMap<String, f64>,
    /// Percentual convertido em pontos com `max_points` da questão.
    pub points: BTreeMap<String, f64>,
    /// Valor da linha `Grade :=>>`, quando presente.
    pub final_grade: Option<f64>,
}

impl MoodleGrades {
    pub fn is_empty(&self) -> bool {
        self.percent.is_empty() && self.final_grade.is_none()
    }

    /// Soma dos pontos por questão.
    pub fn total_points(&self) -> f64 {
        self.points.values().sum()
    }
}

pub struct ExecutionParser {
    question: Regex,
    percent: Regex,
    grade: Regex,
}

impl ExecutionParser {
    pub fn new() -> Self {
        Self {
            question: Regex::new(r"(?i)-\s*Question\s*(\d+):").expect("question pattern is valid"),
            percent: Regex::new(r"\(([0-9]+(?:\.[0-9]+)?)%\)").expect("percent pattern is valid"),
            grade: Regex::new(r"Grade\s*:=>>\s*([0-9]+(?:\.[0-9]+)?)").expect("grade pattern is valid"),
        }
    }

    /// Lê as notas da pasta do aluno; arquivo ausente ou ilegível dá notas vazias.
    pub fn read(&self, student_dir: &Path, questions: &[QuestionConfig]) -> MoodleGrades {
        let Some(path) = find_execution_file(student_dir) else {
            return MoodleGrades::default();
        };
        match std::fs::read(&path) {
            Ok(bytes) => {
                let grades = self.parse(&String::from_utf8_lossy(&bytes), questions);
                debug!(file = %path.display(), questions = grades.percent.len(), "moodle grades read");
                grades
            }
            Err(e) => {
                warn!(file = %path.display(), "could not read execution file: {e}");
                MoodleGrades::default()
            }
        }
    }

    /// Percentual de uma questão só é aceito depois do seu cabeçalho e
    /// antes do cabeçalho seguinte.
    pub fn parse(&self, text: &str, questions: &[QuestionConfig]) -> MoodleGrades {
        let mut percent = BTreeMap::new();
        let mut final_grade = None;
        let mut current: Option<String> = None;

        for line in text.lines().map(str::trim) {
            if let Some(caps) = self.question.captures(line) {
                current = Some(format!("Q{}", &caps[1]));
                continue;
            }
            if let Some(question) = current.as_ref() {
                if let Some(value) = self.percent.captures(line).and_then(|c| c[1].parse::<f64>().ok()) {
                    percent.insert(question.clone(), value);
                    current = None;
                }
            }
            if let Some(value) = self.grade.captures(line).and_then(|c| c[1].parse::<f64>().ok()) {
                final_grade = Some(value);
            }
        }

        MoodleGrades {
            points: percent_to_points(&percent, questions),
            percent,
            final_grade,
        }
    }
}

impl Default for ExecutionParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Pontos = percentual / 100 × `max_points`, com duas casas. Questões fora
/// da configuração são ignoradas.
pub fn percent_to_points(
    percent: &BTreeMap<String, f64>,
    questions: &[QuestionConfig],
) -> BTreeMap<String, f64> {
    percent
        .iter()
        .filter_map(|(id, pct)| {
            let question = questions.iter().find(|q| &q.id == id)?;
            let points = (pct / 100.0 * question.max_points * 100.0).round() / 100.0;
            Some((id.clone(), points))
        })
        .collect()
}

/// `execution.txt` da pasta `.ceg` mais recente, ou da própria pasta do
/// aluno quando não existe nenhuma `.ceg`.
fn find_execution_file(student_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(student_dir).ok()?;
    let mut newest_ceg: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let is_ceg = path.is_dir()
            && path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(CEG_SUFFIX));
        if !is_ceg {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if newest_ceg.as_ref().is_none_or(|(best, _)| modified > *best) {
            newest_ceg = Some((modified, path));
        }
    }

    let file = match newest_ceg {
        Some((_, dir)) => dir.join(EXECUTION_FILE),
        None => student_dir.join(EXECUTION_FILE),
    };
    file.is_file().then_some(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    const EXECUTION: &str = "\
Compilation OK
- Question 1: soma
  Test 1 ... ok
  Summary of tests (100%)
- Question 2: par ou impar
  Test 1 ... failed
  Summary of tests (37.5%)
- Question 3: sem percentual
Grade :=>> 6.9
";

    fn questions() -> Vec<QuestionConfig> {
        [("Q1", 5.0), ("Q2", 4.0)]
            .iter()
            .map(|(id, max)| QuestionConfig {
                id: id.to_string(),
                name: id.to_string(),
                max_points: *max,
                accepted_extensions: vec![".py".into()],
                rubric: String::new(),
            })
            .collect()
    }

    #[test]
    fn parses_percentages_and_final_grade() {
        let grades = ExecutionParser::new().parse(EXECUTION, &questions());
        assert_eq!(grades.percent.len(), 2);
        assert_eq!(grades.percent["Q1"], 100.0);
        assert_eq!(grades.percent["Q2"], 37.5);
        assert_eq!(grades.final_grade, Some(6.9));
        assert_eq!(grades.points["Q1"], 5.0);
        assert_eq!(grades.points["Q2"], 1.5);
        assert_eq!(grades.total_points(), 6.5);
    }

    #[test]
    fn percentage_before_any_question_is_ignored() {
        let grades = ExecutionParser::new().parse("(80%)\n- Question 1:\n(50%)\n(90%)", &questions());
        assert_eq!(grades.percent.len(), 1);
        assert_eq!(grades.percent["Q1"], 50.0);
    }

    #[test]
    fn conversion_rounds_and_skips_unknown_questions() {
        let mut percent = BTreeMap::new();
        percent.insert("Q2".to_string(), 12.345);
        percent.insert("Q9".to_string(), 100.0);
        let points = percent_to_points(&percent, &questions());
        assert_eq!(points.len(), 1);
        assert_eq!(points["Q2"], 0.49);
    }

    #[test]
    fn reads_from_newest_ceg_folder() {
        let student = tempfile::tempdir().unwrap();
        let old = student.path().join("old.ceg");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join(EXECUTION_FILE), "- Question 1:\n(10%)").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let new = student.path().join("new.ceg");
        fs::create_dir_all(&new).unwrap();
        fs::write(new.join(EXECUTION_FILE), "- Question 1:\n(60%)").unwrap();
        // direct file is ignored when a .ceg folder exists
        fs::write(student.path().join(EXECUTION_FILE), "- Question 1:\n(99%)").unwrap();

        let grades = ExecutionParser::new().read(student.path(), &questions());
        assert_eq!(grades.percent["Q1"], 60.0);
        assert_eq!(grades.points["Q1"], 3.0);
    }

    #[test]
    fn reads_direct_file_without_ceg_folder() {
        let student = tempfile::tempdir().unwrap();
        fs::create_dir_all(student.path().join("2025-08-27-09-17-50")).unwrap();
        fs::write(student.path().join(EXECUTION_FILE), "- Question 2:\n(50%)\nGrade :=>> 2").unwrap();

        let grades = ExecutionParser::new().read(student.path(), &questions());
        assert_eq!(grades.percent["Q2"], 50.0);
        assert_eq!(grades.points["Q2"], 2.0);
        assert_eq!(grades.final_grade, Some(2.0));
    }

    #[test]
    fn missing_file_gives_empty_grades() {
        let student = tempfile::tempdir().unwrap();
        fs::create_dir_all(student.path().join("only.ceg")).unwrap();

        let grades = ExecutionParser::new().read(student.path(), &questions());
        assert!(grades.is_empty());
        assert!(grades.points.is_empty());
        assert!(ExecutionParser::new().read(Path::new("/no/such/student"), &questions()).is_empty());
    }
}
