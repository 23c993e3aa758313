use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How the results of several rounds are reduced to one grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Keep the best grading.
    #[default]
    Highest,
    /// Keep the worst grading.
    Lowest,
    /// Mean of all gradings; feedback from the one closest to the mean.
    Average,
}

impl SelectionPolicy {
    /// Upper-case label used in feedback files.
    pub fn label(&self) -> &'static str {
        match self {
            SelectionPolicy::Highest => "HIGHEST",
            SelectionPolicy::Lowest => "LOWEST",
            SelectionPolicy::Average => "AVERAGE",
        }
    }

    /// Which record the displayed feedback refers to.
    pub fn describes(&self) -> &'static str {
        match self {
            SelectionPolicy::Highest => "the attempt with the HIGHEST grade",
            SelectionPolicy::Lowest => "the attempt with the LOWEST grade",
            SelectionPolicy::Average => "the attempt whose grade is CLOSEST TO THE AVERAGE",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Highest => write!(f, "highest"),
            SelectionPolicy::Lowest => write!(f, "lowest"),
            SelectionPolicy::Average => write!(f, "average"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "highest" => Ok(SelectionPolicy::Highest),
            "lowest" => Ok(SelectionPolicy::Lowest),
            "average" => Ok(SelectionPolicy::Average),
            other => Err(format!("unknown selection policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Highest".parse(), Ok(SelectionPolicy::Highest));
        assert_eq!(" LOWEST ".parse(), Ok(SelectionPolicy::Lowest));
        assert_eq!("average".parse(), Ok(SelectionPolicy::Average));
        assert!("median".parse::<SelectionPolicy>().is_err());
    }

    #[test]
    fn display_and_label() {
        assert_eq!(SelectionPolicy::Average.to_string(), "average");
        assert_eq!(SelectionPolicy::Lowest.label(), "LOWEST");
        assert_eq!(SelectionPolicy::default(), SelectionPolicy::Highest);
    }
}
