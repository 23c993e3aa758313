//! Interface de linha de comando do corretor baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (grade, status)
//! e flags globais (--config, --attempts, --policy, --threads, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::grading::SelectionPolicy;

/// Corretor automático de submissões com múltiplas rodadas de LLM.
#[derive(Debug, Parser)]
#[command(name = "multigrade", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração TOML.
    #[arg(long, short, global = true, default_value = "grader.toml")]
    pub config: PathBuf,

    /// Arquivo .env carregado antes de ler as variáveis de ambiente.
    #[arg(long, global = true, default_value = "config/config.env")]
    pub env_file: PathBuf,

    /// Número de rodadas de correção (sobrescreve `assessment.llm_attempts`).
    #[arg(long, global = true)]
    pub attempts: Option<u32>,

    /// Política de seleção da nota final.
    #[arg(long, global = true, value_enum)]
    pub policy: Option<SelectionPolicy>,

    /// Correções simultâneas (sobrescreve `processing.parallel_threads`).
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Não desenha as barras de progresso (saída redirecionada, CI).
    #[arg(long, global = true, default_value_t = false)]
    pub no_progress: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Corrige as submissões encontradas no diretório.
    Grade {
        /// Diretório com uma pasta por aluno.
        submissions_dir: PathBuf,

        /// Continua a partir do estado salvo em vez de redescobrir as submissões.
        #[arg(long)]
        resume: bool,
    },

    /// Mostra o estado salvo da última execução.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_grade_subcommand() {
        let cli = Cli::parse_from(["multigrade", "grade", "submissions"]);
        match cli.command {
            Command::Grade {
                submissions_dir,
                resume,
            } => {
                assert_eq!(submissions_dir, PathBuf::from("submissions"));
                assert!(!resume);
            }
            _ => panic!("expected Grade command"),
        }
        assert_eq!(cli.config, PathBuf::from("grader.toml"));
        assert_eq!(cli.env_file, PathBuf::from("config/config.env"));
        assert!(!cli.no_progress);
    }

    #[test]
    fn cli_parses_no_progress_flag() {
        let cli = Cli::parse_from(["multigrade", "grade", "subs", "--no-progress"]);
        assert!(cli.no_progress);
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "multigrade",
            "--config",
            "other.toml",
            "--attempts",
            "3",
            "--policy",
            "average",
            "--threads",
            "8",
            "--verbose",
            "grade",
            "subs",
            "--resume",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.attempts, Some(3));
        assert_eq!(cli.policy, Some(SelectionPolicy::Average));
        assert_eq!(cli.threads, Some(8));
        assert!(matches!(cli.command, Command::Grade { resume: true, .. }));
    }

    #[test]
    fn cli_parses_status_subcommand() {
        let cli = Cli::parse_from(["multigrade", "status", "-c", "x.toml"]);
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
