//! Interface de terminal do corretor: barra de progresso por rodada e
//! relatórios coloridos.
//!
//! Usa `indicatif` para a barra de progresso e `console` para as cores.
//! As barras ficam num [`MultiProgress`] compartilhado com o log do
//! terminal: [`LogWriter`] apaga as barras, escreve a linha e redesenha.

use std::io::{self, Write};

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::grading::{Submission, SubmissionStatus};
use crate::report::{ComparisonReport, RunReport};

/// Escritor de log que suspende as barras de progresso durante a escrita.
#[derive(Clone)]
pub struct LogWriter<F> {
    multi: MultiProgress,
    make: F,
}

impl LogWriter<fn() -> io::Stderr> {
    pub fn stderr(multi: MultiProgress) -> Self {
        Self {
            multi,
            make: io::stderr,
        }
    }
}

impl<F, W> LogWriter<F>
where
    F: Fn() -> W,
    W: Write,
{
    #[cfg(test)]
    pub fn new(multi: MultiProgress, make: F) -> Self {
        Self { multi, make }
    }
}

impl<F, W> Write for LogWriter<F>
where
    F: Fn() -> W,
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let make = &self.make;
        self.multi.suspend(|| make().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let make = &self.make;
        self.multi.suspend(|| {
            let mut out = make();
            out.write_all(buf)?;
            out.flush()
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        (self.make)().flush()
    }
}

impl<'a, F, W> MakeWriter<'a> for LogWriter<F>
where
    F: Fn() -> W + Clone,
    W: Write,
{
    type Writer = LogWriter<F>;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Barra de progresso de uma rodada de correção.
pub struct RoundProgress {
    pb: ProgressBar,
}

impl RoundProgress {
    /// Inicia a barra para `total` submissões da rodada `round` de `rounds`.
    pub fn start(multi: &MultiProgress, round: u32, rounds: u32, total: usize) -> Self {
        let pb = multi.add(ProgressBar::new(total as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_prefix(format!("Round {round}/{rounds}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    /// Barra que não desenha nada (testes e saída não interativa).
    pub fn hidden() -> Self {
        let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        Self { pb }
    }

    /// Registra o fim do job de um aluno.
    pub fn job_done(&self, student: &str, graded: bool) {
        let mark = if graded {
            Style::new().green().apply_to("✓")
        } else {
            Style::new().red().apply_to("✗")
        };
        self.pb.set_message(format!("{mark} {student}"));
        self.pb.inc(1);
    }

    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Imprime o relatório final da execução.
pub fn print_report(report: &RunReport) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();

    println!();
    println!("{}", Style::new().bold().apply_to("─── Final Report ───"));
    println!("  Students:     {}", report.total);
    println!("  {} Graded:     {}", green.apply_to("✓"), report.graded);
    println!("  {} Failed:     {}", red.apply_to("✗"), report.failed.len());
    println!("  Success rate: {:.1}%", report.success_rate());

    if !report.failed.is_empty() {
        println!();
        println!("{}", yellow.apply_to("Students without any evaluation:"));
        for failed in &report.failed {
            println!(
                "  - {} ({}), {} API call(s)",
                failed.name, failed.login, failed.api_calls
            );
        }
    }
}

/// Imprime a comparação entre as notas da IA e as do Moodle.
pub fn print_comparison(comparison: &ComparisonReport) {
    println!();
    println!("{}", Style::new().bold().apply_to("─── AI vs. Moodle ───"));
    print!("{}", comparison.render());
}

/// Imprime a tabela de status a partir do estado salvo.
pub fn print_status(submissions: &[Submission]) {
    let green = Style::new().green();
    let red = Style::new().red();
    let dim = Style::new().dim();

    println!(
        "{:<32} {:<16} {:>8} {:>6} {:>9}",
        "STUDENT", "LOGIN", "STATUS", "GRADE", "ATTEMPTS"
    );
    for sub in submissions {
        let status = match sub.status {
            SubmissionStatus::Graded => green.apply_to(format!("{:>8}", sub.status)),
            SubmissionStatus::Failed => red.apply_to(format!("{:>8}", sub.status)),
            SubmissionStatus::Pending => dim.apply_to(format!("{:>8}", sub.status)),
        };
        println!(
            "{:<32} {:<16} {} {:>6.2} {:>9}",
            sub.name,
            sub.login,
            status,
            sub.final_grade,
            sub.history().len()
        );
    }
}
