//! `probr run` command handler
//!
//! Registers the built-in service packs, runs the selected probes one at a
//! time on a blocking task, writes raw runner output if requested, prints the
//! summary and returns the aggregate exit code.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use probr_core::config::ProbrConfig;
use probr_core::registry::ProbeRegistry;
use probr_core::summary::{Classification, ProbeSummary, RunAudit, SummaryReport};

use crate::cli::{OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Results shorter than this carry no report worth keeping (e.g. `[]\n`).
const MIN_RESULT_LEN: usize = 4;

/// Execute the `run` command and return the process exit code.
pub async fn execute(
    args: RunArgs,
    mut config: ProbrConfig,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    if let Some(dir) = args.output_dir {
        config.runner.output_dir = dir.display().to_string();
        config.validate()?;
    }

    let registry = super::build_registry(&config)?;
    for name in &args.probes {
        registry.get(name)?;
    }

    // audit directory problems surface before the first probe runs
    let run = RunAudit::new(config.audit.clone(), config.summary.enabled)?;
    let count = registry.len()?;
    info!(run_id = %run.run_id(), probes = count, "starting probe run");

    let selected = args.probes;
    let (registry, run, result) = tokio::task::spawn_blocking(move || {
        let mut run = run;
        let result = if selected.is_empty() {
            registry.execute_all(&mut run)
        } else {
            registry.execute_selected(&selected, &mut run)
        };
        (registry, run, result)
    })
    .await
    .map_err(|e| CliError::Command(format!("probe run task failed: {}", e)))?;
    let exit_code = result?;

    if !config.runner.output_dir.is_empty() {
        let written = write_results(&registry, Path::new(&config.runner.output_dir)).await?;
        info!(count = written.len(), dir = %config.runner.output_dir, "probe results written");
    }

    if run.summary_enabled() {
        match writer.format() {
            OutputFormat::Json => run.print_summary()?,
            OutputFormat::Text => writer.render(&run.report())?,
        }
    }

    let report = run.finalize();
    info!(
        exit_code,
        status = %report.status,
        passed = report.passed,
        failed = report.failed,
        skipped = report.skipped,
        "probe run complete"
    );
    Ok(exit_code)
}

/// Write every probe's raw runner output to `<dir>/<probe>.json`.
///
/// Outputs shorter than a minimal report are skipped.
pub async fn write_results(registry: &ProbeRegistry, dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut written = Vec::new();
    for (name, output) in registry.all_results()? {
        if output.trim().len() < MIN_RESULT_LEN {
            warn!(probe = %name, "probe output too short, not written");
            continue;
        }
        let path = dir.join(format!("{}.json", name));
        tokio::fs::write(&path, output.as_bytes()).await?;
        written.push(path);
    }
    Ok(written)
}

impl Render for SummaryReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Probe Run {}", self.run_id.dimmed())?;
        writeln!(w)?;
        writeln!(
            w,
            "  {:<12} {:<28} {:<20} {:>9} {:>6}",
            "PACK", "PROBE", "RESULT", "SCENARIOS", "FAILED"
        )?;
        for probe in &self.probes {
            writeln!(
                w,
                "  {:<12} {:<28} {:<20} {:>9} {:>6}",
                probe.service_pack.to_string(),
                probe.name,
                colored_result(probe),
                probe.scenarios_attempted,
                probe.scenarios_failed
            )?;
        }
        writeln!(w)?;

        let status = if self.failed == 0 {
            self.status.green().bold()
        } else {
            self.status.red().bold()
        };
        writeln!(w, "Status: {}", status)?;
        writeln!(
            w,
            "Passed: {}  Failed: {}  Skipped: {}",
            self.passed, self.failed, self.skipped
        )?;

        let failed: Vec<&str> = self
            .probes
            .iter()
            .filter(|p| p.classification == Some(Classification::Failed))
            .map(|p| p.name.as_str())
            .collect();
        if !failed.is_empty() {
            writeln!(w, "Failed probes: {}", failed.join(", ").red())?;
        }
        for probe in &self.probes {
            if let Some(ref err) = probe.error {
                writeln!(w, "  {}: {}", probe.name, err.red())?;
            }
        }
        Ok(())
    }
}

fn colored_result(probe: &ProbeSummary) -> colored::ColoredString {
    use colored::Colorize;

    match probe.classification {
        Some(Classification::Passed) => probe.result.green(),
        Some(Classification::Failed) => probe.result.red(),
        Some(Classification::Skipped) | None => probe.result.yellow(),
    }
}
