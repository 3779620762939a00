//! `probr list` command handler

use std::io::Write;

use serde::Serialize;

use probr_core::config::ProbrConfig;
use probr_core::registry::ProbeListing;
use probr_core::types::ProbeStatus;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(config: &ProbrConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let registry = super::build_registry(config)?;
    let report = ProbeListReport::from_listings(registry.list()?);
    writer.render(&report)?;
    Ok(())
}

/// Registered probes with their current status.
#[derive(Debug, Serialize)]
pub struct ProbeListReport {
    pub total: usize,
    pub excluded: usize,
    pub probes: Vec<ProbeRow>,
}

#[derive(Debug, Serialize)]
pub struct ProbeRow {
    pub service_pack: String,
    pub name: String,
    pub status: ProbeStatus,
}

impl ProbeListReport {
    pub fn from_listings(listings: Vec<ProbeListing>) -> Self {
        let probes: Vec<ProbeRow> = listings
            .into_iter()
            .map(|l| ProbeRow {
                service_pack: l.descriptor.service_pack.to_string(),
                name: l.descriptor.name,
                status: l.status,
            })
            .collect();
        let excluded = probes
            .iter()
            .filter(|p| p.status == ProbeStatus::Excluded)
            .count();

        Self {
            total: probes.len(),
            excluded,
            probes,
        }
    }
}

impl Render for ProbeListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Probes: {} registered, {} excluded",
            self.total.to_string().bold(),
            self.excluded
        )?;
        if self.probes.is_empty() {
            return Ok(());
        }

        writeln!(w)?;
        writeln!(w, "  {:<12} {:<28} {:<10}", "PACK", "PROBE", "STATUS")?;
        for probe in &self.probes {
            let status = match probe.status {
                ProbeStatus::Excluded => "excluded".yellow(),
                _ => "enabled".green(),
            };
            writeln!(
                w,
                "  {:<12} {:<28} {:<10}",
                probe.service_pack, probe.name, status
            )?;
        }
        Ok(())
    }
}
