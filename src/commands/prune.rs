use anyhow::Result;
use clap::Parser;
use log::info;
use rayon::prelude::*;
use std::path::PathBuf;

use intron_cutter::{
    output::{create_table_file, cut_rows, write_intron_table},
    prior::IntronLengthPrior,
    resolver::{OverlapResolver, ResolutionSummary},
    tables::{read_rows_concat, IntronRow},
    types::{CutDecision, PriorSmoothing},
};

use super::{group_by_scaffold, validate_input_files};

/// Resolve overlapping positive introns into a cut table
#[derive(Parser)]
pub struct PruneCommand {
    /// Positive intron result tables (`scaffold;start;end`), one or more shards
    #[arg(short = 'i', long = "introns", value_name = "FILE", num_args = 1.., required = true)]
    introns: Vec<PathBuf>,

    /// Observed intron lengths, one integer per line
    #[arg(short = 'l', long = "lengths", value_name = "FILE")]
    lengths: PathBuf,

    /// Output cut table
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Length prior smoothing: frequency or kde
    #[arg(long = "prior", value_name = "MODE", default_value = "frequency")]
    prior: String,
}

impl PruneCommand {
    pub fn run(self) -> Result<()> {
        info!("Starting intron-cutter prune v{}", env!("CARGO_PKG_VERSION"));

        let mut inputs: Vec<_> = self.introns.iter().map(PathBuf::as_path).collect();
        inputs.push(self.lengths.as_path());
        validate_input_files(&inputs)?;

        let smoothing: PriorSmoothing = self.prior.parse()?;
        let prior = IntronLengthPrior::load(&self.lengths, smoothing)?;

        let table = read_rows_concat::<IntronRow, _>(&self.introns)?;
        info!("Loaded {} positive introns", table.rows.len());

        let groups = group_by_scaffold(table.rows, |row| row.scaffold.as_str());
        info!("Resolving overlaps on {} scaffolds in parallel", groups.len());

        let resolver = OverlapResolver::new(&prior);
        let resolved: Vec<(Vec<CutDecision>, ResolutionSummary)> = groups
            .par_iter()
            .map(|(scaffold_id, rows)| {
                let intervals: Vec<(usize, usize)> =
                    rows.iter().map(|row| (row.start, row.end)).collect();
                resolver.resolve_intervals(scaffold_id, &intervals)
            })
            .collect();

        let mut summary = ResolutionSummary::default();
        let mut cuts = Vec::new();
        for (scaffold_cuts, scaffold_summary) in resolved {
            summary.merge(&scaffold_summary);
            cuts.extend(scaffold_cuts);
        }

        let written = write_intron_table(create_table_file(&self.output)?, &cut_rows(&cuts))?;
        info!("Overlap resolution complete: {}", summary);
        info!("Wrote {} cuts to {}", written, self.output.display());
        Ok(())
    }
}
