use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use intron_cutter::{
    oracle::{resolve_oracle, OracleRole, OracleSpec},
    output::{create_table_file, cut_rows, intron_rows, write_intron_table},
    pipeline::{IntronPipeline, Oracles},
    prior::IntronLengthPrior,
    types::{OrphanFilterMode, PriorSmoothing},
};

use super::{parse_strands, validate_input_files, GeometryArgs};

/// Run scanning, classification, pairing and overlap resolution in one pass
#[derive(Parser)]
pub struct RunCommand {
    /// Input FASTA file containing the assembly
    #[arg(short = 'f', long = "fasta", value_name = "FILE")]
    fasta_file: PathBuf,

    /// Observed intron lengths, one integer per line
    #[arg(short = 'l', long = "lengths", value_name = "FILE")]
    lengths: PathBuf,

    /// Output cut table
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Also write every positive intron before overlap resolution
    #[arg(long = "introns-output", value_name = "FILE")]
    introns_output: Option<PathBuf>,

    /// Strands to process: +, - or both
    #[arg(short = 's', long = "strand", value_name = "STRAND", default_value = "both")]
    strand: String,

    /// Orphan acceptor filter: candidates, classified or off
    #[arg(long = "orphan-filter", value_name = "MODE", default_value = "candidates")]
    orphan_filter: String,

    /// Length prior smoothing: frequency or kde
    #[arg(long = "prior", value_name = "MODE", default_value = "frequency")]
    prior: String,

    /// Donor model reference ("none" or "random" accepts every donor)
    #[arg(long = "donor-model", value_name = "MODEL")]
    donor_model: Option<String>,

    /// Acceptor model reference ("none" or "random" accepts every acceptor)
    #[arg(long = "acceptor-model", value_name = "MODEL")]
    acceptor_model: Option<String>,

    /// Intron model reference; without one the intron classification step is skipped
    #[arg(long = "intron-model", value_name = "MODEL")]
    intron_model: Option<String>,

    /// Precomputed positive donor tables
    #[arg(long = "donor-results", value_name = "FILE", num_args = 1..)]
    donor_results: Vec<PathBuf>,

    /// Precomputed positive acceptor tables
    #[arg(long = "acceptor-results", value_name = "FILE", num_args = 1..)]
    acceptor_results: Vec<PathBuf>,

    /// Precomputed positive intron tables
    #[arg(long = "intron-results", value_name = "FILE", num_args = 1..)]
    intron_results: Vec<PathBuf>,

    /// Classifier program, invoked as `<program> [args..] <model> <role>`
    #[arg(long = "classifier", value_name = "PROGRAM")]
    classifier: Option<PathBuf>,

    /// Extra argument for the classifier program (repeatable)
    #[arg(long = "classifier-arg", value_name = "ARG", allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    #[command(flatten)]
    geometry: GeometryArgs,
}

impl RunCommand {
    fn oracle_spec(&self, model: Option<&str>, results: &[PathBuf]) -> OracleSpec {
        OracleSpec {
            model: model.map(str::to_string),
            program: self.classifier.clone(),
            program_args: self.classifier_args.clone(),
            results: results.to_vec(),
        }
    }

    fn oracles(&self) -> Result<Oracles> {
        let donor = resolve_oracle(
            OracleRole::Donor,
            &self.oracle_spec(self.donor_model.as_deref(), &self.donor_results),
        )?;
        let acceptor = resolve_oracle(
            OracleRole::Acceptor,
            &self.oracle_spec(self.acceptor_model.as_deref(), &self.acceptor_results),
        )?;

        let intron_spec = self.oracle_spec(self.intron_model.as_deref(), &self.intron_results);
        let intron = if intron_spec.is_pass_through() {
            info!("No intron classifier configured; every paired intron is kept");
            None
        } else {
            Some(resolve_oracle(OracleRole::Intron, &intron_spec)?)
        };

        Ok(Oracles {
            donor,
            acceptor,
            intron,
        })
    }

    pub fn run(self) -> Result<()> {
        info!("Starting intron-cutter run v{}", env!("CARGO_PKG_VERSION"));
        info!("Input FASTA: {}", self.fasta_file.display());
        info!("Length observations: {}", self.lengths.display());
        info!("Output cuts: {}", self.output.display());

        let mut inputs = vec![self.fasta_file.as_path(), self.lengths.as_path()];
        inputs.extend(
            self.donor_results
                .iter()
                .chain(&self.acceptor_results)
                .chain(&self.intron_results)
                .map(PathBuf::as_path),
        );
        validate_input_files(&inputs)?;

        let mut config = self.geometry.config(parse_strands(&self.strand)?)?;
        config.orphan_filter = self.orphan_filter.parse::<OrphanFilterMode>()?;
        config.prior_smoothing = self.prior.parse::<PriorSmoothing>()?;
        info!(
            "Introns of {}-{} bp, orphan filter: {}, prior: {}",
            config.min_intron_length,
            config.max_intron_length,
            config.orphan_filter,
            config.prior_smoothing
        );

        // 1. Length prior
        info!("Step 1: Loading intron length prior");
        let prior = IntronLengthPrior::load(&self.lengths, config.prior_smoothing)?;

        // 2. Classifiers
        info!("Step 2: Setting up classifiers");
        let oracles = self.oracles()?;

        // 3. Per-scaffold pipeline
        info!("Step 3: Processing scaffolds");
        let pipeline = IntronPipeline::new(&config, &oracles, &prior)?;
        let outcome = pipeline.run_fasta(&self.fasta_file)?;

        // 4. Output
        info!("Step 4: Writing results");
        if let Some(path) = &self.introns_output {
            let introns: Vec<_> = outcome.positive_introns().cloned().collect();
            let written = write_intron_table(create_table_file(path)?, &intron_rows(&introns))?;
            info!("Wrote {} positive introns to {}", written, path.display());
        }

        let cuts: Vec<_> = outcome.cuts().cloned().collect();
        let written = write_intron_table(create_table_file(&self.output)?, &cut_rows(&cuts))?;
        info!("Overlap resolution: {}", outcome.summary.resolution);
        info!("Wrote {} cuts to {}", written, self.output.display());

        if !outcome.failures.is_empty() {
            anyhow::bail!(
                "{} of {} scaffolds failed; their cuts are missing from {}",
                outcome.failures.len(),
                outcome.failures.len() + outcome.reports.len(),
                self.output.display()
            );
        }

        info!("Intron detection completed successfully!");
        Ok(())
    }
}
