use anyhow::Result;
use clap::Parser;
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;

use intron_cutter::{
    fasta::{read_scaffolds, SequenceStats},
    logging::log_empty_stage,
    orphan::filter_orphan_acceptors,
    output::{create_table_file, site_rows, TableWriter},
    scanner::MotifScanner,
    tables::{read_rows_concat, SitePositionRow, SITE_DATASET_HEADER},
    types::{IntronCutError, SiteKind, SpliceCandidate},
};

use super::{parse_strands, validate_input_files, GeometryArgs};

/// Scan scaffolds for donor and acceptor motifs and write site datasets
#[derive(Parser)]
pub struct ScanCommand {
    /// Input FASTA file containing the assembly
    #[arg(short = 'f', long = "fasta", value_name = "FILE")]
    fasta_file: PathBuf,

    /// Output donor site dataset
    #[arg(long = "donor-output", value_name = "FILE")]
    donor_output: PathBuf,

    /// Output acceptor site dataset
    #[arg(long = "acceptor-output", value_name = "FILE")]
    acceptor_output: PathBuf,

    /// Strand to scan: +, - or both
    #[arg(short = 's', long = "strand", value_name = "STRAND", default_value = "+")]
    strand: String,

    /// Positive donor result tables; acceptors without a positive donor in reach are dropped
    #[arg(long = "donor-results", value_name = "FILE", num_args = 1..)]
    donor_results: Vec<PathBuf>,

    #[command(flatten)]
    geometry: GeometryArgs,
}

impl ScanCommand {
    pub fn run(self) -> Result<()> {
        info!("Starting intron-cutter scan v{}", env!("CARGO_PKG_VERSION"));
        info!("Input FASTA: {}", self.fasta_file.display());

        let strands = parse_strands(&self.strand)?;
        let config = self.geometry.config(strands)?;
        let geometry = config.geometry();
        if !self.donor_results.is_empty() && config.strands.len() > 1 {
            // result tables carry no strand column
            return Err(IntronCutError::InvalidConfig(
                "Orphan filtering against donor results needs a single --strand".to_string(),
            )
            .into());
        }

        let mut inputs = vec![self.fasta_file.as_path()];
        inputs.extend(self.donor_results.iter().map(PathBuf::as_path));
        validate_input_files(&inputs)?;

        // positive donors per scaffold
        let donor_filter: Option<HashMap<String, Vec<usize>>> = if self.donor_results.is_empty() {
            None
        } else {
            let table = read_rows_concat::<SitePositionRow, _>(&self.donor_results)?;
            let mut positives: HashMap<String, Vec<usize>> = HashMap::new();
            for row in table.rows {
                positives.entry(row.scaffold).or_default().push(row.position);
            }
            Some(positives)
        };

        let mut donor_writer =
            TableWriter::from_writer(create_table_file(&self.donor_output)?, SITE_DATASET_HEADER)?;
        let mut acceptor_writer = TableWriter::from_writer(
            create_table_file(&self.acceptor_output)?,
            SITE_DATASET_HEADER,
        )?;

        let mut stats = SequenceStats::default();
        let mut orphans = 0;

        for scaffold in read_scaffolds(&self.fasta_file)? {
            let scaffold = scaffold?;
            stats.add(&scaffold);

            for &strand in &config.strands {
                let donors: Vec<SpliceCandidate> = MotifScanner::from_config(
                    &scaffold.id,
                    &scaffold.sequence,
                    strand,
                    SiteKind::Donor,
                    &config,
                )
                .collect();
                let mut acceptors: Vec<SpliceCandidate> = MotifScanner::from_config(
                    &scaffold.id,
                    &scaffold.sequence,
                    strand,
                    SiteKind::Acceptor,
                    &config,
                )
                .collect();

                if let Some(positives) = &donor_filter {
                    let donor_positions = positives
                        .get(&scaffold.id)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    let filtered = filter_orphan_acceptors(acceptors, donor_positions, &geometry);
                    orphans += filtered.orphans;
                    acceptors = filtered.retained;
                }

                if donors.is_empty() && acceptors.is_empty() {
                    log_empty_stage(&scaffold.id, &format!("scan ({} strand)", strand));
                }

                for row in site_rows(&donors) {
                    donor_writer.write_row(&row)?;
                }
                for row in site_rows(&acceptors) {
                    acceptor_writer.write_row(&row)?;
                }
            }
        }

        info!("Assembly scanned: {}", stats);
        let donors = donor_writer.finish()?;
        let acceptors = acceptor_writer.finish()?;
        info!(
            "Wrote {} donor and {} acceptor candidates ({} orphan acceptors removed)",
            donors, acceptors, orphans
        );

        Ok(())
    }
}
