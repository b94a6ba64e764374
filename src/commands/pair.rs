use anyhow::Result;
use clap::Parser;
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;

use intron_cutter::{
    logging::log_empty_stage,
    output::{create_table_file, intron_rows, write_intron_table},
    pairing::pair_sites,
    tables::{read_rows_concat, SitePositionRow},
    types::{ClassifiedSite, IntronCutError, SiteKind},
};

use super::{group_by_scaffold, parse_strands, validate_input_files, GeometryArgs};

/// Pair positive donor and acceptor sites into intron candidates
#[derive(Parser)]
pub struct PairCommand {
    /// Positive donor result tables
    #[arg(long = "donors", value_name = "FILE", num_args = 1.., required = true)]
    donors: Vec<PathBuf>,

    /// Positive acceptor result tables
    #[arg(long = "acceptors", value_name = "FILE", num_args = 1.., required = true)]
    acceptors: Vec<PathBuf>,

    /// Output intron position table
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Strand the sites were scanned on: + or -
    #[arg(short = 's', long = "strand", value_name = "STRAND", default_value = "+")]
    strand: String,

    #[command(flatten)]
    geometry: GeometryArgs,
}

impl PairCommand {
    pub fn run(self) -> Result<()> {
        info!("Starting intron-cutter pair v{}", env!("CARGO_PKG_VERSION"));

        let strands = parse_strands(&self.strand)?;
        let &[strand] = strands.as_slice() else {
            return Err(IntronCutError::InvalidConfig(
                "Pairing works on one strand at a time".to_string(),
            )
            .into());
        };
        let config = self.geometry.config(strands)?;
        let geometry = config.geometry();

        let inputs: Vec<_> = self
            .donors
            .iter()
            .chain(&self.acceptors)
            .map(PathBuf::as_path)
            .collect();
        validate_input_files(&inputs)?;

        let donors = read_rows_concat::<SitePositionRow, _>(&self.donors)?;
        let acceptors = read_rows_concat::<SitePositionRow, _>(&self.acceptors)?;
        info!(
            "Loaded {} positive donors and {} positive acceptors",
            donors.rows.len(),
            acceptors.rows.len()
        );

        let mut acceptors_by_scaffold: HashMap<String, Vec<ClassifiedSite>> = HashMap::new();
        for row in acceptors.rows {
            acceptors_by_scaffold
                .entry(row.scaffold)
                .or_default()
                .push(ClassifiedSite::positive(row.position, strand, SiteKind::Acceptor));
        }

        let mut candidates = Vec::new();
        for (scaffold_id, rows) in group_by_scaffold(donors.rows, |row| row.scaffold.as_str()) {
            let donor_sites: Vec<ClassifiedSite> = rows
                .iter()
                .map(|row| ClassifiedSite::positive(row.position, strand, SiteKind::Donor))
                .collect();
            let acceptor_sites = acceptors_by_scaffold
                .get(&scaffold_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let paired = pair_sites(&scaffold_id, strand, &donor_sites, acceptor_sites, &geometry);
            if paired.is_empty() {
                log_empty_stage(&scaffold_id, "pairing");
            }
            candidates.extend(paired);
        }

        let written = write_intron_table(create_table_file(&self.output)?, &intron_rows(&candidates))?;
        info!(
            "Wrote {} intron candidates to {}",
            written,
            self.output.display()
        );
        Ok(())
    }
}
