//! Subcommands of the intron-cutter binary and the options they share

pub mod classify;
pub mod extract;
pub mod pair;
pub mod prune;
pub mod run;
pub mod scan;

pub use classify::ClassifyCommand;
pub use extract::ExtractCommand;
pub use pair::PairCommand;
pub use prune::PruneCommand;
pub use run::RunCommand;
pub use scan::ScanCommand;

use anyhow::Result;
use clap::Args;
use intron_cutter::oracle::OracleSpec;
use intron_cutter::tables::IntronRow;
use intron_cutter::types::{
    IntronCandidate, IntronCutError, IntronGeometry, PipelineConfig, Strand, WindowRadii,
};
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Motifs, window radii and intron length bounds
#[derive(Args, Debug, Clone)]
pub struct GeometryArgs {
    /// Donor motif on its own strand
    #[arg(long = "donor-motif", value_name = "MOTIF", default_value = "GT")]
    donor_motif: String,

    /// Acceptor motif on its own strand
    #[arg(long = "acceptor-motif", value_name = "MOTIF", default_value = "AG")]
    acceptor_motif: String,

    /// Bases kept upstream of a donor motif
    #[arg(long = "donor-left", value_name = "N", default_value = "40")]
    donor_left: usize,

    /// Bases kept downstream of a donor motif
    #[arg(long = "donor-right", value_name = "N", default_value = "40")]
    donor_right: usize,

    /// Bases kept upstream of an acceptor motif
    #[arg(long = "acceptor-left", value_name = "N", default_value = "40")]
    acceptor_left: usize,

    /// Bases kept downstream of an acceptor motif
    #[arg(long = "acceptor-right", value_name = "N", default_value = "40")]
    acceptor_right: usize,

    /// Minimum intron length (bp, inclusive)
    #[arg(long = "min-intron-length", value_name = "N", default_value = "10")]
    min_intron_length: usize,

    /// Maximum intron length (bp, inclusive)
    #[arg(long = "max-intron-length", value_name = "N", default_value = "600")]
    max_intron_length: usize,
}

impl GeometryArgs {
    /// Pipeline configuration for the given strands, validated
    pub fn config(&self, strands: Vec<Strand>) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            donor_motif: self.donor_motif.to_ascii_uppercase().into_bytes(),
            acceptor_motif: self.acceptor_motif.to_ascii_uppercase().into_bytes(),
            donor_window: WindowRadii::new(self.donor_left, self.donor_right),
            acceptor_window: WindowRadii::new(self.acceptor_left, self.acceptor_right),
            min_intron_length: self.min_intron_length,
            max_intron_length: self.max_intron_length,
            strands,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Classifier selection for one role
#[derive(Args, Debug, Clone, Default)]
pub struct OracleArgs {
    /// Model reference passed to the classifier program ("none" or "random" accepts everything)
    #[arg(long = "model", value_name = "MODEL")]
    model: Option<String>,

    /// Classifier program, invoked as `<program> [args..] <model> <role>`
    #[arg(long = "classifier", value_name = "PROGRAM")]
    classifier: Option<PathBuf>,

    /// Extra argument for the classifier program (repeatable)
    #[arg(long = "classifier-arg", value_name = "ARG", allow_hyphen_values = true)]
    classifier_args: Vec<String>,

    /// Precomputed result tables to use instead of a classifier (repeatable)
    #[arg(long = "results", value_name = "FILE", num_args = 1..)]
    results: Vec<PathBuf>,
}

impl OracleArgs {
    pub fn spec(&self) -> OracleSpec {
        OracleSpec {
            model: self.model.clone(),
            program: self.classifier.clone(),
            program_args: self.classifier_args.clone(),
            results: self.results.clone(),
        }
    }
}

/// `both`, or a single strand
pub fn parse_strands(value: &str) -> Result<Vec<Strand>> {
    if value.eq_ignore_ascii_case("both") {
        return Ok(vec![Strand::Plus, Strand::Minus]);
    }
    Ok(vec![value.parse::<Strand>()?])
}

pub fn validate_input_files(files: &[&Path]) -> Result<()> {
    for file in files {
        if !file.exists() {
            return Err(IntronCutError::InvalidConfig(format!(
                "File not found: {}",
                file.display()
            ))
            .into());
        }
    }
    info!("All input files validated successfully");
    Ok(())
}

/// Group rows by scaffold, keeping scaffolds in order of first appearance
pub fn group_by_scaffold<T, F>(rows: Vec<T>, scaffold: F) -> Vec<(String, Vec<T>)>
where
    F: Fn(&T) -> &str,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();

    for row in rows {
        let id = scaffold(&row);
        let slot = match index.get(id) {
            Some(&slot) => slot,
            None => {
                index.insert(id.to_string(), groups.len());
                groups.push((id.to_string(), Vec::new()));
                groups.len() - 1
            }
        };
        groups[slot].1.push(row);
    }

    groups
}

/// Rebuild a candidate from a `scaffold;start;end` row, recovering the motif positions
pub fn candidate_from_row(
    row: &IntronRow,
    strand: Strand,
    geometry: &IntronGeometry,
) -> Option<IntronCandidate> {
    let (donor_position, acceptor_position) = match strand {
        Strand::Plus => (row.start, row.end.checked_sub(geometry.acceptor_len)?),
        Strand::Minus => (row.end.checked_sub(geometry.donor_len)?, row.start),
    };

    Some(IntronCandidate {
        scaffold_id: row.scaffold.clone(),
        strand,
        donor_position,
        acceptor_position,
        start: row.start,
        end: row.end,
    })
}
