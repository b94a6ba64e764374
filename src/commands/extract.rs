use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use intron_cutter::{
    extract::extract_intron_sequence,
    fasta::{get_sequence_stats, parse_fasta_file},
    logging::{log_malformed_row, log_out_of_range},
    output::{create_table_file, write_intron_dataset, write_training_dataset},
    tables::{read_rows_concat, IntronRow, IntronSequenceRow, TrainingRow},
    types::IntronCutError,
};

use super::{candidate_from_row, parse_strands, validate_input_files, GeometryArgs};

/// Extract intron sequences for an intron position table
#[derive(Parser)]
pub struct ExtractCommand {
    /// Input FASTA file containing the assembly
    #[arg(short = 'f', long = "fasta", value_name = "FILE")]
    fasta_file: PathBuf,

    /// Intron position tables (`scaffold;start;end`)
    #[arg(short = 'i', long = "introns", value_name = "FILE", num_args = 1.., required = true)]
    introns: Vec<PathBuf>,

    /// Output intron sequence dataset
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,

    /// Strand the introns were paired on: + or -
    #[arg(short = 's', long = "strand", value_name = "STRAND", default_value = "+")]
    strand: String,

    /// Write a `sequence;label` training dataset with this label (1, 0 or -1)
    #[arg(long = "training-label", value_name = "LABEL", allow_hyphen_values = true)]
    training_label: Option<i8>,

    #[command(flatten)]
    geometry: GeometryArgs,
}

impl ExtractCommand {
    pub fn run(self) -> Result<()> {
        info!("Starting intron-cutter extract v{}", env!("CARGO_PKG_VERSION"));
        info!("Input FASTA: {}", self.fasta_file.display());

        let strands = parse_strands(&self.strand)?;
        let &[strand] = strands.as_slice() else {
            return Err(IntronCutError::InvalidConfig(
                "Extraction works on one strand at a time".to_string(),
            )
            .into());
        };
        let config = self.geometry.config(strands)?;
        let geometry = config.geometry();

        let mut inputs = vec![self.fasta_file.as_path()];
        inputs.extend(self.introns.iter().map(PathBuf::as_path));
        validate_input_files(&inputs)?;

        let assembly = parse_fasta_file(&self.fasta_file)?;
        info!("Assembly loaded: {}", get_sequence_stats(&assembly));

        let table = read_rows_concat::<IntronRow, _>(&self.introns)?;
        let mut extracted = Vec::with_capacity(table.rows.len());
        let mut skipped = 0;

        for (index, row) in table.rows.iter().enumerate() {
            let Some(scaffold) = assembly.get_scaffold(&row.scaffold) else {
                log_malformed_row(
                    "intron table",
                    index + 2,
                    &format!("unknown scaffold {}", row.scaffold),
                );
                skipped += 1;
                continue;
            };
            let Some(candidate) = candidate_from_row(row, strand, &geometry) else {
                log_malformed_row("intron table", index + 2, "interval shorter than a motif");
                skipped += 1;
                continue;
            };

            match extract_intron_sequence(&candidate, &scaffold.sequence) {
                Ok(sequence) => extracted.push((row, sequence)),
                Err(e) => {
                    log_out_of_range(&e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} of {} introns", skipped, table.rows.len());
        }

        let writer = create_table_file(&self.output)?;
        let written = match self.training_label {
            Some(label) => {
                let rows: Vec<TrainingRow> = extracted
                    .into_iter()
                    .map(|(_, sequence)| TrainingRow {
                        sequence: String::from_utf8_lossy(&sequence).into_owned(),
                        label,
                    })
                    .collect();
                write_training_dataset(writer, &rows)?
            }
            None => {
                let rows: Vec<IntronSequenceRow> = extracted
                    .into_iter()
                    .map(|(row, sequence)| IntronSequenceRow {
                        scaffold: row.scaffold.clone(),
                        start: row.start,
                        end: row.end,
                        sequence: String::from_utf8_lossy(&sequence).into_owned(),
                        label: None,
                    })
                    .collect();
                write_intron_dataset(writer, &rows)?
            }
        };

        info!(
            "Wrote {} intron sequences to {}",
            written,
            self.output.display()
        );
        Ok(())
    }
}
