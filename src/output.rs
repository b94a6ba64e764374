//! Table writers for datasets, classifier results and cut decisions

use crate::tables::{
    IntronRow, IntronSequenceRow, SitePositionRow, SiteRow, TrainingRow, DELIMITER,
    INTRON_DATASET_HEADER, INTRON_TABLE_HEADER, LABELED_INTRON_DATASET_HEADER,
    SITE_RESULTS_HEADER, TRAINING_DATASET_HEADER,
};
use crate::types::{CutDecision, IntronCandidate, IntronCutError, Result, SpliceCandidate};
use log::{debug, info};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writer for one `;` table; the header is written up front so an empty table still has it
pub struct TableWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl<W: Write> TableWriter<W> {
    pub fn from_writer(writer: W, header: &[&str]) -> Result<Self> {
        // rows are serialized positionally; the header is ours
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .from_writer(writer);
        writer.write_record(header)?;

        Ok(TableWriter { writer, rows: 0 })
    }

    pub fn write_row<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.writer.serialize(row)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the number of data rows written
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        debug!("Wrote {} table rows", self.rows);
        Ok(self.rows)
    }
}

/// Unlabeled site dataset rows for scanner output
pub fn site_rows(candidates: &[SpliceCandidate]) -> Vec<SiteRow> {
    candidates
        .iter()
        .map(|candidate| SiteRow {
            scaffold: candidate.scaffold_id.clone(),
            position: candidate.position,
            sequence: String::from_utf8_lossy(&candidate.window).into_owned(),
            label: None,
        })
        .collect()
}

/// Positive sites, `scaffold;position`
pub fn write_site_results<W: Write>(writer: W, rows: &[SitePositionRow]) -> Result<usize> {
    let mut table = TableWriter::from_writer(writer, SITE_RESULTS_HEADER)?;
    for row in rows {
        table.write_row(row)?;
    }
    table.finish()
}

/// Intron positions, intron results or cut decisions, `scaffold;start;end`
pub fn write_intron_table<W: Write>(writer: W, rows: &[IntronRow]) -> Result<usize> {
    let mut table = TableWriter::from_writer(writer, INTRON_TABLE_HEADER)?;
    for row in rows {
        table.write_row(row)?;
    }
    table.finish()
}

pub fn intron_rows(candidates: &[IntronCandidate]) -> Vec<IntronRow> {
    candidates
        .iter()
        .map(|candidate| IntronRow {
            scaffold: candidate.scaffold_id.clone(),
            start: candidate.start,
            end: candidate.end,
        })
        .collect()
}

pub fn cut_rows(cuts: &[CutDecision]) -> Vec<IntronRow> {
    cuts.iter()
        .map(|cut| IntronRow {
            scaffold: cut.scaffold_id.clone(),
            start: cut.start,
            end: cut.end,
        })
        .collect()
}

/// Intron sequence dataset, `scaffold;start;end;sequence[;label]`
pub fn write_intron_dataset<W: Write>(writer: W, rows: &[IntronSequenceRow]) -> Result<usize> {
    let labeled = !rows.is_empty() && rows.iter().all(|row| row.label.is_some());
    let header = if labeled {
        LABELED_INTRON_DATASET_HEADER
    } else {
        INTRON_DATASET_HEADER
    };

    let mut table = TableWriter::from_writer(writer, header)?;
    for row in rows {
        if labeled {
            table.write_row(row)?;
        } else {
            table.write_row(&(&row.scaffold, row.start, row.end, &row.sequence))?;
        }
    }
    table.finish()
}

/// Training dataset, `sequence;label`
pub fn write_training_dataset<W: Write>(writer: W, rows: &[TrainingRow]) -> Result<usize> {
    let mut table = TableWriter::from_writer(writer, TRAINING_DATASET_HEADER)?;
    for row in rows {
        table.write_row(row)?;
    }
    table.finish()
}

/// Open `path` for a table, mapping failures to the crate error
pub fn create_table_file<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    info!("Creating table: {}", path.display());
    let file = File::create(path).map_err(|e| {
        IntronCutError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create {}: {}", path.display(), e),
        ))
    })?;
    Ok(BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{read_rows, TableRows};
    use tempfile::tempdir;

    fn written<F: FnOnce(&mut Vec<u8>) -> Result<usize>>(write: F) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let text = written(|buffer| write_intron_table(buffer, &[]));
        assert_eq!(text, "scaffold;start;end\n");

        let text = written(|buffer| write_site_results(buffer, &[]));
        assert_eq!(text, "scaffold;position\n");
    }

    #[test]
    fn test_intron_dataset_and_training_rows() {
        let rows = vec![IntronSequenceRow {
            scaffold: "chr1".to_string(),
            start: 40,
            end: 47,
            sequence: "GTAAAAG".to_string(),
            label: None,
        }];
        let text = written(|buffer| write_intron_dataset(buffer, &rows));
        assert_eq!(text, "scaffold;start;end;sequence\nchr1;40;47;GTAAAAG\n");

        let training = vec![TrainingRow {
            sequence: "GTAAAAG".to_string(),
            label: 1,
        }];
        let text = written(|buffer| write_training_dataset(buffer, &training));
        assert_eq!(text, "sequence;label\nGTAAAAG;1\n");
    }

    #[test]
    fn test_cut_table_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cuts.csv");
        let cuts = vec![
            CutDecision {
                scaffold_id: "chr1".to_string(),
                start: 40,
                end: 122,
            },
            CutDecision {
                scaffold_id: "chr2".to_string(),
                start: 7,
                end: 90,
            },
        ];

        let count = write_intron_table(create_table_file(&path).unwrap(), &cut_rows(&cuts)).unwrap();
        assert_eq!(count, 2);

        let table: TableRows<IntronRow> = read_rows(&path).unwrap();
        assert_eq!(table.rows, cut_rows(&cuts));
    }
}
