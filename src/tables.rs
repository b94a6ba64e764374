//! Semicolon-delimited tables exchanged between pipeline stages
//!
//! Every table starts with a header row naming its columns. Readers match
//! columns by header name, skip rows that fail to parse and report how many
//! were skipped.

use crate::logging::log_malformed_row;
use crate::types::{IntronCutError, Result};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const DELIMITER: u8 = b';';

pub const SITE_DATASET_HEADER: &[&str] = &["scaffold", "position", "sequence"];
pub const SITE_RESULTS_HEADER: &[&str] = &["scaffold", "position"];
pub const INTRON_TABLE_HEADER: &[&str] = &["scaffold", "start", "end"];
pub const INTRON_DATASET_HEADER: &[&str] = &["scaffold", "start", "end", "sequence"];
pub const LABELED_INTRON_DATASET_HEADER: &[&str] =
    &["scaffold", "start", "end", "sequence", "label"];
pub const TRAINING_DATASET_HEADER: &[&str] = &["sequence", "label"];

/// `scaffold;position;sequence[;label]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRow {
    pub scaffold: String,
    pub position: usize,
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<i8>,
}

/// `scaffold;position`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SitePositionRow {
    pub scaffold: String,
    pub position: usize,
}

/// `scaffold;start;end`, shared by intron positions, intron results and cut tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntronRow {
    pub scaffold: String,
    pub start: usize,
    pub end: usize,
}

/// `scaffold;start;end;sequence[;label]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntronSequenceRow {
    pub scaffold: String,
    pub start: usize,
    pub end: usize,
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<i8>,
}

/// `sequence;label`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub sequence: String,
    pub label: i8,
}

/// Label column convention: `1` positive, `0` or `-1` negative
pub fn label_is_positive(label: i8) -> bool {
    label > 0
}

/// Rows that parsed and the number that did not
#[derive(Debug, Clone)]
pub struct TableRows<T> {
    pub rows: Vec<T>,
    pub malformed: usize,
}

/// Deserialize every row of a table read from `reader`
///
/// `source` names the input in log messages.
pub fn read_rows_from<T, R>(reader: R, source: &str) -> Result<TableRows<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut malformed = 0;

    for (index, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(IntronCutError::Csv(e)),
            Err(e) => {
                // header is line 1
                log_malformed_row(source, index + 2, &e.to_string());
                malformed += 1;
            }
        }
    }

    if malformed > 0 {
        warn!("Skipped {} malformed rows in {}", malformed, source);
    }

    Ok(TableRows { rows, malformed })
}

/// Deserialize every row of the table at `path`
pub fn read_rows<T, P>(path: P) -> Result<TableRows<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        IntronCutError::MalformedInput(format!(
            "Failed to open table {}: {}",
            path.display(),
            e
        ))
    })?;

    let table = read_rows_from(file, &path.display().to_string())?;
    info!("Read {} rows from {}", table.rows.len(), path.display());
    Ok(table)
}

/// Concatenate the rows of several shard tables, in the given order
pub fn read_rows_concat<T, P>(paths: &[P]) -> Result<TableRows<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let mut combined = TableRows {
        rows: Vec::new(),
        malformed: 0,
    };

    for path in paths {
        let table = read_rows(path)?;
        combined.rows.extend(table.rows);
        combined.malformed += table.malformed;
    }

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_site_rows_with_and_without_labels() {
        let input = Cursor::new("scaffold;position;sequence;label\nchr1;40;AAGTAA;1\nchr1;55;CCGTCC;-1\n");
        let table: TableRows<SiteRow> = read_rows_from(input, "test").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].label, Some(1));
        assert!(!label_is_positive(table.rows[1].label.unwrap()));

        let input = Cursor::new("scaffold;position;sequence\nchr1;40;AAGTAA\n");
        let table: TableRows<SiteRow> = read_rows_from(input, "test").unwrap();
        assert_eq!(table.rows[0].label, None);
        assert_eq!(table.rows[0].position, 40);
    }

    #[test]
    fn test_malformed_rows_are_counted() {
        let input = Cursor::new("scaffold;start;end\nchr1;10;90\nchr1;ten;90\nchr2;5\nchr2;100;250\n");
        let table: TableRows<IntronRow> = read_rows_from(input, "test").unwrap();

        assert_eq!(table.malformed, 2);
        assert_eq!(
            table.rows,
            vec![
                IntronRow {
                    scaffold: "chr1".to_string(),
                    start: 10,
                    end: 90
                },
                IntronRow {
                    scaffold: "chr2".to_string(),
                    start: 100,
                    end: 250
                },
            ]
        );
    }

    #[test]
    fn test_header_only_table_is_empty() {
        let input = Cursor::new("scaffold;position\n");
        let table: TableRows<SitePositionRow> = read_rows_from(input, "test").unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.malformed, 0);
    }

    #[test]
    fn test_shards_are_concatenated_in_order() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "scaffold;position\nchr1;10").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "scaffold;position\nchr2;20\nchr2;x").unwrap();

        let table: TableRows<SitePositionRow> =
            read_rows_concat(&[first.path(), second.path()]).unwrap();
        let positions: Vec<usize> = table.rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![10, 20]);
        assert_eq!(table.malformed, 1);
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let result: Result<TableRows<IntronRow>> = read_rows("/nonexistent/introns.csv");
        assert!(result.is_err());
    }
}
