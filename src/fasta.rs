//! FASTA parsing and assembly sequence handling

use crate::types::{IntronCutError, Result, Scaffold};
use bio::io::fasta;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Fully loaded assembly, for commands that need random access by scaffold
#[derive(Debug, Default)]
pub struct Assembly {
    pub scaffolds: HashMap<String, Scaffold>,
    pub scaffold_order: Vec<String>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scaffold(&mut self, scaffold: Scaffold) {
        self.scaffold_order.push(scaffold.id.clone());
        self.scaffolds.insert(scaffold.id.clone(), scaffold);
    }

    pub fn get_scaffold(&self, id: &str) -> Option<&Scaffold> {
        self.scaffolds.get(id)
    }

    /// Scaffolds in file order
    pub fn iter(&self) -> impl Iterator<Item = &Scaffold> {
        self.scaffold_order
            .iter()
            .filter_map(|id| self.scaffolds.get(id))
    }

    pub fn len(&self) -> usize {
        self.scaffolds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scaffolds.is_empty()
    }
}

/// Stream scaffolds one record at a time
///
/// Only the record being yielded is held in memory, so per-scaffold work
/// never requires the whole assembly.
pub fn read_scaffolds<P: AsRef<Path>>(
    path: P,
) -> Result<impl Iterator<Item = Result<Scaffold>> + Send> {
    let path = path.as_ref();
    info!("Streaming scaffolds from FASTA file: {}", path.display());

    let file = File::open(path).map_err(|e| {
        IntronCutError::FastaParse(format!(
            "Failed to open FASTA file {}: {}",
            path.display(),
            e
        ))
    })?;

    let records = fasta::Reader::new(file).records();

    Ok(records.map(|result| {
        let record = result.map_err(|e| {
            IntronCutError::FastaParse(format!("Failed to parse FASTA record: {}", e))
        })?;
        debug!("Read scaffold: {} (length: {})", record.id(), record.seq().len());
        Ok(Scaffold::new(record.id(), record.seq()))
    }))
}

/// Parse a FASTA file into an in-memory assembly
pub fn parse_fasta_file<P: AsRef<Path>>(path: P) -> Result<Assembly> {
    let mut assembly = Assembly::new();

    for scaffold in read_scaffolds(path)? {
        assembly.add_scaffold(scaffold?);
    }

    info!("Loaded {} scaffolds from FASTA file", assembly.len());

    if assembly.is_empty() {
        return Err(IntronCutError::FastaParse(
            "No sequences found in FASTA file".to_string(),
        ));
    }

    Ok(assembly)
}

/// Reverse complement a DNA sequence; ambiguity codes other than N are kept
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|&base| match base.to_ascii_uppercase() {
            b'A' => b'T',
            b'T' => b'A',
            b'G' => b'C',
            b'C' => b'G',
            b'N' => b'N',
            other => other,
        })
        .collect()
}

/// Get sequence statistics
pub fn get_sequence_stats(assembly: &Assembly) -> SequenceStats {
    let mut stats = SequenceStats::default();
    for scaffold in assembly.iter() {
        stats.add(scaffold);
    }
    stats
}

/// Statistics about assembly sequences
#[derive(Debug, Default, Clone)]
pub struct SequenceStats {
    pub sequence_count: usize,
    pub total_length: usize,
    pub gc_count: usize,
    pub ambiguous_count: usize,
}

impl SequenceStats {
    pub fn add(&mut self, scaffold: &Scaffold) {
        self.sequence_count += 1;
        self.total_length += scaffold.len();

        for &base in &scaffold.sequence {
            match base.to_ascii_uppercase() {
                b'G' | b'C' => self.gc_count += 1,
                b'A' | b'T' => {}
                _ => self.ambiguous_count += 1,
            }
        }
    }

    fn percent(&self, count: usize) -> f64 {
        if self.total_length > 0 {
            (count as f64 / self.total_length as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for SequenceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scaffolds: {}, Total length: {} bp, GC content: {:.2}%, Ambiguous bases: {:.2}%",
            self.sequence_count,
            self.total_length,
            self.percent(self.gc_count),
            self.percent(self.ambiguous_count)
        )
    }
}
