//! Intron sequence materialization

use crate::fasta::reverse_complement;
use crate::logging::log_out_of_range;
use crate::types::{IntronCandidate, IntronCutError, Result, Strand};

/// Nucleotides of `[start, end)`, reverse complemented on the minus strand
pub fn extract_intron_sequence(candidate: &IntronCandidate, scaffold: &[u8]) -> Result<Vec<u8>> {
    if candidate.start >= candidate.end || candidate.end > scaffold.len() {
        return Err(IntronCutError::OutOfRange {
            scaffold: candidate.scaffold_id.clone(),
            start: candidate.start,
            end: candidate.end,
            length: scaffold.len(),
        });
    }

    let slice = &scaffold[candidate.start..candidate.end];
    Ok(match candidate.strand {
        Strand::Plus => slice.to_ascii_uppercase(),
        Strand::Minus => reverse_complement(slice),
    })
}

/// Candidates paired with their sequences
#[derive(Debug, Default)]
pub struct ExtractedIntrons {
    pub introns: Vec<(IntronCandidate, Vec<u8>)>,
    pub out_of_range: usize,
}

/// Extract every candidate, logging and skipping the ones outside the scaffold
pub fn extract_intron_sequences(
    candidates: Vec<IntronCandidate>,
    scaffold: &[u8],
) -> ExtractedIntrons {
    let mut extracted = ExtractedIntrons::default();

    for candidate in candidates {
        match extract_intron_sequence(&candidate, scaffold) {
            Ok(sequence) => extracted.introns.push((candidate, sequence)),
            Err(e) => {
                log_out_of_range(&e);
                extracted.out_of_range += 1;
            }
        }
    }

    extracted
}
