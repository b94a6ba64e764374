//! Splice-site motif scanning and window extraction

use crate::fasta::reverse_complement;
use crate::types::{PipelineConfig, SiteKind, SpliceCandidate, Strand, WindowRadii};

/// Lazy scan of one scaffold for one motif on one strand
///
/// Positions are reported in assembly coordinates. On the minus strand the
/// scanner looks for the reverse complement of the motif on the given
/// sequence, which is the same as scanning the reverse-complemented scaffold
/// without materializing it.
pub struct MotifScanner<'a> {
    scaffold_id: &'a str,
    sequence: &'a [u8],
    strand: Strand,
    kind: SiteKind,
    pattern: Vec<u8>,
    window: WindowRadii,
    cursor: usize,
    last: Option<usize>,
}

impl<'a> MotifScanner<'a> {
    pub fn new(
        scaffold_id: &'a str,
        sequence: &'a [u8],
        strand: Strand,
        kind: SiteKind,
        motif: &[u8],
        window: WindowRadii,
    ) -> Self {
        let pattern = match strand {
            Strand::Plus => motif.to_ascii_uppercase(),
            Strand::Minus => reverse_complement(motif),
        };

        // occurrences closer than the margin to either end never get a full window
        let margin = window.margin();
        let last = (sequence.len() >= pattern.len() + 2 * margin)
            .then(|| sequence.len() - pattern.len() - margin);

        Self {
            scaffold_id,
            sequence,
            strand,
            kind,
            pattern,
            window,
            cursor: margin,
            last,
        }
    }

    /// Scanner configured from the pipeline motifs and window radii
    pub fn from_config(
        scaffold_id: &'a str,
        sequence: &'a [u8],
        strand: Strand,
        kind: SiteKind,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(
            scaffold_id,
            sequence,
            strand,
            kind,
            config.motif(kind),
            config.window(kind),
        )
    }

    fn is_match(&self, position: usize) -> bool {
        self.sequence[position..position + self.pattern.len()]
            .iter()
            .zip(&self.pattern)
            .all(|(base, motif)| base.to_ascii_uppercase() == *motif)
    }

    fn window_at(&self, position: usize) -> Vec<u8> {
        let motif_len = self.pattern.len();
        match self.strand {
            Strand::Plus => {
                let start = position - self.window.left;
                let end = position + motif_len + self.window.right;
                self.sequence[start..end].to_ascii_uppercase()
            }
            Strand::Minus => {
                // left flank of the motif's own strand lies downstream in the assembly
                let start = position - self.window.right;
                let end = position + motif_len + self.window.left;
                reverse_complement(&self.sequence[start..end])
            }
        }
    }
}

impl Iterator for MotifScanner<'_> {
    type Item = SpliceCandidate;

    fn next(&mut self) -> Option<SpliceCandidate> {
        let last = self.last?;

        while self.cursor <= last {
            let position = self.cursor;
            self.cursor += 1;

            if self.is_match(position) {
                return Some(SpliceCandidate {
                    scaffold_id: self.scaffold_id.to_string(),
                    position,
                    strand: self.strand,
                    kind: self.kind,
                    window: self.window_at(position),
                });
            }
        }

        None
    }
}
