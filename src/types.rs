//! Core data structures for splice-site scanning and intron selection

use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors that can occur while generating and resolving intron candidates
#[derive(Error, Debug)]
pub enum IntronCutError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("FASTA parsing error: {0}")]
    FastaParse(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Interval {scaffold}:{start}-{end} is outside the scaffold (length {length})")]
    OutOfRange {
        scaffold: String,
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("Classifier unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Length prior error: {0}")]
    Prior(String),
}

pub type Result<T> = std::result::Result<T, IntronCutError>;

/// DNA strand of a motif occurrence, always reported in assembly coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Plus,
    Minus,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

impl std::str::FromStr for Strand {
    type Err = IntronCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "+" | "plus" | "forward" => Ok(Strand::Plus),
            "-" | "minus" | "reverse" => Ok(Strand::Minus),
            _ => Err(IntronCutError::InvalidConfig(format!("Invalid strand: {}", s))),
        }
    }
}

/// Which end of an intron a motif marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Donor,
    Acceptor,
}

impl std::fmt::Display for SiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteKind::Donor => write!(f, "donor"),
            SiteKind::Acceptor => write!(f, "acceptor"),
        }
    }
}

impl std::str::FromStr for SiteKind {
    type Err = IntronCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "donor" => Ok(SiteKind::Donor),
            "acceptor" => Ok(SiteKind::Acceptor),
            _ => Err(IntronCutError::InvalidConfig(format!("Invalid site kind: {}", s))),
        }
    }
}

/// A named scaffold of the assembly
#[derive(Debug, Clone)]
pub struct Scaffold {
    pub id: String,
    pub sequence: Vec<u8>,
}

impl Scaffold {
    pub fn new(id: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// A donor or acceptor motif occurrence together with its flanking window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceCandidate {
    pub scaffold_id: String,
    /// 0-based assembly index of the lowest base of the motif
    pub position: usize,
    pub strand: Strand,
    pub kind: SiteKind,
    /// `left` bases, the motif, `right` bases, in the motif's own orientation
    pub window: Vec<u8>,
}

/// A candidate site after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedSite {
    pub position: usize,
    pub strand: Strand,
    pub kind: SiteKind,
    pub positive: bool,
}

impl ClassifiedSite {
    pub fn positive(position: usize, strand: Strand, kind: SiteKind) -> Self {
        Self {
            position,
            strand,
            kind,
            positive: true,
        }
    }
}

/// A donor/acceptor pair proposed as a removable intron, `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntronCandidate {
    pub scaffold_id: String,
    pub strand: Strand,
    pub donor_position: usize,
    pub acceptor_position: usize,
    pub start: usize,
    pub end: usize,
}

impl IntronCandidate {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Final interval selected for removal from a scaffold, `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CutDecision {
    pub scaffold_id: String,
    pub start: usize,
    pub end: usize,
}

/// Half-open intervals overlap when they share at least one coordinate
pub fn intervals_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Flank sizes around a motif occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRadii {
    pub left: usize,
    pub right: usize,
}

impl WindowRadii {
    pub fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }

    /// Distance an occurrence must keep from both scaffold ends
    pub fn margin(&self) -> usize {
        self.left.max(self.right)
    }

    pub fn width(&self, motif_len: usize) -> usize {
        self.left + motif_len + self.right
    }
}

/// Length and motif geometry shared by the orphan filter and the pairing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntronGeometry {
    pub min_length: usize,
    pub max_length: usize,
    pub donor_len: usize,
    pub acceptor_len: usize,
}

impl IntronGeometry {
    /// `[start, end)` of the intron formed by a donor and an acceptor, if the
    /// pair is correctly ordered on `strand` and within the length bounds
    pub fn span(&self, strand: Strand, donor: usize, acceptor: usize) -> Option<(usize, usize)> {
        let (start, end) = match strand {
            Strand::Plus if donor + self.donor_len <= acceptor => {
                (donor, acceptor + self.acceptor_len)
            }
            Strand::Minus if acceptor + self.acceptor_len <= donor => {
                (acceptor, donor + self.donor_len)
            }
            _ => return None,
        };

        let length = end - start;
        (self.min_length..=self.max_length)
            .contains(&length)
            .then_some((start, end))
    }

    /// Acceptor positions that can close an intron opened by `donor`
    pub fn acceptor_range(&self, strand: Strand, donor: usize) -> Option<RangeInclusive<usize>> {
        match strand {
            Strand::Plus => {
                // end = acceptor + acceptor_len, length = end - donor
                let lo = (donor + self.min_length)
                    .saturating_sub(self.acceptor_len)
                    .max(donor + self.donor_len);
                let hi = (donor + self.max_length).checked_sub(self.acceptor_len)?;
                (lo <= hi).then_some(lo..=hi)
            }
            Strand::Minus => {
                // start = acceptor, length = donor + donor_len - acceptor
                let end = donor + self.donor_len;
                let lo = end.saturating_sub(self.max_length);
                let hi = end
                    .checked_sub(self.min_length)?
                    .min(donor.checked_sub(self.acceptor_len)?);
                (lo <= hi).then_some(lo..=hi)
            }
        }
    }

    /// Donor positions that can open an intron closed by `acceptor`
    pub fn donor_range(&self, strand: Strand, acceptor: usize) -> Option<RangeInclusive<usize>> {
        match strand {
            Strand::Plus => {
                let end = acceptor + self.acceptor_len;
                let lo = end.saturating_sub(self.max_length);
                let hi = end
                    .checked_sub(self.min_length)?
                    .min(acceptor.checked_sub(self.donor_len)?);
                (lo <= hi).then_some(lo..=hi)
            }
            Strand::Minus => {
                let lo = (acceptor + self.min_length)
                    .saturating_sub(self.donor_len)
                    .max(acceptor + self.acceptor_len);
                let hi = (acceptor + self.max_length).checked_sub(self.donor_len)?;
                (lo <= hi).then_some(lo..=hi)
            }
        }
    }
}

/// Which donor set the orphan filter checks acceptors against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanFilterMode {
    /// Keep acceptors with any donor candidate in range; donor and acceptor
    /// classification then run concurrently
    DonorCandidates,
    /// Classify donors first and keep acceptors with a positive donor in range.
    /// Stricter than the candidate filter: a rejected donor orphans its acceptors
    ClassifiedDonors,
    Disabled,
}

impl std::fmt::Display for OrphanFilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrphanFilterMode::ClassifiedDonors => write!(f, "classified"),
            OrphanFilterMode::DonorCandidates => write!(f, "candidates"),
            OrphanFilterMode::Disabled => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for OrphanFilterMode {
    type Err = IntronCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "classified" => Ok(OrphanFilterMode::ClassifiedDonors),
            "candidates" => Ok(OrphanFilterMode::DonorCandidates),
            "off" | "none" => Ok(OrphanFilterMode::Disabled),
            _ => Err(IntronCutError::InvalidConfig(format!(
                "Invalid orphan filter mode: {}",
                s
            ))),
        }
    }
}

/// How the length prior turns observed lengths into a density
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorSmoothing {
    Frequency,
    GaussianKde,
}

impl std::fmt::Display for PriorSmoothing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorSmoothing::Frequency => write!(f, "frequency"),
            PriorSmoothing::GaussianKde => write!(f, "kde"),
        }
    }
}

impl std::str::FromStr for PriorSmoothing {
    type Err = IntronCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "frequency" | "freq" => Ok(PriorSmoothing::Frequency),
            "kde" | "gaussian" => Ok(PriorSmoothing::GaussianKde),
            _ => Err(IntronCutError::InvalidConfig(format!(
                "Invalid prior smoothing: {}",
                s
            ))),
        }
    }
}

/// Configuration parameters for the candidate generation pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub donor_motif: Vec<u8>,
    pub acceptor_motif: Vec<u8>,
    pub donor_window: WindowRadii,
    pub acceptor_window: WindowRadii,
    pub min_intron_length: usize,
    pub max_intron_length: usize,
    pub strands: Vec<Strand>,
    pub orphan_filter: OrphanFilterMode,
    pub prior_smoothing: PriorSmoothing,
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            donor_motif: b"GT".to_vec(),
            acceptor_motif: b"AG".to_vec(),
            donor_window: WindowRadii::new(40, 40),
            acceptor_window: WindowRadii::new(40, 40),
            min_intron_length: 10,
            max_intron_length: 600,
            strands: vec![Strand::Plus, Strand::Minus],
            orphan_filter: OrphanFilterMode::DonorCandidates,
            prior_smoothing: PriorSmoothing::Frequency,
            threads: None,
        }
    }
}

impl PipelineConfig {
    pub fn geometry(&self) -> IntronGeometry {
        IntronGeometry {
            min_length: self.min_intron_length,
            max_length: self.max_intron_length,
            donor_len: self.donor_motif.len(),
            acceptor_len: self.acceptor_motif.len(),
        }
    }

    pub fn motif(&self, kind: SiteKind) -> &[u8] {
        match kind {
            SiteKind::Donor => &self.donor_motif,
            SiteKind::Acceptor => &self.acceptor_motif,
        }
    }

    pub fn window(&self, kind: SiteKind) -> WindowRadii {
        match kind {
            SiteKind::Donor => self.donor_window,
            SiteKind::Acceptor => self.acceptor_window,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, motif) in [("donor", &self.donor_motif), ("acceptor", &self.acceptor_motif)] {
            if motif.is_empty() {
                return Err(IntronCutError::InvalidConfig(format!(
                    "{} motif must not be empty",
                    name
                )));
            }
            if let Some(&base) = motif
                .iter()
                .find(|b| !matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T'))
            {
                return Err(IntronCutError::InvalidConfig(format!(
                    "{} motif contains non-ACGT base '{}'",
                    name, base as char
                )));
            }
        }

        if self.min_intron_length == 0 {
            return Err(IntronCutError::InvalidConfig(
                "Minimum intron length must be positive".to_string(),
            ));
        }
        if self.min_intron_length > self.max_intron_length {
            return Err(IntronCutError::InvalidConfig(format!(
                "Minimum intron length {} exceeds maximum {}",
                self.min_intron_length, self.max_intron_length
            )));
        }
        if self.strands.is_empty() {
            return Err(IntronCutError::InvalidConfig(
                "At least one strand must be processed".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(IntronCutError::InvalidConfig(
                "Thread count must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
