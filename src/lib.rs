//! intron-cutter: Intron candidate detection in raw genome assemblies
//!
//! This library scans scaffolds for paired splice-site motifs, filters and
//! classifies the resulting donor and acceptor sites, pairs them into
//! length-bounded intron candidates and selects a non-overlapping set of cut
//! coordinates per scaffold using an empirical intron length prior.

pub mod extract;
pub mod fasta;
pub mod logging;
pub mod metrics;
pub mod oracle;
pub mod orphan;
pub mod output;
pub mod pairing;
pub mod pipeline;
pub mod prior;
pub mod resolver;
pub mod scanner;
pub mod tables;
pub mod types;

// Re-export main types for library usage
pub use types::*;
pub use fasta::*;
pub use pipeline::*;
pub use prior::IntronLengthPrior;
pub use resolver::{OverlapResolver, ResolutionSummary};
