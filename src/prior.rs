//! Empirical intron length prior
//!
//! Built once from a flat list of observed intron lengths and queried by
//! length during overlap resolution. The density is tabulated at load time.

use crate::logging::log_malformed_row;
use crate::types::{IntronCutError, PriorSmoothing, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Kernels are truncated this many bandwidths away from their centre
const KDE_TRUNCATION: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct IntronLengthPrior {
    density: Vec<f64>,
    smoothing: PriorSmoothing,
    observations: usize,
    bandwidth: Option<f64>,
}

impl IntronLengthPrior {
    /// Build a prior from observed lengths
    pub fn from_lengths(lengths: &[usize], smoothing: PriorSmoothing) -> Result<Self> {
        if lengths.is_empty() {
            return Err(IntronCutError::Prior(
                "Cannot build a length prior from zero observations".to_string(),
            ));
        }

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &length in lengths {
            *counts.entry(length).or_insert(0) += 1;
        }

        match smoothing {
            PriorSmoothing::Frequency => Ok(Self::frequency(&counts, lengths.len())),
            PriorSmoothing::GaussianKde => match scott_bandwidth(lengths) {
                Some(bandwidth) => Ok(Self::gaussian_kde(&counts, lengths.len(), bandwidth)),
                None => {
                    warn!(
                        "Length prior has no spread ({} observations); falling back to frequency density",
                        lengths.len()
                    );
                    Ok(Self::frequency(&counts, lengths.len()))
                }
            },
        }
    }

    /// Load observed lengths from a file with one integer per line
    pub fn load<P: AsRef<Path>>(path: P, smoothing: PriorSmoothing) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading intron length observations: {}", path.display());

        let file = File::open(path).map_err(|e| {
            IntronCutError::Prior(format!(
                "Failed to open length file {}: {}",
                path.display(),
                e
            ))
        })?;

        let (lengths, malformed) = parse_lengths(BufReader::new(file), &path.display().to_string())?;
        if malformed > 0 {
            warn!("Skipped {} malformed lines in {}", malformed, path.display());
        }

        let prior = Self::from_lengths(&lengths, smoothing)?;
        info!("Length prior: {}", prior);
        Ok(prior)
    }

    fn frequency(counts: &BTreeMap<usize, usize>, total: usize) -> Self {
        let max_length = counts.keys().next_back().copied().unwrap_or(0);
        let mut density = vec![0.0; max_length + 1];
        for (&length, &count) in counts {
            density[length] = count as f64 / total as f64;
        }

        Self {
            density,
            smoothing: PriorSmoothing::Frequency,
            observations: total,
            bandwidth: None,
        }
    }

    fn gaussian_kde(counts: &BTreeMap<usize, usize>, total: usize, bandwidth: f64) -> Self {
        let reach = (KDE_TRUNCATION * bandwidth).ceil() as usize;
        let max_length = counts.keys().next_back().copied().unwrap_or(0);
        let mut density = vec![0.0; max_length + reach + 1];

        let norm = 1.0 / (total as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
        for (&center, &count) in counts {
            let lo = center.saturating_sub(reach);
            for (length, value) in density
                .iter_mut()
                .enumerate()
                .take(center + reach + 1)
                .skip(lo)
            {
                let z = (length as f64 - center as f64) / bandwidth;
                *value += count as f64 * norm * (-0.5 * z * z).exp();
            }
        }

        Self {
            density,
            smoothing: PriorSmoothing::GaussianKde,
            observations: total,
            bandwidth: Some(bandwidth),
        }
    }

    /// Density at `length`; zero outside the tabulated support
    pub fn score(&self, length: usize) -> f64 {
        self.density.get(length).copied().unwrap_or(0.0)
    }

    pub fn smoothing(&self) -> PriorSmoothing {
        self.smoothing
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn bandwidth(&self) -> Option<f64> {
        self.bandwidth
    }

    /// Most probable length
    pub fn mode(&self) -> usize {
        self.density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(length, _)| length)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for IntronLengthPrior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} observations, smoothing: {}, mode: {} bp",
            self.observations,
            self.smoothing,
            self.mode()
        )?;
        if let Some(bandwidth) = self.bandwidth {
            write!(f, ", bandwidth: {:.2}", bandwidth)?;
        }
        Ok(())
    }
}

/// Read one length per line; blank lines are ignored, malformed ones counted
pub fn parse_lengths<R: BufRead>(reader: R, source: &str) -> Result<(Vec<usize>, usize)> {
    let mut lengths = Vec::new();
    let mut malformed = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed.parse::<usize>() {
            Ok(length) => lengths.push(length),
            Err(e) => {
                log_malformed_row(source, index + 1, &e.to_string());
                malformed += 1;
            }
        }
    }

    Ok((lengths, malformed))
}

/// Scott's rule, `sigma * n^(-1/5)`, with the unbiased sample deviation
fn scott_bandwidth(lengths: &[usize]) -> Option<f64> {
    if lengths.len() < 2 {
        return None;
    }

    let n = lengths.len() as f64;
    let mean = lengths.iter().map(|&l| l as f64).sum::<f64>() / n;
    let variance = lengths
        .iter()
        .map(|&l| (l as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let sigma = variance.sqrt();

    (sigma > 0.0).then(|| sigma * n.powf(-0.2))
}
