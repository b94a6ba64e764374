//! Per-scaffold candidate generation and resolution
//!
//! Each scaffold runs the whole chain independently: scan, orphan filter,
//! site classification, pairing, optional intron classification and overlap
//! resolution. Scaffolds are processed in parallel and reported in input order.

use crate::extract::extract_intron_sequences;
use crate::fasta::read_scaffolds;
use crate::logging::{log_empty_stage, log_scaffold_failure};
use crate::oracle::{Oracle, OracleRecord, OracleRole};
use crate::orphan::filter_orphan_acceptors;
use crate::pairing::pair_sites;
use crate::prior::IntronLengthPrior;
use crate::resolver::{OverlapResolver, ResolutionSummary};
use crate::scanner::MotifScanner;
use crate::types::{
    ClassifiedSite, CutDecision, IntronCandidate, IntronCutError, IntronGeometry,
    OrphanFilterMode, PipelineConfig, Result, Scaffold, SiteKind, SpliceCandidate, Strand,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::Path;

/// Oracles serving each classification role
pub struct Oracles {
    pub donor: Box<dyn Oracle>,
    pub acceptor: Box<dyn Oracle>,
    pub intron: Option<Box<dyn Oracle>>,
}

/// Classify site candidates with `oracle`
pub fn classify_sites(
    oracle: &dyn Oracle,
    candidates: &[SpliceCandidate],
    motif_len: usize,
) -> Result<Vec<ClassifiedSite>> {
    let Some(first) = candidates.first() else {
        return Ok(Vec::new());
    };
    let role = OracleRole::from(first.kind);

    let records: Vec<OracleRecord<'_>> = candidates
        .iter()
        .map(|candidate| OracleRecord {
            scaffold_id: &candidate.scaffold_id,
            start: candidate.position,
            end: candidate.position + motif_len,
            sequence: &candidate.window,
        })
        .collect();

    let labels = oracle.classify(role, &records)?;
    if labels.len() != candidates.len() {
        return Err(IntronCutError::OracleUnavailable(format!(
            "{} returned {} labels for {} {} candidates",
            oracle.name(),
            labels.len(),
            candidates.len(),
            role
        )));
    }

    Ok(candidates
        .iter()
        .zip(labels)
        .map(|(candidate, positive)| ClassifiedSite {
            position: candidate.position,
            strand: candidate.strand,
            kind: candidate.kind,
            positive,
        })
        .collect())
}

/// Keep the intron candidates `oracle` labels positive
pub fn classify_introns(
    oracle: &dyn Oracle,
    introns: Vec<(IntronCandidate, Vec<u8>)>,
) -> Result<Vec<IntronCandidate>> {
    if introns.is_empty() {
        return Ok(Vec::new());
    }

    let labels = {
        let records: Vec<OracleRecord<'_>> = introns
            .iter()
            .map(|(candidate, sequence)| OracleRecord {
                scaffold_id: &candidate.scaffold_id,
                start: candidate.start,
                end: candidate.end,
                sequence,
            })
            .collect();
        oracle.classify(OracleRole::Intron, &records)?
    };

    if labels.len() != introns.len() {
        return Err(IntronCutError::OracleUnavailable(format!(
            "{} returned {} labels for {} intron candidates",
            oracle.name(),
            labels.len(),
            introns.len()
        )));
    }

    Ok(introns
        .into_iter()
        .zip(labels)
        .filter_map(|((candidate, _), positive)| positive.then_some(candidate))
        .collect())
}

/// Everything one scaffold produced
#[derive(Debug, Clone, Default)]
pub struct ScaffoldReport {
    /// Position of the scaffold in the input
    pub index: usize,
    pub scaffold_id: String,
    pub length: usize,
    pub donor_candidates: usize,
    pub acceptor_candidates: usize,
    pub orphan_acceptors: usize,
    pub positive_donors: usize,
    pub positive_acceptors: usize,
    pub intron_candidates: usize,
    pub out_of_range: usize,
    /// Introns that survived classification, across strands
    pub positive_introns: Vec<IntronCandidate>,
    pub resolution: ResolutionSummary,
    pub cuts: Vec<CutDecision>,
}

/// A scaffold whose processing failed
#[derive(Debug, Clone)]
pub struct ScaffoldFailure {
    pub index: usize,
    pub scaffold_id: String,
    pub error: String,
}

/// Totals over all scaffolds of a run
#[derive(Debug, Default, Clone)]
pub struct PipelineSummary {
    pub scaffolds_processed: usize,
    pub scaffolds_failed: usize,
    pub bases: usize,
    pub donor_candidates: usize,
    pub acceptor_candidates: usize,
    pub orphan_acceptors: usize,
    pub positive_donors: usize,
    pub positive_acceptors: usize,
    pub intron_candidates: usize,
    pub out_of_range: usize,
    pub positive_introns: usize,
    pub resolution: ResolutionSummary,
}

impl PipelineSummary {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, report: &ScaffoldReport) {
        self.scaffolds_processed += 1;
        self.bases += report.length;
        self.donor_candidates += report.donor_candidates;
        self.acceptor_candidates += report.acceptor_candidates;
        self.orphan_acceptors += report.orphan_acceptors;
        self.positive_donors += report.positive_donors;
        self.positive_acceptors += report.positive_acceptors;
        self.intron_candidates += report.intron_candidates;
        self.out_of_range += report.out_of_range;
        self.positive_introns += report.positive_introns.len();
        self.resolution.merge(&report.resolution);
    }
}

impl std::fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,
            "Scaffolds processed: {}, Failed: {}, Donors: {}/{}, Acceptors: {}/{} ({} orphans), Intron candidates: {}, Positive introns: {}, Cuts: {}",
            self.scaffolds_processed, self.scaffolds_failed,
            self.positive_donors, self.donor_candidates,
            self.positive_acceptors, self.acceptor_candidates, self.orphan_acceptors,
            self.intron_candidates, self.positive_introns, self.resolution.selected
        )
    }
}

/// Reports in input order plus the failures
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub reports: Vec<ScaffoldReport>,
    pub failures: Vec<ScaffoldFailure>,
    pub summary: PipelineSummary,
}

impl PipelineOutcome {
    pub fn cuts(&self) -> impl Iterator<Item = &CutDecision> {
        self.reports.iter().flat_map(|report| report.cuts.iter())
    }

    pub fn positive_introns(&self) -> impl Iterator<Item = &IntronCandidate> {
        self.reports
            .iter()
            .flat_map(|report| report.positive_introns.iter())
    }
}

/// Main pipeline engine
pub struct IntronPipeline<'a> {
    config: &'a PipelineConfig,
    oracles: &'a Oracles,
    prior: &'a IntronLengthPrior,
    geometry: IntronGeometry,
}

impl<'a> IntronPipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        oracles: &'a Oracles,
        prior: &'a IntronLengthPrior,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            oracles,
            prior,
            geometry: config.geometry(),
        })
    }

    /// Run `work` on a dedicated pool when a thread count is configured
    fn in_pool<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> T + Send,
    {
        match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        IntronCutError::InvalidConfig(format!("Failed to build thread pool: {}", e))
                    })?;
                Ok(pool.install(work))
            }
            None => Ok(work()),
        }
    }

    /// Stream scaffolds from a FASTA file through the pool
    pub fn run_fasta<P: AsRef<Path>>(&self, fasta_path: P) -> Result<PipelineOutcome> {
        info!("Starting intron detection pipeline");
        let scaffolds = read_scaffolds(fasta_path)?;

        let results: Result<Vec<_>> = self.in_pool(|| {
            scaffolds
                .enumerate()
                .par_bridge()
                .map(|(index, scaffold)| {
                    let scaffold = scaffold?;
                    Ok(self.process_indexed(index, &scaffold))
                })
                .collect()
        })?;

        Ok(self.collect_outcome(results?))
    }

    /// Process in-memory scaffolds in parallel
    pub fn run_scaffolds(&self, scaffolds: &[Scaffold]) -> Result<PipelineOutcome> {
        let results: Vec<_> = self.in_pool(|| {
            scaffolds
                .par_iter()
                .enumerate()
                .map(|(index, scaffold)| self.process_indexed(index, scaffold))
                .collect()
        })?;

        Ok(self.collect_outcome(results))
    }

    fn process_indexed(
        &self,
        index: usize,
        scaffold: &Scaffold,
    ) -> std::result::Result<ScaffoldReport, ScaffoldFailure> {
        self.process_scaffold(index, scaffold).map_err(|e| {
            log_scaffold_failure(&scaffold.id, &e);
            ScaffoldFailure {
                index,
                scaffold_id: scaffold.id.clone(),
                error: e.to_string(),
            }
        })
    }

    fn collect_outcome(
        &self,
        mut results: Vec<std::result::Result<ScaffoldReport, ScaffoldFailure>>,
    ) -> PipelineOutcome {
        results.sort_by_key(|result| match result {
            Ok(report) => report.index,
            Err(failure) => failure.index,
        });

        let mut outcome = PipelineOutcome {
            summary: PipelineSummary::new(),
            ..Default::default()
        };

        for result in results {
            match result {
                Ok(report) => {
                    outcome.summary.add(&report);
                    outcome.reports.push(report);
                }
                Err(failure) => {
                    outcome.summary.scaffolds_failed += 1;
                    outcome.failures.push(failure);
                }
            }
        }

        if !outcome.failures.is_empty() {
            warn!(
                "{} scaffolds failed: {}",
                outcome.failures.len(),
                outcome
                    .failures
                    .iter()
                    .map(|f| format!("{} ({})", f.scaffold_id, f.error))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        info!("Pipeline complete: {}", outcome.summary);
        outcome
    }

    /// Run the whole chain on one scaffold
    pub fn process_scaffold(&self, index: usize, scaffold: &Scaffold) -> Result<ScaffoldReport> {
        debug!(
            "Processing scaffold {} (length: {})",
            scaffold.id,
            scaffold.len()
        );

        let mut report = ScaffoldReport {
            index,
            scaffold_id: scaffold.id.clone(),
            length: scaffold.len(),
            ..Default::default()
        };

        for &strand in &self.config.strands {
            let introns = self.process_strand(scaffold, strand, &mut report)?;
            report.positive_introns.extend(introns);
        }

        if report.positive_introns.is_empty() {
            log_empty_stage(&scaffold.id, "intron candidates");
        }

        let resolver = OverlapResolver::new(self.prior);
        let (cuts, resolution) = resolver.resolve(&scaffold.id, &report.positive_introns);
        report.cuts = cuts;
        report.resolution = resolution;

        Ok(report)
    }

    fn process_strand(
        &self,
        scaffold: &Scaffold,
        strand: Strand,
        report: &mut ScaffoldReport,
    ) -> Result<Vec<IntronCandidate>> {
        let donors: Vec<SpliceCandidate> = MotifScanner::from_config(
            &scaffold.id,
            &scaffold.sequence,
            strand,
            SiteKind::Donor,
            self.config,
        )
        .collect();
        let acceptors: Vec<SpliceCandidate> = MotifScanner::from_config(
            &scaffold.id,
            &scaffold.sequence,
            strand,
            SiteKind::Acceptor,
            self.config,
        )
        .collect();
        report.donor_candidates += donors.len();
        report.acceptor_candidates += acceptors.len();

        let (donor_sites, acceptor_sites) = self.classify_strand(donors, acceptors, report)?;
        report.positive_donors += donor_sites.iter().filter(|site| site.positive).count();
        report.positive_acceptors += acceptor_sites.iter().filter(|site| site.positive).count();

        let candidates = pair_sites(
            &scaffold.id,
            strand,
            &donor_sites,
            &acceptor_sites,
            &self.geometry,
        );
        report.intron_candidates += candidates.len();

        let Some(intron_oracle) = self.oracles.intron.as_deref() else {
            return Ok(candidates);
        };

        let extracted = extract_intron_sequences(candidates, &scaffold.sequence);
        report.out_of_range += extracted.out_of_range;
        classify_introns(intron_oracle, extracted.introns)
    }

    /// Orphan-filter and classify one strand's sites according to the configured mode
    fn classify_strand(
        &self,
        donors: Vec<SpliceCandidate>,
        acceptors: Vec<SpliceCandidate>,
        report: &mut ScaffoldReport,
    ) -> Result<(Vec<ClassifiedSite>, Vec<ClassifiedSite>)> {
        let donor_len = self.config.motif(SiteKind::Donor).len();
        let acceptor_len = self.config.motif(SiteKind::Acceptor).len();
        let donor_oracle = self.oracles.donor.as_ref();
        let acceptor_oracle = self.oracles.acceptor.as_ref();

        match self.config.orphan_filter {
            OrphanFilterMode::ClassifiedDonors => {
                let donor_sites = classify_sites(donor_oracle, &donors, donor_len)?;
                let positives: Vec<usize> = donor_sites
                    .iter()
                    .filter(|site| site.positive)
                    .map(|site| site.position)
                    .collect();

                let filtered = filter_orphan_acceptors(acceptors, &positives, &self.geometry);
                report.orphan_acceptors += filtered.orphans;
                let acceptor_sites =
                    classify_sites(acceptor_oracle, &filtered.retained, acceptor_len)?;
                Ok((donor_sites, acceptor_sites))
            }
            OrphanFilterMode::DonorCandidates => {
                let positions: Vec<usize> = donors.iter().map(|donor| donor.position).collect();
                let filtered = filter_orphan_acceptors(acceptors, &positions, &self.geometry);
                report.orphan_acceptors += filtered.orphans;

                let (donor_sites, acceptor_sites) = rayon::join(
                    || classify_sites(donor_oracle, &donors, donor_len),
                    || classify_sites(acceptor_oracle, &filtered.retained, acceptor_len),
                );
                Ok((donor_sites?, acceptor_sites?))
            }
            OrphanFilterMode::Disabled => {
                let (donor_sites, acceptor_sites) = rayon::join(
                    || classify_sites(donor_oracle, &donors, donor_len),
                    || classify_sites(acceptor_oracle, &acceptors, acceptor_len),
                );
                Ok((donor_sites?, acceptor_sites?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PassThroughOracle;
    use crate::resolver::is_non_overlapping;
    use crate::types::{PriorSmoothing, WindowRadii};
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Rejects every site whose window contains `N`
    struct MaskedOracle;

    impl Oracle for MaskedOracle {
        fn name(&self) -> String {
            "masked".to_string()
        }

        fn classify(&self, _role: OracleRole, records: &[OracleRecord<'_>]) -> Result<Vec<bool>> {
            Ok(records
                .iter()
                .map(|record| !record.sequence.contains(&b'N'))
                .collect())
        }
    }

    struct FailingOracle;

    impl Oracle for FailingOracle {
        fn name(&self) -> String {
            "failing".to_string()
        }

        fn classify(&self, _role: OracleRole, records: &[OracleRecord<'_>]) -> Result<Vec<bool>> {
            if records.iter().any(|record| record.scaffold_id == "broken") {
                return Err(IntronCutError::OracleUnavailable("model crashed".to_string()));
            }
            Ok(vec![true; records.len()])
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            donor_window: WindowRadii::new(2, 2),
            acceptor_window: WindowRadii::new(2, 2),
            min_intron_length: 6,
            max_intron_length: 30,
            strands: vec![Strand::Plus],
            ..Default::default()
        }
    }

    fn pass_through() -> Oracles {
        Oracles {
            donor: Box::new(PassThroughOracle),
            acceptor: Box::new(PassThroughOracle),
            intron: None,
        }
    }

    fn prior(lengths: &[usize]) -> IntronLengthPrior {
        IntronLengthPrior::from_lengths(lengths, PriorSmoothing::Frequency).unwrap()
    }

    #[test]
    fn test_single_intron_is_cut() {
        // donor at 5, acceptor at 14 -> [5, 16), length 11
        let scaffold = Scaffold::new("chr1", "CCCCCGTCCCCCCCAGCCCCC");
        let config = config();
        let oracles = pass_through();
        let prior = prior(&[11]);
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();

        let report = pipeline.process_scaffold(0, &scaffold).unwrap();
        assert_eq!(report.donor_candidates, 1);
        assert_eq!(report.acceptor_candidates, 1);
        assert_eq!(report.intron_candidates, 1);
        assert_eq!(
            report.cuts,
            vec![CutDecision {
                scaffold_id: "chr1".to_string(),
                start: 5,
                end: 16
            }]
        );
    }

    #[test]
    fn test_minus_strand_intron_is_found() {
        // CT at 5 and AC at 14 read as GT...AG on the minus strand: [5, 16)
        let scaffold = Scaffold::new("chr1", "CCCCCCTCCCCCCCACCCCCC");
        let config = PipelineConfig {
            strands: vec![Strand::Plus, Strand::Minus],
            ..config()
        };
        let oracles = pass_through();
        let prior = prior(&[11]);
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();

        let report = pipeline.process_scaffold(0, &scaffold).unwrap();
        assert_eq!(report.positive_introns.len(), 1);
        assert_eq!(report.positive_introns[0].strand, Strand::Minus);
        assert_eq!((report.cuts[0].start, report.cuts[0].end), (5, 16));
    }

    #[test]
    fn test_negative_donor_keeps_acceptor_by_default() {
        // the only donor window contains N and is rejected
        let scaffold = Scaffold::new("chr1", "CCCCNGTCCCCCCCAGCCCCC");
        let config = config();
        assert_eq!(config.orphan_filter, OrphanFilterMode::DonorCandidates);
        let oracles = Oracles {
            donor: Box::new(MaskedOracle),
            acceptor: Box::new(PassThroughOracle),
            intron: None,
        };
        let prior = prior(&[11]);
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();

        let report = pipeline.process_scaffold(0, &scaffold).unwrap();
        assert_eq!(report.positive_donors, 0);
        assert_eq!(report.orphan_acceptors, 0);
        assert_eq!(report.positive_acceptors, 1);
        assert!(report.cuts.is_empty());

        // filtering against classified donors orphans the acceptor
        let config = PipelineConfig {
            orphan_filter: OrphanFilterMode::ClassifiedDonors,
            ..config
        };
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();
        let report = pipeline.process_scaffold(0, &scaffold).unwrap();
        assert_eq!(report.orphan_acceptors, 1);
        assert_eq!(report.positive_acceptors, 0);
        assert!(report.cuts.is_empty());
    }

    #[test]
    fn test_intron_oracle_filters_candidates() {
        let scaffold = Scaffold::new("chr1", "CCCCCGTCCCCCCCAGCCCCC");
        let config = config();
        let oracles = Oracles {
            intron: Some(Box::new(MaskedOracle)),
            ..pass_through()
        };
        let prior = prior(&[11]);
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();
        assert_eq!(pipeline.process_scaffold(0, &scaffold).unwrap().cuts.len(), 1);

        let masked = Scaffold::new("chr1", "CCCCCGTCCNCCCCAGCCCCC");
        let report = pipeline.process_scaffold(0, &masked).unwrap();
        assert_eq!(report.intron_candidates, 1);
        assert!(report.positive_introns.is_empty());
        assert!(report.cuts.is_empty());
    }

    #[test]
    fn test_failures_are_isolated_and_order_is_kept() {
        let scaffolds = vec![
            Scaffold::new("first", "CCCCCGTCCCCCCCAGCCCCC"),
            Scaffold::new("broken", "CCCCCGTCCCCCCCAGCCCCC"),
            Scaffold::new("third", "CCCCCGTCCCCCCCAGCCCCCCCCCCGTCCCCCCCAGCCCCC"),
        ];
        let config = config();
        let oracles = Oracles {
            donor: Box::new(FailingOracle),
            acceptor: Box::new(PassThroughOracle),
            intron: None,
        };
        let prior = prior(&[11]);
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();

        let outcome = pipeline.run_scaffolds(&scaffolds).unwrap();
        let ids: Vec<&str> = outcome.reports.iter().map(|r| r.scaffold_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "third"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].scaffold_id, "broken");
        assert_eq!(outcome.summary.scaffolds_failed, 1);
        assert_eq!(outcome.summary.scaffolds_processed, 2);
        assert_eq!(outcome.cuts().count(), 3);
        assert!(outcome
            .reports
            .iter()
            .all(|report| is_non_overlapping(&report.cuts)));
    }

    #[test]
    fn test_run_fasta_streams_records() {
        let mut fasta = NamedTempFile::new().unwrap();
        writeln!(fasta, ">chr1\nCCCCCGTCCCCCCCAGCCCCC\n>chr2\nAAAAAAAAAA").unwrap();

        let config = config();
        let oracles = pass_through();
        let prior = prior(&[11]);
        let pipeline = IntronPipeline::new(&config, &oracles, &prior).unwrap();

        let outcome = pipeline.run_fasta(fasta.path()).unwrap();
        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(outcome.reports[0].scaffold_id, "chr1");
        assert_eq!(outcome.reports[1].scaffold_id, "chr2");
        assert_eq!(outcome.summary.resolution.selected, 1);
        assert_eq!(outcome.summary.bases, 31);
    }

    #[test]
    fn test_dedicated_pool_gives_same_result() {
        let scaffolds: Vec<Scaffold> = (0..8)
            .map(|i| Scaffold::new(format!("chr{}", i), "CCCCCGTCCCCCCCAGCCCCC"))
            .collect();
        let oracles = pass_through();
        let prior = prior(&[11]);

        let shared = config();
        let pooled = PipelineConfig {
            threads: Some(2),
            ..config()
        };
        let a = IntronPipeline::new(&shared, &oracles, &prior)
            .unwrap()
            .run_scaffolds(&scaffolds)
            .unwrap();
        let b = IntronPipeline::new(&pooled, &oracles, &prior)
            .unwrap()
            .run_scaffolds(&scaffolds)
            .unwrap();

        let cuts_a: Vec<_> = a.cuts().cloned().collect();
        let cuts_b: Vec<_> = b.cuts().cloned().collect();
        assert_eq!(cuts_a.len(), 8);
        assert_eq!(cuts_a, cuts_b);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            min_intron_length: 50,
            max_intron_length: 10,
            ..config()
        };
        let oracles = pass_through();
        let prior = prior(&[11]);
        assert!(IntronPipeline::new(&config, &oracles, &prior).is_err());
    }
}
