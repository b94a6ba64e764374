//! Overlap resolution between positively classified intron candidates
//!
//! Selects, per scaffold, the non-overlapping subset of candidate intervals
//! with the highest total length-prior score (weighted interval scheduling).
//! Ties on score prefer more intervals, then the lexicographically smallest
//! start coordinates, then the smallest end coordinates.

use crate::logging::log_overlap_resolution;
use crate::prior::IntronLengthPrior;
use crate::types::{intervals_overlap, CutDecision, IntronCandidate};
use std::cmp::Ordering;

/// Statistics of one scaffold's resolution
#[derive(Debug, Default, Clone)]
pub struct ResolutionSummary {
    pub candidates: usize,
    pub duplicates: usize,
    pub unsupported: usize,
    pub overlapping: usize,
    pub selected: usize,
    pub total_score: f64,
}

impl ResolutionSummary {
    pub fn merge(&mut self, other: &ResolutionSummary) {
        self.candidates += other.candidates;
        self.duplicates += other.duplicates;
        self.unsupported += other.unsupported;
        self.overlapping += other.overlapping;
        self.selected += other.selected;
        self.total_score += other.total_score;
    }
}

impl std::fmt::Display for ResolutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} candidates, {} duplicates, {} without prior support, {} in overlaps, {} selected (score {:.4})",
            self.candidates,
            self.duplicates,
            self.unsupported,
            self.overlapping,
            self.selected,
            self.total_score
        )
    }
}

/// Scored interval, sorted by end then start
#[derive(Debug, Clone, Copy)]
struct Weighted {
    start: usize,
    end: usize,
    score: f64,
}

/// Best plan over a prefix of the sorted intervals
#[derive(Debug, Clone, Copy)]
struct Plan {
    score: f64,
    count: usize,
    /// Index of the last selected interval; earlier ones follow `previous`
    last: Option<usize>,
}

/// Relative difference below which two plan scores tie
const SCORE_TOLERANCE: f64 = 1e-9;

const EMPTY_PLAN: Plan = Plan {
    score: 0.0,
    count: 0,
    last: None,
};

pub struct OverlapResolver<'a> {
    prior: &'a IntronLengthPrior,
}

impl<'a> OverlapResolver<'a> {
    pub fn new(prior: &'a IntronLengthPrior) -> Self {
        Self { prior }
    }

    /// Select the cut set of one scaffold
    ///
    /// `candidates` may mix strands; identical intervals are counted once.
    /// Candidates whose length has no prior mass add nothing to the score
    /// but are still cut when nothing better overlaps them.
    pub fn resolve(
        &self,
        scaffold_id: &str,
        candidates: &[IntronCandidate],
    ) -> (Vec<CutDecision>, ResolutionSummary) {
        let intervals: Vec<(usize, usize)> =
            candidates.iter().map(|c| (c.start, c.end)).collect();
        self.resolve_intervals(scaffold_id, &intervals)
    }

    /// Select the cut set from bare `[start, end)` intervals
    pub fn resolve_intervals(
        &self,
        scaffold_id: &str,
        intervals: &[(usize, usize)],
    ) -> (Vec<CutDecision>, ResolutionSummary) {
        let mut summary = ResolutionSummary {
            candidates: intervals.len(),
            ..ResolutionSummary::default()
        };

        let mut unique: Vec<(usize, usize)> = intervals.to_vec();
        unique.sort_unstable_by_key(|&(start, end)| (end, start));
        unique.dedup();
        summary.duplicates = intervals.len() - unique.len();

        let weighted: Vec<Weighted> = unique
            .into_iter()
            .map(|(start, end)| Weighted {
                start,
                end,
                score: self.prior.score(end.saturating_sub(start)),
            })
            .filter(|w| w.start < w.end)
            .collect();
        summary.unsupported = weighted.iter().filter(|w| w.score <= 0.0).count();
        summary.overlapping = count_overlapping(&weighted);

        let selected = select(&weighted);
        summary.selected = selected.len();
        summary.total_score = selected.iter().map(|&i| weighted[i].score).sum();

        let cuts: Vec<CutDecision> = selected
            .into_iter()
            .map(|i| CutDecision {
                scaffold_id: scaffold_id.to_string(),
                start: weighted[i].start,
                end: weighted[i].end,
            })
            .collect();

        log_overlap_resolution(scaffold_id, &summary);
        (cuts, summary)
    }
}

/// Exact weighted interval scheduling over intervals sorted by `(end, start)`
///
/// Returns the selected indices in ascending coordinate order.
fn select(intervals: &[Weighted]) -> Vec<usize> {
    let ends: Vec<usize> = intervals.iter().map(|w| w.end).collect();
    let mut previous: Vec<Option<usize>> = Vec::with_capacity(intervals.len());
    let mut best: Vec<Plan> = Vec::with_capacity(intervals.len() + 1);
    best.push(EMPTY_PLAN);

    for (i, interval) in intervals.iter().enumerate() {
        // intervals before `compatible` all end at or before this one starts
        let compatible = ends[..i].partition_point(|&end| end <= interval.start);
        let base = best[compatible];
        previous.push(base.last);

        let take = Plan {
            score: base.score + interval.score,
            count: base.count + 1,
            last: Some(i),
        };
        let skip = best[i];

        let plan = match compare_plans(&take, &skip, intervals, &previous) {
            Ordering::Greater => take,
            _ => skip,
        };
        best.push(plan);
    }

    best.last()
        .map(|plan| chain(plan.last, &previous))
        .unwrap_or_default()
}

/// Selected indices of a plan, ascending
fn chain(mut last: Option<usize>, previous: &[Option<usize>]) -> Vec<usize> {
    let mut indices = Vec::new();
    while let Some(i) = last {
        indices.push(i);
        last = previous[i];
    }
    indices.reverse();
    indices
}

/// `Greater` when `a` is the preferred plan
fn compare_plans(
    a: &Plan,
    b: &Plan,
    intervals: &[Weighted],
    previous: &[Option<usize>],
) -> Ordering {
    compare_scores(a.score, b.score)
        .then(a.count.cmp(&b.count))
        .then_with(|| {
            let a_chain = chain(a.last, previous);
            let b_chain = chain(b.last, previous);
            let starts = |c: &[usize]| c.iter().map(|&i| intervals[i].start).collect::<Vec<_>>();
            let ends = |c: &[usize]| c.iter().map(|&i| intervals[i].end).collect::<Vec<_>>();

            // smaller coordinates win
            starts(&b_chain)
                .cmp(&starts(&a_chain))
                .then_with(|| ends(&b_chain).cmp(&ends(&a_chain)))
        })
}

/// Scores within a relative `SCORE_TOLERANCE` of each other compare equal
fn compare_scores(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= SCORE_TOLERANCE * a.abs().max(b.abs()) {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Number of intervals sharing a coordinate with at least one other
fn count_overlapping(intervals: &[Weighted]) -> usize {
    let mut by_start: Vec<(usize, usize)> = intervals.iter().map(|w| (w.start, w.end)).collect();
    by_start.sort_unstable();

    let mut flagged = vec![false; by_start.len()];
    let mut reach: Option<(usize, usize)> = None;

    for (i, &interval) in by_start.iter().enumerate() {
        if let Some((furthest, owner)) = reach {
            if intervals_overlap((by_start[owner].0, furthest), interval) {
                flagged[i] = true;
                flagged[owner] = true;
            }
        }
        reach = match reach {
            Some((furthest, owner)) if furthest >= interval.1 => Some((furthest, owner)),
            _ => Some((interval.1, i)),
        };
    }

    flagged.into_iter().filter(|&f| f).count()
}

/// Whether no two cuts share a coordinate
pub fn is_non_overlapping(cuts: &[CutDecision]) -> bool {
    cuts.iter().enumerate().all(|(i, a)| {
        cuts[i + 1..].iter().all(|b| {
            a.scaffold_id != b.scaffold_id
                || !intervals_overlap((a.start, a.end), (b.start, b.end))
        })
    })
}
