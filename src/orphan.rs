//! Orphan acceptor filtering
//!
//! An acceptor that has no donor within intron-length reach can never be
//! paired, so it is dropped before the acceptor classifier sees it.

use crate::types::{IntronGeometry, SiteKind, SpliceCandidate};
use log::debug;

/// Acceptors split by whether a donor is within reach
#[derive(Debug, Default)]
pub struct OrphanFilterResult {
    pub retained: Vec<SpliceCandidate>,
    pub orphans: usize,
}

/// Whether any position of the sorted `donors` lies in the donor range of `acceptor`
pub fn has_donor_in_range(
    acceptor: &SpliceCandidate,
    donors: &[usize],
    geometry: &IntronGeometry,
) -> bool {
    let Some(range) = geometry.donor_range(acceptor.strand, acceptor.position) else {
        return false;
    };

    let first = donors.partition_point(|&donor| donor < *range.start());
    donors
        .get(first)
        .is_some_and(|donor| range.contains(donor))
}

/// Drop acceptors without a donor position that could open an intron ending at them
///
/// `donor_positions` must belong to the same scaffold and strand as the
/// acceptors; they are sorted here so callers can pass them in scan order or
/// classification order alike.
pub fn filter_orphan_acceptors(
    acceptors: Vec<SpliceCandidate>,
    donor_positions: &[usize],
    geometry: &IntronGeometry,
) -> OrphanFilterResult {
    let mut donors = donor_positions.to_vec();
    donors.sort_unstable();
    donors.dedup();

    let total = acceptors.len();
    let retained: Vec<SpliceCandidate> = acceptors
        .into_iter()
        .filter(|acceptor| {
            debug_assert_eq!(acceptor.kind, SiteKind::Acceptor);
            has_donor_in_range(acceptor, &donors, geometry)
        })
        .collect();

    let orphans = total - retained.len();
    if orphans > 0 {
        debug!(
            "Orphan filter removed {} of {} acceptor candidates",
            orphans, total
        );
    }

    OrphanFilterResult { retained, orphans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;

    fn acceptor(position: usize, strand: Strand) -> SpliceCandidate {
        SpliceCandidate {
            scaffold_id: "scaffold_1".to_string(),
            position,
            strand,
            kind: SiteKind::Acceptor,
            window: Vec::new(),
        }
    }

    fn geometry(min: usize, max: usize) -> IntronGeometry {
        IntronGeometry {
            min_length: min,
            max_length: max,
            donor_len: 2,
            acceptor_len: 2,
        }
    }

    #[test]
    fn test_acceptor_without_upstream_donor_is_removed() {
        // no donor within [10, 600] upstream of the acceptor at 500
        let geometry = geometry(10, 600);
        let acceptors = vec![acceptor(500, Strand::Plus)];
        let result = filter_orphan_acceptors(acceptors, &[495, 900], &geometry);

        assert!(result.retained.is_empty());
        assert_eq!(result.orphans, 1);
    }

    #[test]
    fn test_acceptor_with_donor_in_range_is_kept() {
        let geometry = geometry(40, 100);
        let acceptors = vec![acceptor(120, Strand::Plus), acceptor(300, Strand::Plus)];
        let result = filter_orphan_acceptors(acceptors, &[40], &geometry);

        assert_eq!(result.retained.len(), 1);
        assert_eq!(result.retained[0].position, 120);
        assert_eq!(result.orphans, 1);
    }

    #[test]
    fn test_minus_strand_looks_downstream() {
        let geometry = geometry(40, 100);
        let acceptors = vec![acceptor(40, Strand::Minus)];

        let upstream = filter_orphan_acceptors(acceptors.clone(), &[0, 10], &geometry);
        assert!(upstream.retained.is_empty());

        let downstream = filter_orphan_acceptors(acceptors, &[120], &geometry);
        assert_eq!(downstream.retained.len(), 1);
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let geometry = geometry(40, 100);
        // donor 22 -> intron [22, 62) of length 40; donor 0 -> length 62
        let at_min =
            filter_orphan_acceptors(vec![acceptor(60, Strand::Plus)], &[22], &geometry);
        assert_eq!(at_min.retained.len(), 1);

        // donor 23 -> length 39
        let below_min =
            filter_orphan_acceptors(vec![acceptor(60, Strand::Plus)], &[23], &geometry);
        assert!(below_min.retained.is_empty());

        // donor 100 -> intron [100, 202) of length 102
        let above_max =
            filter_orphan_acceptors(vec![acceptor(200, Strand::Plus)], &[100], &geometry);
        assert!(above_max.retained.is_empty());
        let at_max =
            filter_orphan_acceptors(vec![acceptor(200, Strand::Plus)], &[102], &geometry);
        assert_eq!(at_max.retained.len(), 1);
    }

    #[test]
    fn test_never_removes_acceptor_with_candidate_in_range() {
        let geometry = geometry(10, 60);
        let donors: Vec<usize> = (0..400).filter(|p| p % 7 == 0).collect();

        for strand in [Strand::Plus, Strand::Minus] {
            let acceptors: Vec<_> = (0..400).map(|p| acceptor(p, strand)).collect();
            let result = filter_orphan_acceptors(acceptors.clone(), &donors, &geometry);
            let retained: Vec<usize> = result.retained.iter().map(|a| a.position).collect();

            for candidate in &acceptors {
                let pairable = donors
                    .iter()
                    .any(|&donor| geometry.span(strand, donor, candidate.position).is_some());
                assert_eq!(pairable, retained.contains(&candidate.position));
            }
        }
    }
}
