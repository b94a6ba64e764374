//! Donor/acceptor pairing into length-bounded intron candidates

use crate::types::{ClassifiedSite, IntronCandidate, IntronGeometry, SiteKind, Strand};
use log::debug;

/// Sorted, deduplicated positive positions of one kind on one strand
fn positive_positions(sites: &[ClassifiedSite], strand: Strand, kind: SiteKind) -> Vec<usize> {
    let mut positions: Vec<usize> = sites
        .iter()
        .filter(|site| site.positive && site.strand == strand && site.kind == kind)
        .map(|site| site.position)
        .collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

/// Enumerate every admissible (donor, acceptor) pair of one scaffold and strand
///
/// Both admissible acceptor bounds grow with the donor position, so a single
/// sliding window over the sorted acceptors serves all donors. Candidates are
/// emitted in ascending donor order, then ascending acceptor order.
pub fn pair_sites(
    scaffold_id: &str,
    strand: Strand,
    donors: &[ClassifiedSite],
    acceptors: &[ClassifiedSite],
    geometry: &IntronGeometry,
) -> Vec<IntronCandidate> {
    let donors = positive_positions(donors, strand, SiteKind::Donor);
    let acceptors = positive_positions(acceptors, strand, SiteKind::Acceptor);

    let mut candidates = Vec::new();
    let mut window_start = 0;

    for &donor in &donors {
        let Some(range) = geometry.acceptor_range(strand, donor) else {
            continue;
        };

        while window_start < acceptors.len() && acceptors[window_start] < *range.start() {
            window_start += 1;
        }

        for &acceptor in acceptors[window_start..]
            .iter()
            .take_while(|&&acceptor| acceptor <= *range.end())
        {
            let Some((start, end)) = geometry.span(strand, donor, acceptor) else {
                continue;
            };
            candidates.push(IntronCandidate {
                scaffold_id: scaffold_id.to_string(),
                strand,
                donor_position: donor,
                acceptor_position: acceptor,
                start,
                end,
            });
        }
    }

    debug!(
        "{} ({}): paired {} donors and {} acceptors into {} intron candidates",
        scaffold_id,
        strand,
        donors.len(),
        acceptors.len(),
        candidates.len()
    );

    candidates
}
