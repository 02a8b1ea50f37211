//! Dynamic Jaccard concept clusterer (spec.md §4.5, component C5).
//!
//! Collapses near-synonymous sectors (e.g. "CPO" vs "optical-communications")
//! before a ranked sector list is presented, bounded to stay sub-linear on
//! large sector universes.

use rustc_hash::FxHashSet;

/// Known-in-advance comparison threshold; a cheap pre-check against the
/// top-5 weight stocks before falling back to the full membership Jaccard.
const FAST_MATCH_THRESHOLD: usize = 2;
const JACCARD_THRESHOLD: f64 = 0.35;
const MAX_COMPARISONS: usize = 50;
const COMPARISON_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct SectorCandidate {
    pub name: String,
    pub score: f64,
    /// Top-5-by-turnover constituent codes, for the fast pre-check.
    pub top5: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredSector {
    pub name: String,
    pub score: f64,
    pub aggregated_sectors: Vec<String>,
    pub aggregated_count: usize,
    pub display_label: String,
}

/// Supplies full constituent sets for the deep Jaccard check, only called
/// when the fast top-5 overlap check misses.
pub trait SectorMembership {
    fn full_members(&self, sector_name: &str) -> FxHashSet<String>;
}

fn jaccard(a: &FxHashSet<String>, b: &FxHashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    if intersection == 0 {
        return 0.0;
    }
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

fn is_similar(a: &SectorCandidate, b: &SectorCandidate, membership: &dyn SectorMembership) -> bool {
    let top5_a: FxHashSet<&String> = a.top5.iter().collect();
    let top5_b: FxHashSet<&String> = b.top5.iter().collect();
    if top5_a.intersection(&top5_b).count() >= FAST_MATCH_THRESHOLD {
        return true;
    }
    let full_a = membership.full_members(&a.name);
    let full_b = membership.full_members(&b.name);
    jaccard(&full_a, &full_b) >= JACCARD_THRESHOLD
}

/// Clusters `candidates` (any score order — sorted internally, descending)
/// against the 10-ahead sliding window, bounded to 50 total pairwise
/// comparisons. Sectors not reached once the budget is spent pass through
/// unclustered.
pub fn cluster_sectors(
    candidates: Vec<SectorCandidate>,
    membership: &dyn SectorMembership,
) -> Vec<ClusteredSector> {
    let mut sorted = candidates;
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let mut processed = vec![false; n];
    let mut comparisons = 0usize;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        if processed[i] {
            continue;
        }
        let mut aggregated = Vec::new();
        let mut budget_exhausted = false;

        let window_end = (i + 1 + COMPARISON_WINDOW).min(n);
        for j in (i + 1)..window_end {
            if processed[j] {
                continue;
            }
            if comparisons >= MAX_COMPARISONS {
                budget_exhausted = true;
                break;
            }
            comparisons += 1;
            if is_similar(&sorted[i], &sorted[j], membership) {
                aggregated.push(sorted[j].name.clone());
                processed[j] = true;
            }
        }

        processed[i] = true;
        let display_label = if aggregated.is_empty() {
            sorted[i].name.clone()
        } else {
            format!("{} (aggregated: {})", sorted[i].name, aggregated.join(", "))
        };
        out.push(ClusteredSector {
            name: sorted[i].name.clone(),
            score: sorted[i].score,
            aggregated_count: aggregated.len(),
            aggregated_sectors: aggregated,
            display_label,
        });

        if budget_exhausted {
            // Remaining unprocessed sectors pass through unclustered.
            for k in (i + 1)..n {
                if !processed[k] {
                    processed[k] = true;
                    out.push(ClusteredSector {
                        name: sorted[k].name.clone(),
                        score: sorted[k].score,
                        aggregated_sectors: Vec::new(),
                        aggregated_count: 0,
                        display_label: sorted[k].name.clone(),
                    });
                }
            }
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedMembership(HashMap<String, FxHashSet<String>>);
    impl SectorMembership for FixedMembership {
        fn full_members(&self, sector_name: &str) -> FxHashSet<String> {
            self.0.get(sector_name).cloned().unwrap_or_default()
        }
    }

    fn set(codes: &[&str]) -> FxHashSet<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn e2e_2_fast_match_collapses_into_higher_scored_sector() {
        // spec.md §8 E2E-2
        let cpo = SectorCandidate {
            name: "CPO".into(),
            score: 90.0,
            top5: vec!["600000".into(), "600001".into(), "600002".into()],
        };
        let optical = SectorCandidate {
            name: "optical-communications".into(),
            score: 70.0,
            top5: vec!["600000".into(), "600001".into(), "600002".into()],
        };
        let membership = FixedMembership(HashMap::new());
        let out = cluster_sectors(vec![optical, cpo], &membership);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "CPO");
        assert_eq!(out[0].aggregated_sectors, vec!["optical-communications"]);
        assert!(out[0].display_label.contains("aggregated: optical-communications"));
    }

    #[test]
    fn deep_jaccard_used_when_fast_check_misses() {
        let mut members = HashMap::new();
        members.insert("a".to_string(), set(&["1", "2", "3", "4"]));
        members.insert("b".to_string(), set(&["1", "2", "3", "5"]));
        // top5 overlap is 1 (only "1"), fast check misses; jaccard = 3/5 = 0.6 >= 0.35
        let a = SectorCandidate { name: "a".into(), score: 80.0, top5: vec!["1".into()] };
        let b = SectorCandidate { name: "b".into(), score: 60.0, top5: vec!["1".into()] };
        let membership = FixedMembership(members);
        let out = cluster_sectors(vec![a, b], &membership);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "a");
    }

    #[test]
    fn dissimilar_sectors_stay_separate() {
        let mut members = HashMap::new();
        members.insert("a".to_string(), set(&["1", "2"]));
        members.insert("b".to_string(), set(&["3", "4"]));
        let a = SectorCandidate { name: "a".into(), score: 80.0, top5: vec!["1".into()] };
        let b = SectorCandidate { name: "b".into(), score: 60.0, top5: vec!["3".into()] };
        let membership = FixedMembership(members);
        let out = cluster_sectors(vec![a, b], &membership);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn comparison_budget_passes_remaining_sectors_through_unclustered() {
        let names: Vec<SectorCandidate> = (0..60)
            .map(|i| SectorCandidate {
                name: format!("sector_{i}"),
                score: 100.0 - i as f64,
                top5: vec![format!("code_{i}")],
            })
            .collect();
        let membership = FixedMembership(HashMap::new());
        let out = cluster_sectors(names, &membership);
        // No fast/deep matches anywhere, so every sector passes through
        // regardless of budget; this exercises that the budget-exhaustion
        // path doesn't drop or duplicate sectors.
        assert_eq!(out.len(), 60);
    }
}
