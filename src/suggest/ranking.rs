use strsim::jaro_winkler;

use super::provider::CandidateItem;

/// Minimum Jaro-Winkler similarity for a candidate with no substring match
/// to stay in the list.
const FUZZY_FLOOR: f64 = 0.74;

/// Fuzzy scores start here; substring scores are capped below it, so an
/// exact substring hit always ranks ahead of a fuzzy-only match.
const FUZZY_BASE: u32 = 10_000;

/// One ranked candidate; lower score is a better match.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub item: CandidateItem,
    pub score: u32,
}

/// Ranks candidates for a query. An empty query returns the full set in
/// provider order; a non-empty query is matched case-insensitively against
/// each candidate's searchable text (substring position first, then
/// edit-distance-tolerant token similarity) and may produce an empty list.
/// The sort is stable, so provider order breaks ties.
pub fn rank(query: &str, items: &[CandidateItem]) -> Vec<RankedCandidate> {
    if query.is_empty() {
        return items
            .iter()
            .cloned()
            .map(|item| RankedCandidate { item, score: 0 })
            .collect();
    }

    let needle = query.to_lowercase();
    let mut ranked: Vec<RankedCandidate> = items
        .iter()
        .filter_map(|item| {
            match_score(&needle, item).map(|score| RankedCandidate {
                item: item.clone(),
                score,
            })
        })
        .collect();
    ranked.sort_by_key(|r| r.score);
    ranked
}

fn match_score(needle: &str, item: &CandidateItem) -> Option<u32> {
    let haystack = item.searchable.to_lowercase();
    if let Some(pos) = haystack.find(needle) {
        return Some((pos as u32).min(FUZZY_BASE - 1));
    }
    let best = haystack
        .split_whitespace()
        .map(|token| jaro_winkler(needle, token))
        .fold(0.0_f64, f64::max);
    if best >= FUZZY_FLOOR {
        Some(FUZZY_BASE + ((1.0 - best) * 1000.0) as u32)
    } else {
        None
    }
}
