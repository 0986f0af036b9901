//! Organization name matching
//!
//! Relevance order is exact match, then prefix match, then substring match,
//! all case-insensitive. Resolution never guesses between multiple
//! candidates; that decision belongs to the caller.

use donorbase_common::db::DonorRecord;
use serde::Serialize;

/// How strongly a record name matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRank {
    Exact,
    Prefix,
    Substring,
}

/// Rank a single name against a query, if it matches at all
pub fn rank(query: &str, name: &str) -> Option<MatchRank> {
    let query = query.trim().to_lowercase();
    let name = name.to_lowercase();

    if query.is_empty() {
        return None;
    }
    if name == query {
        Some(MatchRank::Exact)
    } else if name.starts_with(&query) {
        Some(MatchRank::Prefix)
    } else if name.contains(&query) {
        Some(MatchRank::Substring)
    } else {
        None
    }
}

/// All matching records, ordered by rank then name
pub fn find_candidates<'a>(
    query: &str,
    records: &'a [DonorRecord],
) -> Vec<(MatchRank, &'a DonorRecord)> {
    let mut candidates: Vec<(MatchRank, &DonorRecord)> = records
        .iter()
        .filter_map(|r| rank(query, &r.organization_name).map(|rank| (rank, r)))
        .collect();

    candidates.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.organization_name.cmp(&b.1.organization_name))
    });
    candidates
}
