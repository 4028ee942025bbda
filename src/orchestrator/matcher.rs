//! Stage-1 reducer: narrows the raw candidate list down to a `Resolution`.

use crate::model::{Candidate, Query, Resolution};

/// Keep candidates whose label equals `query.primary` and whose disambiguator equals
/// `query.disambiguator`. Comparison is exact and case-sensitive. An empty disambiguator
/// matches every region. Source order is preserved.
pub fn match_candidates<P>(query: &Query, raw: Vec<Candidate<P>>) -> Resolution<P> {
    let mut matched: Vec<Candidate<P>> = raw
        .into_iter()
        .filter(|c| {
            c.label == query.primary
                && (query.disambiguator.is_empty() || c.disambiguator == query.disambiguator)
        })
        .collect();

    match matched.len() {
        0 => Resolution::NoMatch,
        1 => Resolution::UniqueMatch(matched.remove(0)),
        _ => Resolution::Ambiguous(matched),
    }
}
