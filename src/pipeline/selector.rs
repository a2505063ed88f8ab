use crate::models::Candidate;
use std::cmp::Ordering;

/// Ranking: confidence descending, then most recent contextual date with
/// undated candidates last. Equal candidates keep gathering order.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence.cmp(&a.confidence).then_with(|| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

/// Sort scored candidates best first.
pub fn rank_all(candidates: &mut [Candidate]) {
    candidates.sort_by(rank);
}

/// Best candidate, or `None` for an empty list.
pub fn select(mut candidates: Vec<Candidate>) -> Option<Candidate> {
    rank_all(&mut candidates);
    candidates.into_iter().next()
}
