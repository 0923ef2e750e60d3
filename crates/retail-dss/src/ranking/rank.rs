use serde::Serialize;

use super::domain::CandidateId;
use super::topsis::CandidateScore;

/// Scores closer than this are treated as tied and ordered by candidate id.
pub const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub candidate_id: CandidateId,
    pub closeness: f64,
    /// 1-based and contiguous within a batch.
    pub rank_position: u32,
}

/// Orders scores by closeness descending with ties broken by ascending candidate id.
pub fn rank(scores: &[CandidateScore]) -> Vec<RankedCandidate> {
    let mut ordered: Vec<&CandidateScore> = scores.iter().collect();
    order_by_closeness(&mut ordered, |score| (score.closeness, score.candidate_id));

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, score)| RankedCandidate {
            candidate_id: score.candidate_id,
            closeness: score.closeness,
            rank_position: index as u32 + 1,
        })
        .collect()
}

/// Sorts any scored items into ranking order; shared by views that mix several batches.
pub fn order_by_closeness<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (f64, CandidateId),
{
    items.sort_by(|left, right| {
        let (left_score, left_id) = key(left);
        let (right_score, right_id) = key(right);
        right_score
            .total_cmp(&left_score)
            .then_with(|| left_id.cmp(&right_id))
    });

    // Epsilon equality is not transitive, so groups are anchored on their first (highest) score.
    let mut start = 0;
    while start < items.len() {
        let anchor = key(&items[start]).0;
        let mut end = start + 1;
        while end < items.len() && (anchor - key(&items[end]).0).abs() <= TIE_EPSILON {
            end += 1;
        }
        items[start..end].sort_by_key(|item| key(item).1);
        start = end;
    }
}
