//! Reciprocal Rank Fusion.
//!
//! fused(d) = Σ 1 / (rank_constant + rank_r(d)) over every list r that
//! contains d, with 1-based ranks. Works on ranks only, so the dense and
//! sparse score scales never need calibrating against each other.

use crate::types::{PointId, ScoredPoint};
use std::collections::HashMap;

pub const DEFAULT_RANK_CONSTANT: u32 = 60;

/// Fuse ranked lists into one list sorted by descending fused score. The
/// returned points carry the fused score; the payload comes from the first
/// list the point appeared in. Ties keep first-seen order.
pub fn reciprocal_rank_fusion(lists: &[Vec<ScoredPoint>], rank_constant: u32) -> Vec<ScoredPoint> {
    let mut fused: Vec<ScoredPoint> = Vec::new();
    let mut slot: HashMap<PointId, usize> = HashMap::new();

    for list in lists {
        for (rank, point) in list.iter().enumerate() {
            let contribution = 1.0 / (rank_constant as f32 + (rank + 1) as f32);
            match slot.get(&point.id) {
                Some(&i) => fused[i].score += contribution,
                None => {
                    slot.insert(point.id.clone(), fused.len());
                    fused.push(ScoredPoint { score: contribution, ..point.clone() });
                }
            }
        }
    }

    // stable sort keeps first-seen order among equal scores
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Payload;

    fn point(id: u64, score: f32) -> ScoredPoint {
        ScoredPoint { id: PointId::Num(id), score, payload: Payload::new() }
    }

    #[test]
    fn overlap_outranks_single_list() {
        let dense = vec![point(1, 0.95), point(2, 0.80), point(3, 0.70)];
        let sparse = vec![point(2, 5.2), point(1, 4.1), point(4, 3.5)];
        let fused = reciprocal_rank_fusion(&[dense, sparse], 60);

        assert_eq!(fused.len(), 4);
        let top: Vec<&PointId> = fused.iter().take(2).map(|p| &p.id).collect();
        assert!(top.contains(&&PointId::Num(1)));
        assert!(top.contains(&&PointId::Num(2)));
    }

    #[test]
    fn appearing_twice_beats_appearing_once_at_same_rank() {
        let a = vec![point(1, 1.0), point(2, 1.0)];
        let b = vec![point(3, 1.0), point(2, 1.0)];
        let fused = reciprocal_rank_fusion(&[a, b], 60);
        let score = |id: u64| fused.iter().find(|p| p.id == PointId::Num(id)).unwrap().score;
        assert!(score(2) > score(1));
        assert!((score(2) - 2.0 / 62.0).abs() < 1e-7);
        assert!((score(1) - 1.0 / 61.0).abs() < 1e-7);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let a = vec![point(10, 0.9)];
        let b = vec![point(20, 7.0)];
        let fused = reciprocal_rank_fusion(&[a, b], 60);
        assert_eq!(fused[0].id, PointId::Num(10));
        assert_eq!(fused[1].id, PointId::Num(20));
    }

    #[test]
    fn empty_lists_fuse_to_nothing() {
        assert!(reciprocal_rank_fusion(&[vec![], vec![]], 60).is_empty());
    }
}
