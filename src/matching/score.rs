//! Sparse-vector match scoring.
//!
//! Volunteer claims form a weighted sparse vector over the skill taxonomy;
//! project requirements form a binary one. Scores are deterministic
//! functions of the two sets: identical inputs always produce identical
//! outputs.

use std::collections::BTreeSet;

/// Result of scoring one (volunteer, project) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    /// Weighted cosine similarity in [0, 1].
    pub score: f64,
    /// Jaccard index of the two skill id sets, in [0, 1].
    pub jaccard: f64,
    /// Skill ids in both the claim set and the requirement set, sorted.
    pub matched_skill_ids: Vec<String>,
}

/// Score a volunteer's weighted claims against a project's requirement
/// set.
///
/// cosine = Σ_{s∈I} w_s / (√(Σ_{s∈C} w_s²) · √|R|) over the intersection
/// I; 0 when either denominator factor is 0. Returns None when the
/// intersection is empty: the index stays sparse by omitting zero rows.
pub fn score_pair(claims: &[(String, f64)], requirements: &BTreeSet<String>) -> Option<PairScore> {
    if claims.is_empty() || requirements.is_empty() {
        return None;
    }

    let mut matched: Vec<String> = Vec::new();
    let mut numerator = 0.0;
    let mut claim_norm_sq = 0.0;
    for (skill_id, weight) in claims {
        claim_norm_sq += weight * weight;
        if requirements.contains(skill_id) {
            matched.push(skill_id.clone());
            numerator += weight;
        }
    }
    if matched.is_empty() {
        return None;
    }
    matched.sort();

    let denominator = claim_norm_sq.sqrt() * (requirements.len() as f64).sqrt();
    let score = if denominator == 0.0 {
        0.0
    } else {
        (numerator / denominator).clamp(0.0, 1.0)
    };

    let union = requirements.len() + claims.len() - matched.len();
    let jaccard = if union == 0 {
        0.0
    } else {
        matched.len() as f64 / union as f64
    };

    Some(PairScore {
        score,
        jaccard,
        matched_skill_ids: matched,
    })
}
