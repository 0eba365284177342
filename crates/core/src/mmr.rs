//! Maximal marginal relevance re-ranking.
//!
//! Starting from the candidate closest to the query, each step picks the candidate with the
//! best trade-off between similarity to the query and dissimilarity to what is already
//! selected: `lambda * sim(query, c) - (1 - lambda) * max(sim(c, s) for s in selected)`.

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (dot / denom) as f32
    }
}

/// Indices into `candidates`, in selection order, of at most `k` picks.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    lambda: f32,
    k: usize,
) -> Vec<usize> {
    let limit = k.min(candidates.len());
    if limit == 0 {
        return Vec::new();
    }

    let query_similarity = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect::<Vec<_>>();

    let mut selected = Vec::with_capacity(limit);
    let mut is_selected = vec![false; candidates.len()];
    // Highest similarity to anything already selected, per candidate.
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    let mut next = argmax(&query_similarity, &is_selected);
    while let Some(index) = next {
        selected.push(index);
        is_selected[index] = true;
        if selected.len() == limit {
            break;
        }

        for (position, candidate) in candidates.iter().enumerate() {
            if !is_selected[position] {
                let similarity = cosine_similarity(candidate, &candidates[index]);
                redundancy[position] = redundancy[position].max(similarity);
            }
        }

        let scores = query_similarity
            .iter()
            .zip(redundancy.iter())
            .map(|(relevance, redundant)| lambda * relevance - (1.0 - lambda) * redundant)
            .collect::<Vec<_>>();
        next = argmax(&scores, &is_selected);
    }

    selected
}

fn argmax(scores: &[f32], excluded: &[bool]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(position, _)| !excluded[*position])
        .fold(None, |best: Option<(usize, f32)>, (position, &score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((position, score)),
        })
        .map(|(position, _)| position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn first_pick_is_most_similar_to_query() {
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.1], vec![0.7, 0.7]];
        let picks = maximal_marginal_relevance(&[1.0, 0.0], &candidates, 0.5, 1);
        assert_eq!(picks, vec![1]);
    }

    #[test]
    fn near_duplicates_are_pushed_down() {
        let candidates = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.99, 0.01, 0.0],
            vec![0.6, 0.0, 0.8],
        ];
        let picks = maximal_marginal_relevance(&[1.0, 0.0, 0.3], &candidates, 0.5, 3);
        assert_eq!(picks, vec![0, 2, 1]);
    }

    #[test]
    fn returns_every_candidate_once_when_k_exceeds_pool() {
        let candidates = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mut picks = maximal_marginal_relevance(&[1.0, 1.0], &candidates, 0.5, 20);
        picks.sort_unstable();
        assert_eq!(picks, vec![0, 1]);
        assert!(maximal_marginal_relevance(&[1.0], &[], 0.5, 20).is_empty());
    }
}
