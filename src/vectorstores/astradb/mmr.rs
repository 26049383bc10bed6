/// Cosine similarity; zero vectors are dissimilar to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Selects up to `k` candidate indices by maximal marginal relevance.
///
/// `lambda_mult` of 1 ranks by relevance alone, 0 by diversity alone. The
/// first pick is always the candidate most similar to the query.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    lambda_mult: f32,
    k: usize,
) -> Vec<usize> {
    let limit = k.min(candidates.len());
    if limit == 0 {
        return Vec::new();
    }

    let to_query: Vec<f32> = candidates.iter().map(|c| cosine_similarity(query, c)).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(limit);

    while selected.len() < limit {
        let mut best: Option<(usize, f32)> = None;
        for (i, relevance) in to_query.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let redundancy = selected
                .iter()
                .map(|&j| cosine_similarity(&candidates[i], &candidates[j]))
                .fold(f32::NEG_INFINITY, f32::max);
            let score = if selected.is_empty() {
                *relevance
            } else {
                lambda_mult * relevance - (1.0 - lambda_mult) * redundancy
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, _)) => selected.push(i),
            None => break,
        }
    }

    selected
}
