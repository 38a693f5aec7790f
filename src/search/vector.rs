use serde::Deserialize;

/// Similarity function used to rank stored chunks against a query vector.
///
/// Must match the space the embedding service produces: OpenAI embeddings are
/// unit-normalized, so both metrics rank identically there; `Cosine` stays
/// correct for collaborators that do not normalize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    DotProduct,
}

impl SimilarityMetric {
    /// Score `candidate` against `query`. Callers guarantee equal lengths.
    pub fn score(self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(query, candidate),
            Self::DotProduct => dot_product(query, candidate),
        }
    }
}

/// Inner product of two equal-length vectors
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors
///
/// Returns a score in [-1.0, 1.0], or 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Order `(score, position)` pairs best-first and keep the top `k`.
///
/// The sort is stable, so equal scores keep their input order; callers pass
/// candidates in insertion order to get earliest-first tie breaking.
/// NaN scores rank last.
pub fn top_k_by_score<T>(mut scored: Vec<(f32, T)>, k: usize) -> Vec<(f32, T)> {
    scored.sort_by(|a, b| rank_key(b.0).total_cmp(&rank_key(a.0)));
    scored.truncate(k);
    scored
}

// `+ 0.0` folds -0.0 into 0.0 so the two still tie
fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score + 0.0
    }
}
