//! Cosine similarity and the pairwise similarity matrix.
//!
//! Similarity between two items is the dot product of their unit-normalized
//! vectors, except that anything involving an all-zero vector is 0. The
//! matrix is rebuilt from scratch after every structural change of the store.

/// Normalize a vector to unit length in place.
pub fn normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for val in v.iter_mut() {
            *val = (*val as f64 / norm) as f32;
        }
    }
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 when either vector is all zeros, including a zero vector
/// compared with itself.
///
/// # Panics
/// Panics if vectors have different dimensions.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot(a, b) / (norm_a * norm_b)) as f32
}

/// Square, symmetric matrix of pairwise cosine similarities, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    /// Compute the full matrix over `vectors`.
    ///
    /// Each vector is normalized once; the upper triangle is computed and
    /// mirrored. The diagonal is exactly 1.0 for non-zero vectors and 0.0
    /// for zero vectors.
    ///
    /// # Panics
    /// Panics if vectors have different dimensions.
    pub fn compute<V: AsRef<[f32]>>(vectors: &[V]) -> Self {
        let n = vectors.len();
        let normalized: Vec<Option<Vec<f32>>> = vectors
            .iter()
            .map(|v| {
                let v = v.as_ref();
                if l2_norm(v) == 0.0 {
                    None
                } else {
                    let mut unit = v.to_vec();
                    normalize(&mut unit);
                    Some(unit)
                }
            })
            .collect();

        if let Some(first) = vectors.first() {
            let dim = first.as_ref().len();
            for v in vectors {
                assert_eq!(v.as_ref().len(), dim, "Vectors must have same dimension");
            }
        }

        let mut values = vec![0.0f32; n * n];
        for i in 0..n {
            let Some(unit_i) = &normalized[i] else {
                continue;
            };
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                if let Some(unit_j) = &normalized[j] {
                    let sim = dot(unit_i, unit_j) as f32;
                    values[i * n + j] = sim;
                    values[j * n + i] = sim;
                }
            }
        }

        Self { n, values }
    }

    /// Build a matrix from explicit rows.
    ///
    /// Returns `None` if the rows do not form a square matrix.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Option<Self> {
        let n = rows.len();
        if rows.iter().any(|row| row.len() != n) {
            return None;
        }
        Some(Self {
            n,
            values: rows.into_iter().flatten().collect(),
        })
    }

    /// Matrix dimension (number of items).
    pub fn len(&self) -> usize {
        self.n
    }

    /// True for the 0x0 matrix.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Similarity between items `i` and `j`.
    ///
    /// # Panics
    /// Panics if either index is out of range.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(i < self.n && j < self.n, "index out of range");
        self.values[i * self.n + j]
    }

    /// Row `i` of the matrix.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks() rejects a zero chunk size
        self.values.chunks(self.n.max(1))
    }

    /// Flat row-major view, for output formatting.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// True when item `i` has zero self-similarity (a zero-vector item).
    pub fn is_null(&self, i: usize) -> bool {
        self.get(i, i) == 0.0
    }

    /// True when `get(i, j) == get(j, i)` for every pair.
    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| ((i + 1)..self.n).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// Drop row and column `index`, shifting later items down by one.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.n, "index out of range");
        let n = self.n;
        let mut values = Vec::with_capacity((n - 1) * (n - 1));
        for i in (0..n).filter(|&i| i != index) {
            let row = &self.values[i * n..(i + 1) * n];
            values.extend(
                row.iter()
                    .enumerate()
                    .filter(|&(j, _)| j != index)
                    .map(|(_, &v)| v),
            );
        }
        self.n = n - 1;
        self.values = values;
    }
}
