use std::ops::{AddAssign, Deref, DerefMut, MulAssign};

use serde::{Deserialize, Serialize};

/// A fixed-length feature vector (one analysis frame of an utterance).
///
/// Dereferences to `[f64]`, so slicing, indexing and iteration work as on a
/// plain slice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// Returns a vector of `dim` zeros.
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance(&self, other: &FeatureVector) -> f64 {
        debug_assert_eq!(self.0.len(), other.0.len(), "feature dimension mismatch");
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| {
                let d = a - b;
                d * d
            })
            .sum()
    }

    /// Sets every component to `value`.
    pub fn fill(&mut self, value: f64) {
        self.0.iter_mut().for_each(|x| *x = value);
    }

    /// Arithmetic mean of `vectors`, or `None` if the slice is empty.
    pub fn mean(vectors: &[FeatureVector]) -> Option<FeatureVector> {
        let first = vectors.first()?;
        let mut sum = FeatureVector::zeros(first.dim());
        for v in vectors {
            sum += v;
        }
        sum *= 1.0 / vectors.len() as f64;
        Some(sum)
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl Deref for FeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl DerefMut for FeatureVector {
    fn deref_mut(&mut self) -> &mut [f64] {
        &mut self.0
    }
}

impl AddAssign<&FeatureVector> for FeatureVector {
    fn add_assign(&mut self, rhs: &FeatureVector) {
        debug_assert_eq!(self.0.len(), rhs.0.len(), "feature dimension mismatch");
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a += b;
        }
    }
}

impl MulAssign<f64> for FeatureVector {
    fn mul_assign(&mut self, rhs: f64) {
        for a in self.0.iter_mut() {
            *a *= rhs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_squared_euclidean() {
        let a = FeatureVector::from(vec![0.0, 0.0]);
        let b = FeatureVector::from(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 25.0).abs() < 1e-12);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn arithmetic() {
        let mut a = FeatureVector::from(vec![1.0, 2.0]);
        a += &FeatureVector::from(vec![1.0, 1.0]);
        a *= 0.5;
        assert_eq!(&a[..], &[1.0, 1.5]);

        a.fill(0.0);
        assert_eq!(a, FeatureVector::zeros(2));
    }

    #[test]
    fn mean_of_vectors() {
        let vs = vec![
            FeatureVector::from(vec![0.0, 10.0]),
            FeatureVector::from(vec![2.0, 20.0]),
        ];
        let m = FeatureVector::mean(&vs).unwrap();
        assert_eq!(&m[..], &[1.0, 15.0]);
        assert!(FeatureVector::mean(&[]).is_none());
    }

    #[test]
    fn serializes_as_plain_array() {
        let v = FeatureVector::from(vec![1.5, -2.0]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1.5,-2.0]");
    }
}
