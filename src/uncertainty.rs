//! Initial calibration uncertainty.
//!
//! Nine independent magnitudes in the order rotation (3), translation (3),
//! point (3), placed on the diagonal of a 9x9 matrix.

use nalgebra::{SMatrix, SVector, Vector3};
use serde::{Serialize, Serializer};

use crate::error::{ConfigError, Result};

/// 9x9 matrix
pub type Matrix9 = SMatrix<f64, 9, 9>;

/// 9-vector
pub type Vector9 = SVector<f64, 9>;

/// Diagonal 9x9 uncertainty matrix. Off-diagonal entries are always zero.
#[derive(Clone, Debug, PartialEq)]
pub struct UncertaintyMatrix {
    matrix: Matrix9,
}

impl UncertaintyMatrix {
    /// Number of diagonal entries
    pub const LEN: usize = 9;

    /// Build from the nine diagonal magnitudes
    pub fn from_diagonal(values: &[f64; 9]) -> Self {
        Self {
            matrix: Matrix9::from_diagonal(&Vector9::from_row_slice(values)),
        }
    }

    /// Build from a slice read under `key`; it must hold exactly nine values.
    pub fn from_slice(key: &str, values: &[f64]) -> Result<Self> {
        let values: &[f64; 9] = values.try_into().map_err(|_| {
            ConfigError::schema(
                key,
                format!("expected {} values, found {}", Self::LEN, values.len()),
            )
        })?;
        Ok(Self::from_diagonal(values))
    }

    /// Full 9x9 matrix
    pub fn matrix(&self) -> &Matrix9 {
        &self.matrix
    }

    /// Diagonal entries in input order
    pub fn diagonal(&self) -> Vector9 {
        self.matrix.diagonal()
    }

    /// Rotation magnitudes (entries 0..3)
    pub fn rotation(&self) -> Vector3<f64> {
        self.diagonal().fixed_rows::<3>(0).into_owned()
    }

    /// Translation magnitudes (entries 3..6)
    pub fn translation(&self) -> Vector3<f64> {
        self.diagonal().fixed_rows::<3>(3).into_owned()
    }

    /// Point magnitudes (entries 6..9)
    pub fn point(&self) -> Vector3<f64> {
        self.diagonal().fixed_rows::<3>(6).into_owned()
    }
}

impl Serialize for UncertaintyMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.diagonal().iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XI: [f64; 9] = [1.0, 1.0, 1.0, 0.1, 0.1, 0.1, 0.01, 0.01, 0.01];

    #[test]
    fn test_diagonal_matches_input() {
        let xi = UncertaintyMatrix::from_diagonal(&XI);
        let m = xi.matrix();
        for r in 0..9 {
            for c in 0..9 {
                if r == c {
                    assert_eq!(m[(r, c)], XI[r]);
                } else {
                    assert_eq!(m[(r, c)], 0.0);
                }
            }
        }
        assert_eq!(xi.diagonal().as_slice(), &XI);
    }

    #[test]
    fn test_blocks() {
        let xi = UncertaintyMatrix::from_diagonal(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(xi.rotation(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(xi.translation(), Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(xi.point(), Vector3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_wrong_length() {
        let err = UncertaintyMatrix::from_slice("uncertainty_calib", &XI[..8]).unwrap_err();
        assert_eq!(err.key(), Some("uncertainty_calib"));
        assert!(UncertaintyMatrix::from_slice("uncertainty_calib", &[0.0; 10]).is_err());
    }
}
