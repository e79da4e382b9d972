//! A module for the spatial correlation model of the Kriging process.
//!
//! The correlation between two locations `x` and `x'` at distance `d = |x - x'|`
//! (euclidean norm) is the power exponential function
//!
//! `r(d) = exp(-theta * d^p)`
//!
//! where `theta > 0` controls how fast the correlation decays with the distance
//! and `p` in `[1, 2]` the smoothness of the process: `p = 2` is the squared
//! exponential (gaussian) kernel, `p = 1` the absolute exponential one.

use crate::parameters::Hyperparameters;
use crate::utils::{distances_to, DistanceMatrix};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Power exponential correlation model
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct PowerExponentialCorr();

impl PowerExponentialCorr {
    /// Correlation value at distance `d`
    pub fn value<F: Float>(&self, d: F, hyper: &Hyperparameters<F>) -> F {
        F::exp(-hyper.theta() * d.powf(hyper.p()))
    }

    /// Correlation values for the given distances
    pub fn values<F: Float>(
        &self,
        d: &ArrayBase<impl Data<Elem = F>, Ix1>,
        hyper: &Hyperparameters<F>,
    ) -> Array1<F> {
        d.mapv(|v| self.value(v, hyper))
    }

    /// Correlation matrix (n_obs, n_obs) given pairwise distances of the sample locations.
    ///
    /// Only the upper triangle is computed then mirrored, the diagonal is exactly one.
    pub fn matrix<F: Float>(
        &self,
        distances: &DistanceMatrix<F>,
        hyper: &Hyperparameters<F>,
    ) -> Array2<F> {
        let rxx = self.values(&distances.d, hyper);
        let mut r_mx = Array2::<F>::eye(distances.n_obs);
        Zip::from(distances.d_indices.rows())
            .and(&rxx)
            .for_each(|ij, r| {
                r_mx[[ij[0], ij[1]]] = *r;
                r_mx[[ij[1], ij[0]]] = *r;
            });
        r_mx
    }
}

impl fmt::Display for PowerExponentialCorr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PowerExponential")
    }
}

/// Correlation value `exp(-theta * d^p)` at distance `d`
pub fn correlation<F: Float>(d: F, hyper: &Hyperparameters<F>) -> F {
    PowerExponentialCorr().value(d, hyper)
}

/// Correlation matrix `R` of the given locations (n, nx):
/// `R_ij = exp(-theta * |x_i - x_j|^p)`.
///
/// Coincident locations are not detected here, they result in a singular matrix.
pub fn correlation_matrix<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    hyper: &Hyperparameters<F>,
) -> Array2<F> {
    PowerExponentialCorr().matrix(&DistanceMatrix::new(x), hyper)
}

/// Correlation vector `psi` between a query point (nx,) and every location of `x` (n, nx)
pub fn correlation_vector<F: Float>(
    query: &ArrayBase<impl Data<Elem = F>, Ix1>,
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    hyper: &Hyperparameters<F>,
) -> Array1<F> {
    PowerExponentialCorr().values(&distances_to(query, x), hyper)
}

/// Correlation values versus distances, to inspect the kernel shape of given hyperparameters
pub fn correlation_profile<F: Float>(
    distances: &ArrayBase<impl Data<Elem = F>, Ix1>,
    hyper: &Hyperparameters<F>,
) -> Array1<F> {
    PowerExponentialCorr().values(&distances.mapv(|v| v.abs()), hyper)
}
