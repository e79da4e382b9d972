use crate::errors::{KrigingError, Result};
use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix1, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Training data of a Kriging model: `n` input locations given as a (n, nx) matrix
/// paired with `n` scalar output values.
///
/// The set is validated at construction: at least two samples, as many locations
/// as values, finite entries and no duplicated location (a repeated row makes the
/// correlation matrix singular). Pairwise distances between locations are computed
/// once and reused by every correlation matrix built from this set.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(
        try_from = "RawSampleSet<F>",
        bound(deserialize = "F: Deserialize<'de>")
    )
)]
pub struct SampleSet<F: Float> {
    x: Array2<F>,
    y: Array1<F>,
    #[cfg_attr(feature = "serializable", serde(skip_serializing))]
    distances: DistanceMatrix<F>,
}

/// Stored locations and values, distances are recomputed on deserialization
#[cfg(feature = "serializable")]
#[derive(Deserialize)]
struct RawSampleSet<F> {
    x: Array2<F>,
    y: Array1<F>,
}

#[cfg(feature = "serializable")]
impl<F: Float> TryFrom<RawSampleSet<F>> for SampleSet<F> {
    type Error = KrigingError;

    fn try_from(raw: RawSampleSet<F>) -> Result<Self> {
        SampleSet::new(raw.x, raw.y)
    }
}

impl<F: Float> SampleSet<F> {
    /// Constructor given locations as a (n, nx) matrix and values as a (n,) vector
    pub fn new(x: Array2<F>, y: Array1<F>) -> Result<Self> {
        if x.nrows() < 2 {
            return Err(KrigingError::InvalidSampleSet(format!(
                "at least 2 samples are required, got {}",
                x.nrows()
            )));
        }
        if x.ncols() == 0 {
            return Err(KrigingError::InvalidSampleSet(
                "sample locations should have at least one component".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(KrigingError::InvalidSampleSet(format!(
                "{} locations given for {} values",
                x.nrows(),
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(KrigingError::InvalidSampleSet(
                "sample locations and values should be finite".to_string(),
            ));
        }

        let distances = DistanceMatrix::new(&x);
        if let Some((i, j)) = distances.first_coincident() {
            return Err(KrigingError::SingularCorrelation(format!(
                "sample locations #{i} and #{j} coincide"
            )));
        }
        Ok(SampleSet { x, y, distances })
    }

    /// Constructor for one-dimensional locations
    pub fn from_vecs(x: Vec<F>, y: Vec<F>) -> Result<Self> {
        let n = x.len();
        let x = Array2::from_shape_vec((n, 1), x)
            .map_err(|e| KrigingError::InvalidSampleSet(e.to_string()))?;
        Self::new(x, Array1::from_vec(y))
    }

    /// Sample locations (n, nx)
    pub fn x(&self) -> &Array2<F> {
        &self.x
    }

    /// Sample values (n,)
    pub fn y(&self) -> &Array1<F> {
        &self.y
    }

    /// Number of samples
    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    /// Dimension of the sample locations
    pub fn dim(&self) -> usize {
        self.x.ncols()
    }

    /// Pairwise distances between sample locations
    pub fn distances(&self) -> &DistanceMatrix<F> {
        &self.distances
    }

    /// Check that the given points (m, nx) have the dimension of the sample locations
    pub(crate) fn check_query(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        if x.ncols() != self.dim() {
            return Err(KrigingError::InvalidSampleSet(format!(
                "query points of dimension {} given, expected {}",
                x.ncols(),
                self.dim()
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(KrigingError::InvalidSampleSet(
                "query points should be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// A structure to retain euclidean distances between locations used to compute correlation matrix
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct DistanceMatrix<F: Float> {
    /// Distances as (n_obs * (n_obs-1))/2 array, upper triangle row by row
    pub d: Array1<F>,
    /// Indices (i, j) with i < j of the distances in the original data array
    pub d_indices: Array2<usize>,
    /// Number of observations
    pub n_obs: usize,
}

impl<F: Float> DistanceMatrix<F> {
    /// Compute distances given points given as an array (n_obs, nx)
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> DistanceMatrix<F> {
        let (d, d_indices) = Self::_cross_dist(x);
        let n_obs = x.nrows();

        DistanceMatrix {
            d,
            d_indices,
            n_obs,
        }
    }

    fn _cross_dist(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array1<F>, Array2<usize>) {
        let n_obs = x.nrows();
        let n_cross_dist = n_obs * n_obs.saturating_sub(1) / 2;
        let mut indices = Array2::<usize>::zeros((n_cross_dist, 2));
        let mut d = Array1::zeros(n_cross_dist);
        let mut idx = 0;
        for k in 0..n_obs.saturating_sub(1) {
            let idx0 = idx;
            idx = idx0 + n_obs - k - 1;

            for i in (k + 1)..n_obs {
                let r = idx0 + i - k - 1;
                indices[[r, 0]] = k;
                indices[[r, 1]] = i;
            }

            let diff = &x.slice(s![k + 1..n_obs, ..]) - &x.slice(s![k, ..]);
            d.slice_mut(s![idx0..idx]).assign(&euclidean_norms(&diff));
        }

        (d, indices)
    }

    /// Returns the first pair of coincident locations if any
    pub fn first_coincident(&self) -> Option<(usize, usize)> {
        self.d
            .iter()
            .position(|v| *v == F::zero())
            .map(|r| (self.d_indices[[r, 0]], self.d_indices[[r, 1]]))
    }
}

/// Computes euclidean distances between `x` and each row of `y`
/// resulting in an array of shape (nrows(y),);
/// *Panics* if x and y have not the same number of components
pub fn distances_to<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix1>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array1<F> {
    assert!(x.len() == y.ncols());
    euclidean_norms(&(y - x))
}

/// Euclidean norm of each row of `diff`
fn euclidean_norms<F: Float>(diff: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
    let mut norms = Array1::zeros(diff.nrows());
    Zip::from(&mut norms)
        .and(diff.rows())
        .for_each(|n, row| *n = row.mapv(|v| v * v).sum().sqrt());
    norms
}

/// Euclidean distances between each row of `x` and each row of `y`
/// as a (nrows(x), nrows(y)) matrix
pub fn pairwise_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.ncols() == y.ncols());
    let mut dist = Array2::zeros((x.nrows(), y.nrows()));
    Zip::from(dist.rows_mut())
        .and(x.rows())
        .for_each(|mut row, xi| row.assign(&distances_to(&xi, y)));
    dist
}
