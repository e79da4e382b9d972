use crate::parameters::Hyperparameters;
use thiserror::Error;

/// A result type for Kriging fitting and prediction
pub type Result<T> = std::result::Result<T, KrigingError>;

/// An error raised by the [`Kriging`](crate::Kriging) evaluators or the hyperparameters optimizer
#[derive(Error, Debug)]
pub enum KrigingError {
    /// When the correlation matrix can not be factorized (coincident or
    /// numerically indistinguishable sample locations)
    #[error("Singular correlation matrix: {0}")]
    SingularCorrelation(String),
    /// When the process variance estimate is not a positive finite value
    #[error("Degenerate process variance: {0}")]
    DegenerateVariance(String),
    /// When the bounded minimizer stops before meeting its tolerance,
    /// the best candidate found so far is attached
    #[error("Hyperparameters optimization did not converge ({reason}), best {hyper} with likelihood {likelihood}")]
    OptimizerNonconvergence {
        /// Best hyperparameters found
        hyper: Hyperparameters<f64>,
        /// Negative log-likelihood at `hyper`
        likelihood: f64,
        /// Reason reported by the optimizer
        reason: String,
    },
    /// When hyperparameters (or their bounds) are outside of their domain
    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),
    /// When training samples or query points are not consistent
    #[error("Invalid sample set: {0}")]
    InvalidSampleSet(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
    /// When error during saving
    #[cfg(feature = "persistent")]
    #[error("Save error: {0}")]
    SaveError(#[from] serde_json::Error),
    /// When error during loading
    #[error("Load IO error")]
    LoadIoError(#[from] std::io::Error),
}
