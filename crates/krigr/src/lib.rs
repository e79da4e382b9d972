//! This library implements [Kriging](https://en.wikipedia.org/wiki/Kriging) surrogate models
//! with a constant unknown mean (ordinary Kriging) and a power exponential spatial correlation
//! `exp(-theta * |x - x'|^p)`.
//!
//! Given a small set of sampled input/output pairs ([SampleSet]), the correlation
//! hyperparameters `(theta, p)` are fitted by maximizing the concentrated likelihood
//! of the samples, then the best linear unbiased predictor interpolates the samples
//! at arbitrary query points.
//!
//! Fitted models are implemented by [Kriging] parameterized by [KrigingParams].
//! Stateless evaluators are available as well to explore the hyperparameters:
//! [neg_log_likelihood], [likelihood_surface], [predict] and the
//! [correlation_models] functions.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod correlation_models;
mod errors;
mod likelihood;

mod parameters;
mod utils;

mod optimization;

pub use algorithm::*;
pub use errors::*;
pub use likelihood::{
    likelihood_surface, likelihood_terms, neg_log_likelihood, LikelihoodSurface, LikelihoodTerms,
    KRG_SOLVE_TOL,
};
pub use optimization::{Algorithm, OptimStatus};
pub use parameters::*;
pub use utils::{DistanceMatrix, SampleSet};
