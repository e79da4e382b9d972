//! Concentrated likelihood of the Kriging process.
//!
//! For a stationary gaussian process with constant unknown mean `mu` and
//! variance `sigma2`, both parameters are estimated in closed form given the
//! correlation matrix `R`:
//!
//! * `mu = (1' R^-1 y) / (1' R^-1 1)`
//! * `sigma2 = (y - mu 1)' R^-1 (y - mu 1) / n`
//!
//! leaving the negative log-likelihood `n/2 ln(sigma2) + 1/2 ln|R|` as a function
//! of the correlation hyperparameters only (the lower the better).
//!
//! `R` is never inverted explicitly: all products with `R^-1` go through
//! triangular solves with its Cholesky factor, which also gives `ln|R|` as
//! twice the sum of the log of the factor diagonal.

use crate::correlation_models::PowerExponentialCorr;
use crate::errors::{KrigingError, Result};
use crate::parameters::Hyperparameters;
use crate::utils::SampleSet;
use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array1, Array2, Axis};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Relative accuracy required from the triangular solves with the Cholesky factor:
/// correlation matrices whose conditioning, times `n * eps`, exceeds it are
/// rejected as singular
pub const KRG_SOLVE_TOL: f64 = 1e-8;

/// Internal quantities computed with the likelihood
/// and reused later on in prediction computations
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct LikelihoodInner<F: Float> {
    /// Negative log-likelihood
    pub likelihood: F,
    /// Generalized least-squares estimate of the process mean
    pub mu: F,
    /// Process variance estimate
    pub sigma2: F,
    /// Log-determinant of the correlation matrix
    pub ln_det: F,
    /// Lower Cholesky factor L of the correlation matrix R = L.L'
    pub r_chol: Array2<F>,
    /// L^-1 1 as a (n, 1) column
    pub ft: Array2<F>,
    /// 1' R^-1 1
    pub ft_sqr: F,
    /// Kriging weights R^-1 (y - mu 1)
    pub gamma: Array1<F>,
}

/// Terms of the concentrated likelihood at given hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodTerms<F: Float> {
    /// Negative log-likelihood `n/2 ln(sigma2) + 1/2 ln|R|`
    pub likelihood: F,
    /// Process mean estimate
    pub mu: F,
    /// Process variance estimate
    pub sigma2: F,
    /// Log-determinant of the correlation matrix
    pub ln_det: F,
}

/// Cholesky factor of the correlation matrix with the generalized least squares
/// estimate of the constant mean
pub(crate) struct GlsSolution<F: Float> {
    /// Lower Cholesky factor L of R
    pub r_chol: Array2<F>,
    /// L^-1 1
    pub ft: Array2<F>,
    /// 1' R^-1 1
    pub ft_sqr: F,
    /// Process mean estimate
    pub mu: F,
    /// L^-1 (y - mu 1)
    pub rho: Array2<F>,
    /// Smallest pivot of L
    pub pivot_min: F,
}

impl<F: Float> GlsSolution<F> {
    /// Kriging weights R^-1 (y - mu 1)
    pub fn weights(&self) -> Result<Array1<F>> {
        Ok(self
            .r_chol
            .t()
            .solve_triangular(&self.rho, UPLO::Upper)?
            .remove_axis(Axis(1)))
    }
}

/// Factorize the correlation matrix of the samples and estimate the process mean.
/// Fails with [`KrigingError::SingularCorrelation`] when the factorization fails
/// or the matrix is too ill-conditioned to be solved within [`KRG_SOLVE_TOL`].
pub(crate) fn gls_solution<F: Float>(
    samples: &SampleSet<F>,
    hyper: &Hyperparameters<F>,
) -> Result<GlsSolution<F>> {
    let n_obs = samples.n_obs();
    let n: F = F::cast(n_obs);

    // Set up R
    let r_mx = PowerExponentialCorr().matrix(samples.distances(), hyper);

    // R cholesky decomposition
    let r_chol = r_mx.cholesky().map_err(|err| {
        KrigingError::SingularCorrelation(format!(
            "cholesky factorization failed for {hyper}: {err}"
        ))
    })?;
    let pivot_min = *r_chol.diag().min().map_err(|_| {
        KrigingError::SingularCorrelation("undefined pivot in cholesky factor".to_string())
    })?;
    let pivot_max = *r_chol.diag().max().map_err(|_| {
        KrigingError::SingularCorrelation("undefined pivot in cholesky factor".to_string())
    })?;
    // (pivot_max / pivot_min)^2 underestimates the condition number of R
    let rcond = (pivot_min / pivot_max).powi(2);
    if !(rcond > n * F::epsilon() / F::cast(KRG_SOLVE_TOL)) {
        return Err(KrigingError::SingularCorrelation(format!(
            "correlation matrix is ill-conditioned for {hyper} (pivots ratio {})",
            pivot_min / pivot_max
        )));
    }

    // Solve generalized least squared problem for the constant mean
    let ft = r_chol.solve_triangular(&Array2::ones((n_obs, 1)), UPLO::Lower)?;
    let yt = r_chol.solve_triangular(&samples.y().to_owned().insert_axis(Axis(1)), UPLO::Lower)?;
    let ft_sqr = ft.column(0).dot(&ft.column(0));
    let mu = ft.column(0).dot(&yt.column(0)) / ft_sqr;
    let rho = yt - ft.mapv(|v| v * mu);

    Ok(GlsSolution {
        r_chol,
        ft,
        ft_sqr,
        mu,
        rho,
        pivot_min,
    })
}

/// Compute the concentrated likelihood and the quantities reused by prediction
/// samples: training data,
/// hyper: correlation hyperparameters
pub(crate) fn concentrated_likelihood<F: Float>(
    samples: &SampleSet<F>,
    hyper: &Hyperparameters<F>,
) -> Result<LikelihoodInner<F>> {
    let n: F = F::cast(samples.n_obs());
    let gls = gls_solution(samples, hyper)?;
    let sigma2 = gls.rho.mapv(|v| v * v).sum() / n;

    // Residuals vanish up to rounding errors amplified by the conditioning of L
    let y_scale = samples.y().fold(F::zero(), |acc, v| acc.max(v.abs()));
    let tol = F::cast(100.) * F::epsilon() * y_scale / gls.pivot_min;
    if !sigma2.is_finite() || sigma2 <= tol * tol {
        return Err(KrigingError::DegenerateVariance(format!(
            "process variance estimate {sigma2} is not positive for {hyper}"
        )));
    }

    // The determinant of R is equal to the squared product of
    // the diagonal elements of its Cholesky decomposition r_chol
    let ln_det = gls.r_chol.diag().mapv(|v| v.ln()).sum() * F::cast(2.);
    let likelihood = n / F::cast(2.) * sigma2.ln() + ln_det / F::cast(2.);
    if !likelihood.is_finite() {
        return Err(KrigingError::DegenerateVariance(format!(
            "likelihood {likelihood} is not finite for {hyper}"
        )));
    }

    let gamma = gls.weights()?;
    Ok(LikelihoodInner {
        likelihood,
        mu: gls.mu,
        sigma2,
        ln_det,
        r_chol: gls.r_chol,
        ft: gls.ft,
        ft_sqr: gls.ft_sqr,
        gamma,
    })
}

/// Negative log-likelihood of the training samples given the correlation
/// hyperparameters `(theta, p)`.
///
/// # Errors
///
/// * [`KrigingError::InvalidHyperparameter`] when `theta <= 0` or `p` outside of `[1, 2]`
/// * [`KrigingError::SingularCorrelation`] when the correlation matrix can not be factorized
/// * [`KrigingError::DegenerateVariance`] when the process variance estimate is not positive
pub fn neg_log_likelihood<F: Float>(samples: &SampleSet<F>, theta: F, p: F) -> Result<F> {
    let hyper = Hyperparameters::new(theta, p)?;
    concentrated_likelihood(samples, &hyper).map(|inner| inner.likelihood)
}

/// Negative log-likelihood together with the process mean and variance estimates
pub fn likelihood_terms<F: Float>(
    samples: &SampleSet<F>,
    theta: F,
    p: F,
) -> Result<LikelihoodTerms<F>> {
    let hyper = Hyperparameters::new(theta, p)?;
    let inner = concentrated_likelihood(samples, &hyper)?;
    Ok(LikelihoodTerms {
        likelihood: inner.likelihood,
        mu: inner.mu,
        sigma2: inner.sigma2,
        ln_det: inner.ln_det,
    })
}

/// Negative log-likelihood evaluated over a grid of hyperparameters
#[derive(Debug)]
pub struct LikelihoodSurface<F: Float> {
    /// Theta values of the grid
    pub thetas: Array1<F>,
    /// P values of the grid
    pub ps: Array1<F>,
    /// Likelihood values (ps.len(), thetas.len()), +inf where the evaluation failed
    pub values: Array2<F>,
    /// Evaluation failures with their (p index, theta index) in the grid
    pub failures: Vec<((usize, usize), KrigingError)>,
}

impl<F: Float> LikelihoodSurface<F> {
    /// Best grid point as `(hyperparameters, likelihood)`, `None` if no evaluation succeeded
    pub fn argmin(&self) -> Option<(Hyperparameters<F>, F)> {
        let (ip, it) = self.values.argmin().ok()?;
        let value = self.values[[ip, it]];
        if !value.is_finite() {
            return None;
        }
        Hyperparameters::new(self.thetas[it], self.ps[ip])
            .ok()
            .map(|hyper| (hyper, value))
    }
}

/// Evaluate the negative log-likelihood over the grid `ps x thetas`.
///
/// All hyperparameters of the grid are validated first. A grid point where the
/// likelihood can not be computed is set to `+inf` and its error is kept in
/// [`LikelihoodSurface::failures`]. Grid points are evaluated in parallel.
pub fn likelihood_surface<F: Float>(
    samples: &SampleSet<F>,
    thetas: &Array1<F>,
    ps: &Array1<F>,
) -> Result<LikelihoodSurface<F>> {
    for theta in thetas.iter() {
        for p in ps.iter() {
            Hyperparameters::new(*theta, *p)?;
        }
    }
    let (n_p, n_theta) = (ps.len(), thetas.len());
    let evals: Vec<Result<F>> = (0..n_p * n_theta)
        .into_par_iter()
        .map(|k| neg_log_likelihood(samples, thetas[k % n_theta], ps[k / n_theta]))
        .collect();

    let mut values = Array2::from_elem((n_p, n_theta), F::infinity());
    let mut failures = vec![];
    for (k, eval) in evals.into_iter().enumerate() {
        let (ip, it) = (k / n_theta, k % n_theta);
        match eval {
            Ok(v) => values[[ip, it]] = v,
            Err(err) => failures.push(((ip, it), err)),
        }
    }
    if !failures.is_empty() {
        log::debug!(
            "Likelihood surface: {} failed evaluations over {} grid points",
            failures.len(),
            n_p * n_theta
        );
    }
    Ok(LikelihoodSurface {
        thetas: thetas.to_owned(),
        ps: ps.to_owned(),
        values,
        failures,
    })
}
