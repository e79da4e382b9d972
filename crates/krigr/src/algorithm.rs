use crate::correlation_models::{correlation_vector, PowerExponentialCorr};
use crate::errors::{KrigingError, Result};
use crate::likelihood::{concentrated_likelihood, gls_solution, LikelihoodInner};
use crate::optimization::{minimize_multistart, prepare_multistart, OptimParams, OptimStatus};
use crate::parameters::{
    into_f64, HyperBounds, HyperTuning, Hyperparameters, KrigingParams, KrigingValidParams,
};
use crate::utils::{pairwise_distances, SampleSet};

use linfa::prelude::{DatasetBase, Fit, Float, ParamGuard, PredictInplace};
use linfa_linalg::triangular::*;
use ndarray::{arr1, Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

use log::{debug, info, warn};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "persistent")]
use std::fs;
#[cfg(feature = "persistent")]
use std::io::Write;

/// Outcome of the hyperparameters optimization
#[derive(Clone, Debug, PartialEq)]
pub struct HyperOptResult<F: Float> {
    /// Best hyperparameters found
    pub hyper: Hyperparameters<F>,
    /// Negative log-likelihood at `hyper`
    pub likelihood: F,
    /// Whether the minimizer met its tolerance
    pub status: OptimStatus,
    /// Number of likelihood evaluations
    pub n_eval: usize,
}

impl<F: Float> HyperOptResult<F> {
    /// Turn a non converged optimization into a [`KrigingError::OptimizerNonconvergence`] error
    /// carrying the best candidate.
    pub fn converged(self) -> Result<Self> {
        match &self.status {
            OptimStatus::Converged => Ok(self),
            OptimStatus::NotConverged(reason) => Err(KrigingError::OptimizerNonconvergence {
                hyper: self.hyper.to_f64(),
                likelihood: into_f64(self.likelihood),
                reason: reason.clone(),
            }),
        }
    }
}

/// Search hyperparameters minimizing the negative log-likelihood of the samples
/// within given bounds, starting from `init`.
///
/// Theta is searched on a log10 scale. Hyperparameters where the likelihood can
/// not be computed (singular correlation, degenerate variance) are rejected and
/// the search goes on. The result is never worse than the initial guess.
///
/// Non convergence is not an error: it is reported in [`HyperOptResult::status`],
/// use [`HyperOptResult::converged`] to reject it. When no hyperparameters of the
/// search space give a finite likelihood, [`KrigingError::OptimizerNonconvergence`]
/// is returned.
pub fn optimize_hyperparameters<F: Float>(
    samples: &SampleSet<F>,
    init: &Hyperparameters<F>,
    bounds: &HyperBounds<F>,
    options: &KrigingValidParams<F>,
) -> Result<HyperOptResult<F>> {
    if !bounds.contains(init) {
        return Err(KrigingError::InvalidHyperparameter(format!(
            "initial guess {init} outside of bounds theta in [{}, {}], p in [{}, {}]",
            bounds.theta().0,
            bounds.theta().1,
            bounds.p().0,
            bounds.p().1
        )));
    }
    let base: f64 = 10.;
    let objfn = |x: &[f64]| -> f64 {
        let theta = F::cast(base.powf(x[0]));
        let p = F::cast(x[1]);
        match Hyperparameters::new(theta, p).and_then(|h| concentrated_likelihood(samples, &h)) {
            Ok(inner) => into_f64(inner.likelihood),
            Err(_) => f64::INFINITY,
        }
    };

    // Use log10 theta as optimization parameter
    let (theta_lo, theta_up) = bounds.theta();
    let (p_lo, p_up) = bounds.p();
    let xbounds = [
        (into_f64(theta_lo).log10(), into_f64(theta_up).log10()),
        (into_f64(p_lo), into_f64(p_up)),
    ];
    let x0 = arr1(&[into_f64(init.theta()).log10(), into_f64(init.p())]);
    let x0s = prepare_multistart(options.n_start(), &x0, &xbounds, options.seed());
    debug!("Optimize with starts (log10 theta, p) = {x0s} and bounds = {xbounds:?}");

    let params = OptimParams {
        max_eval: options.max_eval(),
        ftol_rel: options.ftol_rel(),
        ftol_abs: options.ftol_abs(),
        ..OptimParams::default()
    };
    let now = Instant::now();
    let best = minimize_multistart(&options.algorithm(), &objfn, &x0s, &xbounds, &params);
    debug!("elapsed optim = {:?}", now.elapsed().as_millis());

    let best = best.ok_or_else(|| KrigingError::OptimizerNonconvergence {
        hyper: init.to_f64(),
        likelihood: f64::INFINITY,
        reason: "no hyperparameters with finite likelihood found".to_string(),
    })?;
    let hyper = Hyperparameters::new(F::cast(base.powf(best.x[0])), F::cast(best.x[1]))?;
    if let OptimStatus::NotConverged(reason) = &best.status {
        warn!(
            "Hyperparameters optimization not converged ({reason}), best {hyper} with likelihood {}",
            best.fmin
        );
    }
    Ok(HyperOptResult {
        hyper,
        likelihood: F::cast(best.fmin),
        status: best.status,
        n_eval: best.n_eval,
    })
}

/// Kriging prediction `mu + psi' R^-1 (y - mu 1)` at a single query point (nx,)
/// given the correlation hyperparameters `(theta, p)`.
///
/// The correlation matrix is factorized on each call, use a fitted [`Kriging`]
/// model to predict at many points.
pub fn predict<F: Float>(
    query: &ArrayBase<impl Data<Elem = F>, Ix1>,
    samples: &SampleSet<F>,
    theta: F,
    p: F,
) -> Result<F> {
    let hyper = Hyperparameters::new(theta, p)?;
    samples.check_query(&query.view().insert_axis(Axis(0)))?;
    let gls = gls_solution(samples, &hyper)?;
    let psi = correlation_vector(query, samples.x(), &hyper);
    Ok(gls.mu + psi.dot(&gls.weights()?))
}

/// A fitted Kriging model: constant mean `mu`, variance `sigma2` and power
/// exponential correlation of hyperparameters `(theta, p)`.
///
/// The factorization of the correlation matrix is computed once at fit time
/// and reused by every prediction.
///
/// # Example
///
/// ```no_run
/// use krigr::{Kriging, SampleSet};
/// use ndarray::Array;
///
/// fn f(x: f64) -> f64 {
///     x.sin() + 0.95 + 0.075 * x * x - 0.001 * x.powi(4)
/// }
///
/// let xt = vec![1., 3., 5., 7., 9., 11.];
/// let yt = xt.iter().map(|x| f(*x)).collect();
/// let samples = SampleSet::from_vecs(xt, yt).expect("valid samples");
///
/// let kriging = Kriging::params()
///     .fit_samples(&samples)
///     .expect("Kriging fitted");
/// println!("{kriging}");
///
/// let xtest = Array::linspace(0., 12., 50).insert_axis(ndarray::Axis(1));
/// let (y, var) = kriging.predict_valvar(&xtest).expect("Kriging prediction");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct Kriging<F: Float> {
    /// Correlation hyperparameters
    hyper: Hyperparameters<F>,
    /// Negative log-likelihood at `hyper`
    likelihood: F,
    /// Status of the hyperparameters optimization
    status: OptimStatus,
    /// Number of likelihood evaluations spent in fitting
    n_eval: usize,
    /// Quantities reused by predictions
    inner: LikelihoodInner<F>,
    /// Training samples
    samples: SampleSet<F>,
    /// Parameters used to fit this model
    params: KrigingValidParams<F>,
}

impl<F: Float> fmt::Display for Kriging<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Kriging(corr={}, theta={}, p={}, mu={}, sigma2={}, likelihood={})",
            PowerExponentialCorr(),
            self.hyper.theta(),
            self.hyper.p(),
            self.inner.mu,
            self.inner.sigma2,
            self.likelihood,
        )
    }
}

impl<F: Float> Kriging<F> {
    /// Kriging parameters constructor
    pub fn params() -> KrigingParams<F> {
        KrigingParams::new()
    }

    /// Predict output values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.samples.check_query(x)?;
        let corr = self._compute_correlation(x);
        Ok(corr.dot(&self.inner.gamma) + self.inner.mu)
    }

    /// Predict variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as (n,) column vector.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.samples.check_query(x)?;
        let corr = self._compute_correlation(x);
        self._compute_mse(&corr)
    }

    /// Predict both output values and variance at n given `x` points of nx components
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        self.samples.check_query(x)?;
        let corr = self._compute_correlation(x);
        let y = corr.dot(&self.inner.gamma) + self.inner.mu;
        Ok((y, self._compute_mse(&corr)?))
    }

    /// Ordinary Kriging mean squared error given correlations (n, n_obs) with training points
    fn _compute_mse(&self, corr: &Array2<F>) -> Result<Array1<F>> {
        let inners = &self.inner;
        // rt = L^-1 psi for each query point (n_obs, n)
        let rt = inners
            .r_chol
            .solve_triangular(&corr.t().to_owned(), UPLO::Lower)?;
        // u = 1 - 1' R^-1 psi
        let u = inners.ft.t().dot(&rt).remove_axis(Axis(0)).mapv(|v| F::one() - v);

        let mut mse = Array::ones(rt.ncols()) - rt.mapv(|v| v * v).sum_axis(Axis(0))
            + u.mapv(|v| v * v / inners.ft_sqr);
        mse.mapv_inplace(|v| inners.sigma2 * v);

        // Mean Squared Error might be slightly negative depending on
        // machine precision: set to zero in that case
        Ok(mse.mapv(|v| if v < F::zero() { F::zero() } else { v }))
    }

    /// Compute correlations between x points (n, nx) and training points as a (n, n_obs) matrix
    fn _compute_correlation(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let corr = PowerExponentialCorr();
        pairwise_distances(x, self.samples.x()).mapv(|d| corr.value(d, &self.hyper))
    }

    /// Fitted correlation hyperparameters
    pub fn hyperparameters(&self) -> &Hyperparameters<F> {
        &self.hyper
    }

    /// Process mean estimate
    pub fn mu(&self) -> F {
        self.inner.mu
    }

    /// Process variance estimate
    pub fn variance(&self) -> F {
        self.inner.sigma2
    }

    /// Negative log-likelihood at fitted hyperparameters
    pub fn likelihood(&self) -> F {
        self.likelihood
    }

    /// Status of the hyperparameters optimization, converged when hyperparameters are fixed
    pub fn status(&self) -> &OptimStatus {
        &self.status
    }

    /// Number of likelihood evaluations spent in fitting
    pub fn n_eval(&self) -> usize {
        self.n_eval
    }

    /// Training samples
    pub fn samples(&self) -> &SampleSet<F> {
        &self.samples
    }

    /// Parameters used to fit this model
    pub fn params_used(&self) -> &KrigingValidParams<F> {
        &self.params
    }

    /// Retrieve input dimension
    pub fn dim(&self) -> usize {
        self.samples.dim()
    }
}

#[cfg(feature = "persistent")]
impl<F: Float + Serialize + for<'de> Deserialize<'de>> Kriging<F> {
    /// Save Kriging model in given file as JSON.
    pub fn save(&self, path: &str) -> Result<()> {
        let mut file = fs::File::create(path)?;
        let bytes = serde_json::to_vec(self)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Load Kriging model from given JSON file.
    pub fn load(path: &str) -> Result<Kriging<F>> {
        let data = fs::read(path)?;
        let kriging = serde_json::from_slice(&data)?;
        Ok(kriging)
    }
}

impl<F: Float> KrigingValidParams<F> {
    /// Fit a Kriging model on the given samples: hyperparameters are optimized
    /// by maximum likelihood unless they are fixed.
    pub fn fit_samples(&self, samples: &SampleSet<F>) -> Result<Kriging<F>> {
        let (hyper, status, n_eval) = match self.tuning() {
            HyperTuning::Fixed(hyper) => (*hyper, OptimStatus::Converged, 0),
            HyperTuning::Optimized { init, bounds } => {
                let res = optimize_hyperparameters(samples, init, bounds, self)?;
                (res.hyper, res.status, res.n_eval)
            }
        };
        let inner = concentrated_likelihood(samples, &hyper)?;
        info!(
            "Kriging fitted on {} samples: {hyper}, likelihood={} ({n_eval} evaluations)",
            samples.n_obs(),
            inner.likelihood
        );
        Ok(Kriging {
            hyper,
            likelihood: inner.likelihood,
            status,
            n_eval,
            inner,
            samples: samples.clone(),
            params: self.clone(),
        })
    }
}

impl<F: Float> KrigingParams<F> {
    /// Check parameters then fit a Kriging model on the given samples
    pub fn fit_samples(&self, samples: &SampleSet<F>) -> Result<Kriging<F>> {
        self.check_ref()?.fit_samples(samples)
    }
}

impl<F: Float, D: Data<Elem = F>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, KrigingError>
    for KrigingValidParams<F>
{
    type Object = Kriging<F>;

    /// Fit Kriging hyperparameters using maximum likelihood
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let samples = SampleSet::new(dataset.records().to_owned(), dataset.targets().to_owned())?;
        self.fit_samples(&samples)
    }
}

impl<F, D> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for Kriging<F>
where
    F: Float,
    D: Data<Elem = F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.predict(x).expect("Kriging prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::likelihood::neg_log_likelihood;
    use crate::optimization::Algorithm;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::{Dataset, Predict};
    use ndarray::array;
    use ndarray_npy::write_npy;
    use paste::paste;

    fn f(x: f64) -> f64 {
        x.sin() + 0.95 + 0.075 * x * x - 0.001 * x.powi(4)
    }

    fn sample_set() -> SampleSet<f64> {
        let xt = vec![1., 3., 5., 7., 9., 11.];
        let yt = xt.iter().map(|x| f(*x)).collect();
        SampleSet::from_vecs(xt, yt).unwrap()
    }

    macro_rules! test_interpolation {
        ($name:ident, $theta:expr, $p:expr) => {
            paste! {
                #[test]
                fn [<test_interpolation_ $name>]() {
                    let samples = sample_set();
                    for (x, y) in samples.x().rows().into_iter().zip(samples.y()) {
                        let pred = predict(&x, &samples, $theta, $p).unwrap();
                        assert_abs_diff_eq!(*y, pred, epsilon = 1e-6);
                    }

                    let hyper = Hyperparameters::new($theta, $p).unwrap();
                    let kriging = Kriging::params().fixed(hyper).fit_samples(&samples).unwrap();
                    let preds = kriging.predict(samples.x()).unwrap();
                    assert_abs_diff_eq!(samples.y(), &preds, epsilon = 1e-6);
                }
            }
        };
    }

    test_interpolation!(gaussian, 0.5, 2.);
    test_interpolation!(exponential, 0.5, 1.);
    test_interpolation!(smooth_wide, 0.05, 2.);
    test_interpolation!(intermediate, 2., 1.5);

    #[test]
    fn test_interpolation_or_singular() {
        let samples = sample_set();
        for theta in Array::logspace(10., -4., 3., 15).iter() {
            for p in [1., 1.5, 2.] {
                for (x, y) in samples.x().rows().into_iter().zip(samples.y()) {
                    match predict(&x, &samples, *theta, p) {
                        Ok(pred) => assert_abs_diff_eq!(*y, pred, epsilon = 1e-6),
                        Err(KrigingError::SingularCorrelation(_)) => (),
                        Err(err) => panic!("prediction at ({theta}, {p}) failed: {err}"),
                    }
                }

                let hyper = Hyperparameters::new(*theta, p).unwrap();
                match Kriging::params().fixed(hyper).fit_samples(&samples) {
                    Ok(kriging) => {
                        let preds = kriging.predict(samples.x()).unwrap();
                        assert_abs_diff_eq!(samples.y(), &preds, epsilon = 1e-6);
                    }
                    Err(KrigingError::SingularCorrelation(_)) => (),
                    Err(err) => panic!("fit at ({theta}, {p}) failed: {err}"),
                }
            }
        }
        assert!(matches!(
            predict(&array![5.], &samples, 1e-4, 2.),
            Err(KrigingError::SingularCorrelation(_))
        ));
    }

    #[test]
    fn test_predict_singular() {
        let samples = SampleSet::from_vecs(vec![1., 1. + 1e-9, 2.], vec![1., 2., 3.]).unwrap();
        assert!(matches!(
            predict(&array![1.5], &samples, 1., 2.),
            Err(KrigingError::SingularCorrelation(_))
        ));
        let hyper = Hyperparameters::new(1., 2.).unwrap();
        assert!(matches!(
            Kriging::params().fixed(hyper).fit_samples(&samples),
            Err(KrigingError::SingularCorrelation(_))
        ));
    }

    #[test]
    fn test_interpolation_2d() {
        let xt: Array2<f64> = array![[0., 0.], [1., 0.], [0., 1.], [1., 1.], [0.5, 0.3]];
        let yt = xt.map_axis(Axis(1), |x| x[0] * x[0] + (3f64 * x[1]).sin());
        let samples = SampleSet::new(xt.clone(), yt.clone()).unwrap();
        let kriging = Kriging::params()
            .fixed(Hyperparameters::new(1., 2.).unwrap())
            .fit_samples(&samples)
            .unwrap();
        assert_abs_diff_eq!(yt, kriging.predict(&xt).unwrap(), epsilon = 1e-6);
        assert_eq!(2, kriging.dim());
    }

    #[test]
    fn test_sampled_scenario() {
        let samples = sample_set();
        let nll_init = neg_log_likelihood(&samples, 1., 2.).unwrap();
        let bounds = HyperBounds::default();
        let params = KrigingParams::new().check().unwrap();
        let res = optimize_hyperparameters(&samples, &Hyperparameters::default(), &bounds, &params)
            .unwrap();
        let theta = res.hyper.theta();
        assert!(theta > 1e-4 && theta < 1e3, "theta={theta} pinned to a bound");
        assert!(res.likelihood <= nll_init);
        assert!(res.n_eval > 0);
        assert_abs_diff_eq!(
            res.likelihood,
            neg_log_likelihood(&samples, theta, res.hyper.p()).unwrap(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_cobyla_scenario() {
        let samples = sample_set();
        let nll_init = neg_log_likelihood(&samples, 1., 2.).unwrap();
        let kriging = Kriging::params()
            .algorithm(Algorithm::Cobyla)
            .fit_samples(&samples)
            .unwrap();
        let theta = kriging.hyperparameters().theta();
        assert!(theta > 1e-4 && theta < 1e3);
        assert!(kriging.likelihood() <= nll_init);
    }

    #[test]
    fn test_multistart_not_worse() {
        let samples = sample_set();
        let single = Kriging::params().fit_samples(&samples).unwrap();
        let multi = Kriging::params().n_start(5).fit_samples(&samples).unwrap();
        assert!(multi.likelihood() <= single.likelihood());
        assert!(multi.n_eval() > single.n_eval());
    }

    #[test]
    fn test_non_convergence() {
        let samples = sample_set();
        let params = KrigingParams::new()
            .algorithm(Algorithm::Cobyla)
            .max_eval(1)
            .check()
            .unwrap();
        let res = optimize_hyperparameters(
            &samples,
            &Hyperparameters::default(),
            &HyperBounds::default(),
            &params,
        )
        .unwrap();
        assert!(!res.status.is_converged());
        assert!(res.likelihood <= neg_log_likelihood(&samples, 1., 2.).unwrap());
        match res.converged() {
            Err(KrigingError::OptimizerNonconvergence { likelihood, .. }) => {
                assert!(likelihood.is_finite())
            }
            other => panic!("expected non convergence error, got {other:?}"),
        }
    }

    #[test]
    fn test_init_outside_bounds() {
        let samples = sample_set();
        let bounds = HyperBounds::new((1e-2, 1e-1), (1., 2.)).unwrap();
        let res = optimize_hyperparameters(
            &samples,
            &Hyperparameters::default(),
            &bounds,
            &KrigingValidParams::default(),
        );
        assert!(matches!(res, Err(KrigingError::InvalidHyperparameter(_))));
    }

    #[test]
    fn test_boundary_rejection() {
        let samples = sample_set();
        for (theta, p) in [(0., 2.), (0.5, 0.5)] {
            assert!(matches!(
                predict(&array![2.], &samples, theta, p),
                Err(KrigingError::InvalidHyperparameter(_))
            ));
        }
    }

    #[test]
    fn test_invalid_query() {
        let samples = sample_set();
        assert!(matches!(
            predict(&array![2., 3.], &samples, 0.5, 2.),
            Err(KrigingError::InvalidSampleSet(_))
        ));
        let kriging = Kriging::params()
            .fixed(Hyperparameters::new(0.5, 2.).unwrap())
            .fit_samples(&samples)
            .unwrap();
        assert!(kriging.predict(&array![[1., 2.]]).is_err());
        assert!(kriging.predict_var(&array![[f64::NAN]]).is_err());
    }

    #[test]
    fn test_constant_values() {
        let samples = SampleSet::from_vecs(vec![1., 2., 4., 5.], vec![3.1; 4]).unwrap();
        // the predictor does not need the process variance
        assert_abs_diff_eq!(3.1, predict(&array![3.], &samples, 0.5, 2.).unwrap(), epsilon = 1e-10);
        let res = Kriging::params()
            .fixed(Hyperparameters::new(0.5, 2.).unwrap())
            .fit_samples(&samples);
        assert!(matches!(res, Err(KrigingError::DegenerateVariance(_))));
    }

    #[test]
    fn test_fixed_hyperparameters() {
        let samples = sample_set();
        let hyper = Hyperparameters::new(0.5, 2.).unwrap();
        let kriging = Kriging::params().fixed(hyper).fit_samples(&samples).unwrap();
        assert_eq!(&hyper, kriging.hyperparameters());
        assert_eq!(&OptimStatus::Converged, kriging.status());
        assert_eq!(0, kriging.n_eval());
        assert_abs_diff_eq!(6.115_115_031_655_395, kriging.likelihood(), epsilon = 1e-6);
        assert_abs_diff_eq!(0.380_510_677_770_544_9, kriging.mu(), epsilon = 1e-6);
        assert_abs_diff_eq!(7.799_058_376_783_184, kriging.variance(), epsilon = 1e-6);
        let query = array![4.2];
        assert_abs_diff_eq!(
            predict(&query, &samples, 0.5, 2.).unwrap(),
            kriging.predict(&query.view().insert_axis(Axis(0))).unwrap()[0],
            epsilon = 1e-12
        );
        assert!(kriging.to_string().starts_with("Kriging(corr=PowerExponential, theta=0.5, p=2,"));
    }

    #[test]
    fn test_variance() {
        let samples = sample_set();
        let kriging = Kriging::params().fit_samples(&samples).unwrap();
        let vars = kriging.predict_var(samples.x()).unwrap();
        assert_abs_diff_eq!(Array1::<f64>::zeros(6), vars, epsilon = 1e-6);

        let xmid = array![[2.], [4.], [6.], [8.], [10.]];
        let (vals, vars) = kriging.predict_valvar(&xmid).unwrap();
        assert!(vars.iter().all(|v| *v > 0.));
        assert_abs_diff_eq!(vals, kriging.predict(&xmid).unwrap(), epsilon = 1e-12);
        assert_abs_diff_eq!(vars, kriging.predict_var(&xmid).unwrap(), epsilon = 1e-12);
        // variance is bounded by the process variance within the samples range
        assert!(vars.iter().all(|v| *v < kriging.variance()));
    }

    #[test]
    fn test_linfa_traits() {
        let xt = array![[1.], [3.], [5.], [7.], [9.], [11.]];
        let yt = xt.column(0).mapv(f);
        let kriging = KrigingParams::new()
            .fixed(Hyperparameters::new(0.5, 2.).unwrap())
            .fit(&Dataset::new(xt.clone(), yt.clone()))
            .expect("Kriging fitted");
        let ypred: Array1<f64> = Predict::predict(&kriging, &xt);
        assert_abs_diff_eq!(yt, ypred, epsilon = 1e-6);
    }

    #[test]
    fn test_kriging_plot_data() {
        let samples = sample_set();
        let kriging = Kriging::params().fit_samples(&samples).unwrap();
        let xplot = Array::linspace(0., 12., 121).insert_axis(Axis(1));
        let (vals, vars) = kriging.predict_valvar(&xplot).unwrap();
        assert!(vals.iter().all(|v| v.is_finite()));
        assert!(vars.iter().all(|v| *v >= 0.));

        let test_dir = "target/tests";
        std::fs::create_dir_all(test_dir).ok();
        write_npy(format!("{test_dir}/krg_x.npy"), &xplot).expect("x saved");
        write_npy(format!("{test_dir}/krg_vals.npy"), &vals).expect("vals saved");
        write_npy(format!("{test_dir}/krg_vars.npy"), &vars).expect("vars saved");
    }

    #[cfg(feature = "persistent")]
    #[test]
    fn test_save_load() {
        let samples = sample_set();
        let kriging = Kriging::params().fit_samples(&samples).unwrap();
        let test_dir = "target/tests";
        std::fs::create_dir_all(test_dir).ok();
        let path = format!("{test_dir}/kriging.json");
        kriging.save(&path).expect("Kriging saved");
        let loaded = Kriging::<f64>::load(&path).expect("Kriging loaded");
        let xtest = array![[2.5], [6.1]];
        assert_abs_diff_eq!(
            kriging.predict(&xtest).unwrap(),
            loaded.predict(&xtest).unwrap(),
            epsilon = 1e-12
        );
        assert_eq!(kriging.hyperparameters(), loaded.hyperparameters());
    }
}
