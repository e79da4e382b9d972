use crate::errors::{KrigingError, Result};
use crate::optimization::Algorithm;
use linfa::{Float, ParamGuard};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of multistart for hyperparameters optimization (single local search)
pub const KRG_OPTIM_N_START: usize = 0;
/// Minimum of likelihood evaluations for the internal optimizer
pub const KRG_OPTIM_MIN_EVAL: usize = 25;
/// Default maximum of likelihood evaluations for the internal optimizer
pub const KRG_OPTIM_MAX_EVAL: usize = 200;
/// Default relative tolerance on the likelihood value for the internal optimizer
pub const KRG_OPTIM_FTOL_REL: f64 = 1e-10;
/// Default seed used to draw multistart points
pub const KRG_OPTIM_SEED: u64 = 42;

/// Hyperparameters `(theta, p)` of the power exponential correlation
/// `exp(-theta * d^p)`: `theta > 0` is the activity (decay) factor and
/// `p` in `[1, 2]` the smoothness exponent.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(try_from = "RawHyperparameters<F>")
)]
pub struct Hyperparameters<F: Float> {
    theta: F,
    p: F,
}

/// Unchecked hyperparameters as stored, validated on deserialization
#[cfg(feature = "serializable")]
#[derive(Deserialize)]
struct RawHyperparameters<F> {
    theta: F,
    p: F,
}

#[cfg(feature = "serializable")]
impl<F: Float> TryFrom<RawHyperparameters<F>> for Hyperparameters<F> {
    type Error = KrigingError;

    fn try_from(raw: RawHyperparameters<F>) -> Result<Self> {
        Hyperparameters::new(raw.theta, raw.p)
    }
}

impl<F: Float> Hyperparameters<F> {
    /// Lower bound of the smoothness exponent domain
    pub const P_MIN: f64 = 1.;
    /// Upper bound of the smoothness exponent domain
    pub const P_MAX: f64 = 2.;

    /// Constructor, fails with [`KrigingError::InvalidHyperparameter`]
    /// when `theta <= 0`, `theta` is not finite or `p` is outside of `[1, 2]`
    pub fn new(theta: F, p: F) -> Result<Self> {
        check_theta(theta)?;
        check_p(p)?;
        Ok(Hyperparameters { theta, p })
    }

    /// Activity factor
    pub fn theta(&self) -> F {
        self.theta
    }

    /// Smoothness exponent
    pub fn p(&self) -> F {
        self.p
    }

    pub(crate) fn to_f64(self) -> Hyperparameters<f64> {
        Hyperparameters {
            theta: into_f64(self.theta),
            p: into_f64(self.p),
        }
    }
}

impl<F: Float> Default for Hyperparameters<F> {
    fn default() -> Self {
        Hyperparameters {
            theta: F::one(),
            p: F::cast(2.),
        }
    }
}

impl<F: Float> fmt::Display for Hyperparameters<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(theta={}, p={})", self.theta, self.p)
    }
}

fn check_theta<F: Float>(theta: F) -> Result<()> {
    if !theta.is_finite() || theta <= F::zero() {
        return Err(KrigingError::InvalidHyperparameter(format!(
            "theta should be a positive finite value, got {theta}"
        )));
    }
    Ok(())
}

fn check_p<F: Float>(p: F) -> Result<()> {
    let p_min = F::cast(Hyperparameters::<F>::P_MIN);
    let p_max = F::cast(Hyperparameters::<F>::P_MAX);
    // NaN fails both comparisons
    if !(p >= p_min && p <= p_max) {
        return Err(KrigingError::InvalidHyperparameter(format!(
            "p should be in [{p_min}, {p_max}], got {p}"
        )));
    }
    Ok(())
}

/// Box bounds of the hyperparameters search space
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(try_from = "RawHyperBounds<F>")
)]
pub struct HyperBounds<F: Float> {
    theta: (F, F),
    p: (F, F),
}

#[cfg(feature = "serializable")]
#[derive(Deserialize)]
struct RawHyperBounds<F> {
    theta: (F, F),
    p: (F, F),
}

#[cfg(feature = "serializable")]
impl<F: Float> TryFrom<RawHyperBounds<F>> for HyperBounds<F> {
    type Error = KrigingError;

    fn try_from(raw: RawHyperBounds<F>) -> Result<Self> {
        HyperBounds::new(raw.theta, raw.p)
    }
}

impl<F: Float> HyperBounds<F> {
    /// Default bounds for theta values
    pub const DEFAULT_THETA_BOUNDS: (f64, f64) = (1e-4, 1e3);
    /// Default bounds for p values
    pub const DEFAULT_P_BOUNDS: (f64, f64) = (1., 2.);

    /// Constructor given (lower, upper) bounds for theta and p.
    /// Theta bounds have to be positive, p bounds have to lie within `[1, 2]`.
    pub fn new(theta: (F, F), p: (F, F)) -> Result<Self> {
        check_theta(theta.0)?;
        check_theta(theta.1)?;
        check_p(p.0)?;
        check_p(p.1)?;
        if theta.0 > theta.1 || p.0 > p.1 {
            return Err(KrigingError::InvalidHyperparameter(format!(
                "lower bounds should not exceed upper bounds, got theta in [{}, {}], p in [{}, {}]",
                theta.0, theta.1, p.0, p.1
            )));
        }
        Ok(HyperBounds { theta, p })
    }

    /// Theta (lower, upper) bounds
    pub fn theta(&self) -> (F, F) {
        self.theta
    }

    /// P (lower, upper) bounds
    pub fn p(&self) -> (F, F) {
        self.p
    }

    /// Whether given hyperparameters lie within the bounds
    pub fn contains(&self, hyper: &Hyperparameters<F>) -> bool {
        hyper.theta >= self.theta.0
            && hyper.theta <= self.theta.1
            && hyper.p >= self.p.0
            && hyper.p <= self.p.1
    }
}

impl<F: Float> Default for HyperBounds<F> {
    fn default() -> Self {
        HyperBounds {
            theta: (
                F::cast(Self::DEFAULT_THETA_BOUNDS.0),
                F::cast(Self::DEFAULT_THETA_BOUNDS.1),
            ),
            p: (
                F::cast(Self::DEFAULT_P_BOUNDS.0),
                F::cast(Self::DEFAULT_P_BOUNDS.1),
            ),
        }
    }
}

/// An enum to represent the hyperparameters tuning
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum HyperTuning<F: Float> {
    /// Hyperparameters are given, not estimated (exploration mode)
    Fixed(Hyperparameters<F>),
    /// Hyperparameters are optimized between given bounds starting from the initial guess
    Optimized {
        /// Initial guess
        init: Hyperparameters<F>,
        /// Search space
        bounds: HyperBounds<F>,
    },
}

impl<F: Float> Default for HyperTuning<F> {
    fn default() -> Self {
        HyperTuning::Optimized {
            init: Hyperparameters::default(),
            bounds: HyperBounds::default(),
        }
    }
}

impl<F: Float> HyperTuning<F> {
    /// Get initial (or fixed) hyperparameters
    pub fn init(&self) -> &Hyperparameters<F> {
        match self {
            HyperTuning::Fixed(init) => init,
            HyperTuning::Optimized { init, bounds: _ } => init,
        }
    }

    /// Get bounds when hyperparameters are optimized
    pub fn bounds(&self) -> Option<&HyperBounds<F>> {
        match self {
            HyperTuning::Fixed(_) => None,
            HyperTuning::Optimized { init: _, bounds } => Some(bounds),
        }
    }
}

/// A set of validated Kriging parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub struct KrigingValidParams<F: Float> {
    /// Hyperparameters tuning of the correlation model
    pub(crate) tuning: HyperTuning<F>,
    /// Bounded minimizer used for the likelihood optimization
    pub(crate) algorithm: Algorithm,
    /// Number of additional optimization starting points
    pub(crate) n_start: usize,
    /// Max number of likelihood evaluations during one optimization
    pub(crate) max_eval: usize,
    /// Relative tolerance on the likelihood value
    pub(crate) ftol_rel: f64,
    /// Absolute tolerance on the likelihood value
    pub(crate) ftol_abs: f64,
    /// Seed used to draw multistart points
    pub(crate) seed: u64,
}

impl<F: Float> Default for KrigingValidParams<F> {
    fn default() -> KrigingValidParams<F> {
        KrigingValidParams {
            tuning: HyperTuning::default(),
            algorithm: Algorithm::default(),
            n_start: KRG_OPTIM_N_START,
            max_eval: KRG_OPTIM_MAX_EVAL,
            ftol_rel: KRG_OPTIM_FTOL_REL,
            ftol_abs: 0.,
            seed: KRG_OPTIM_SEED,
        }
    }
}

impl<F: Float> KrigingValidParams<F> {
    /// Get hyperparameters tuning
    pub fn tuning(&self) -> &HyperTuning<F> {
        &self.tuning
    }

    /// Get the bounded minimizer
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Get the number of additional optimization starting points
    pub fn n_start(&self) -> usize {
        self.n_start
    }

    /// Get the max number of likelihood evaluations during one optimization
    pub fn max_eval(&self) -> usize {
        self.max_eval
    }

    /// Get the relative tolerance on the likelihood value
    pub fn ftol_rel(&self) -> f64 {
        self.ftol_rel
    }

    /// Get the absolute tolerance on the likelihood value
    pub fn ftol_abs(&self) -> f64 {
        self.ftol_abs
    }

    /// Get the multistart seed
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[derive(Clone, Debug)]
/// The set of parameters that can be specified for the fitting of
/// a [Kriging model](crate::Kriging).
pub struct KrigingParams<F: Float>(KrigingValidParams<F>);

impl<F: Float> Default for KrigingParams<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> KrigingParams<F> {
    /// A constructor for Kriging parameters with default values:
    /// hyperparameters optimized from `(theta, p) = (1, 2)` within
    /// `theta in [1e-4, 1e3]`, `p in [1, 2]` using SLSQP.
    pub fn new() -> KrigingParams<F> {
        Self(KrigingValidParams::default())
    }

    /// A constructor for Kriging parameters from validated parameters
    pub fn new_from_valid(params: &KrigingValidParams<F>) -> Self {
        Self(params.clone())
    }

    /// Use given hyperparameters as is, no likelihood optimization.
    pub fn fixed(mut self, hyper: Hyperparameters<F>) -> Self {
        self.0.tuning = HyperTuning::Fixed(hyper);
        self
    }

    /// Set initial guess of the likelihood optimization.
    ///
    /// When hyperparameters are fixed, this sets the fixed value.
    pub fn init(mut self, init: Hyperparameters<F>) -> Self {
        self.0.tuning = match self.0.tuning {
            HyperTuning::Fixed(_) => HyperTuning::Fixed(init),
            HyperTuning::Optimized { init: _, bounds } => HyperTuning::Optimized { init, bounds },
        };
        self
    }

    /// Set the hyperparameters search space.
    ///
    /// Hyperparameters switch to optimized tuning if they were fixed.
    pub fn bounds(mut self, bounds: HyperBounds<F>) -> Self {
        let init = *self.0.tuning.init();
        self.0.tuning = HyperTuning::Optimized { init, bounds };
        self
    }

    /// Set hyperparameters tuning
    pub fn tuning(mut self, tuning: HyperTuning<F>) -> Self {
        self.0.tuning = tuning;
        self
    }

    /// Set the bounded minimizer
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.0.algorithm = algorithm;
        self
    }

    /// Set the number of additional optimization starting points drawn within bounds.
    /// Default is 0: a single local search from the initial guess.
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.0.n_start = n_start;
        self
    }

    /// Set the max number of likelihood evaluations during one optimization.
    /// Given max_eval is raised to [crate::KRG_OPTIM_MIN_EVAL] if smaller.
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.0.max_eval = KRG_OPTIM_MIN_EVAL.max(max_eval);
        self
    }

    /// Set the relative tolerance on the likelihood value
    pub fn ftol_rel(mut self, ftol_rel: f64) -> Self {
        self.0.ftol_rel = ftol_rel;
        self
    }

    /// Set the absolute tolerance on the likelihood value
    pub fn ftol_abs(mut self, ftol_abs: f64) -> Self {
        self.0.ftol_abs = ftol_abs;
        self
    }

    /// Set the seed used to draw multistart points
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float> From<KrigingValidParams<F>> for KrigingParams<F> {
    fn from(valid: KrigingValidParams<F>) -> Self {
        KrigingParams(valid)
    }
}

impl<F: Float> ParamGuard for KrigingParams<F> {
    type Checked = KrigingValidParams<F>;
    type Error = KrigingError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if let HyperTuning::Optimized { init, bounds } = &self.0.tuning {
            if !bounds.contains(init) {
                return Err(KrigingError::InvalidHyperparameter(format!(
                    "initial guess {init} outside of bounds theta in [{}, {}], p in [{}, {}]",
                    bounds.theta.0, bounds.theta.1, bounds.p.0, bounds.p.1
                )));
            }
        }
        if !(self.0.ftol_rel >= 0. && self.0.ftol_abs >= 0.) {
            return Err(KrigingError::InvalidHyperparameter(format!(
                "optimizer tolerances should be non negative, got ftol_rel={} ftol_abs={}",
                self.0.ftol_rel, self.0.ftol_abs
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[inline(always)]
pub(crate) fn into_f64<F: Float>(v: F) -> f64 {
    <f64 as Float>::cast(v)
}
