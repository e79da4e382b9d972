//! Bounded local minimizers used to tune the correlation hyperparameters.
//!
//! Objective functions handled here work on `f64` slices and may be infeasible
//! on part of the domain: such points are expected to evaluate to `+inf` and are
//! simply rejected. The best finite evaluation seen during a run is tracked so
//! that the result is never worse than the starting point.

use finitediff::FiniteDiff;
use ndarray::{s, Array1, Array2, Zip};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

/// Optimization algorithms used to minimize the likelihood
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Algorithm {
    /// Sequential quadratic programming with finite differences gradient
    #[default]
    Slsqp,
    /// Derivative free linear approximations
    Cobyla,
}

/// Status of a hyperparameters optimization
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum OptimStatus {
    /// The minimizer met its stopping tolerance
    Converged,
    /// The minimizer stopped early, the reason is given
    NotConverged(String),
}

impl OptimStatus {
    /// Whether the minimizer met its stopping tolerance
    pub fn is_converged(&self) -> bool {
        matches!(self, OptimStatus::Converged)
    }
}

/// Stopping criteria of a minimization
#[derive(Clone, Copy, Debug)]
pub(crate) struct OptimParams {
    pub max_eval: usize,
    pub ftol_rel: f64,
    pub ftol_abs: f64,
    /// Initial step of the derivative free search
    pub rhobeg: f64,
}

impl Default for OptimParams {
    fn default() -> Self {
        OptimParams {
            max_eval: 200,
            ftol_rel: 1e-10,
            ftol_abs: 0.,
            rhobeg: 0.5,
        }
    }
}

/// Outcome of a minimization
#[derive(Clone, Debug)]
pub(crate) struct Minimum {
    pub x: Array1<f64>,
    pub fmin: f64,
    pub status: OptimStatus,
    /// Number of objective evaluations, finite differences included
    pub n_eval: usize,
}

/// Objective function on a box domain, `+inf` where infeasible
pub(crate) type Objective<'a> = dyn Fn(&[f64]) -> f64 + Sync + 'a;

/// A local minimizer honoring box bounds
pub(crate) trait BoundedMinimizer {
    /// Minimize `fun` from `x0` within `bounds`, given as `(lower, upper)` for each component.
    /// Returns `None` when no feasible point was found.
    fn minimize(
        &self,
        fun: &Objective,
        x0: &[f64],
        bounds: &[(f64, f64)],
        params: &OptimParams,
    ) -> Option<Minimum>;
}

/// Wraps an objective to count its evaluations and record the best feasible point
struct BestTracker<'a, 'b> {
    fun: &'a Objective<'b>,
    bounds: &'a [(f64, f64)],
    best: RefCell<Option<(Vec<f64>, f64)>>,
    n_eval: Cell<usize>,
}

impl<'a, 'b> BestTracker<'a, 'b> {
    fn new(fun: &'a Objective<'b>, bounds: &'a [(f64, f64)]) -> Self {
        BestTracker {
            fun,
            bounds,
            best: RefCell::new(None),
            n_eval: Cell::new(0),
        }
    }

    fn eval(&self, x: &[f64]) -> f64 {
        if x.iter().any(|v| v.is_nan()) {
            return f64::INFINITY;
        }
        let x: Vec<f64> = x
            .iter()
            .zip(self.bounds)
            .map(|(v, (lo, up))| v.clamp(*lo, *up))
            .collect();
        self.n_eval.set(self.n_eval.get() + 1);
        let fx = (self.fun)(&x);
        if !fx.is_finite() {
            return f64::INFINITY;
        }
        let mut best = self.best.borrow_mut();
        if best.as_ref().map_or(true, |(_, fbest)| fx < *fbest) {
            *best = Some((x, fx));
        }
        fx
    }

    fn into_minimum(self, status: OptimStatus) -> Option<Minimum> {
        let n_eval = self.n_eval.get();
        self.best.into_inner().map(|(x, fmin)| Minimum {
            x: Array1::from_vec(x),
            fmin,
            status,
            n_eval,
        })
    }
}

impl BoundedMinimizer for Algorithm {
    fn minimize(
        &self,
        fun: &Objective,
        x0: &[f64],
        bounds: &[(f64, f64)],
        params: &OptimParams,
    ) -> Option<Minimum> {
        let tracker = BestTracker::new(fun, bounds);
        tracker.eval(x0);
        let status = match self {
            Algorithm::Slsqp => slsqp_minimize(&tracker, x0, params),
            Algorithm::Cobyla => cobyla_minimize(&tracker, x0, params),
        };
        tracker.into_minimum(status)
    }
}

fn slsqp_minimize(tracker: &BestTracker, x0: &[f64], params: &OptimParams) -> OptimStatus {
    let n_call = Cell::new(0);
    let objfn = |x: &[f64], gradient: Option<&mut [f64]>, _: &mut ()| -> f64 {
        n_call.set(n_call.get() + 1);
        if let Some(gradient) = gradient {
            gradient
                .iter_mut()
                .zip(bounded_gradient(tracker, x))
                .for_each(|(gi, v)| *gi = v);
        }
        tracker.eval(x)
    };
    let cons: Vec<fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64> = vec![];

    let res = slsqp::minimize(
        objfn,
        x0,
        tracker.bounds,
        &cons,
        (),
        params.max_eval,
        Some(slsqp::StopTols {
            ftol_rel: params.ftol_rel,
            ftol_abs: params.ftol_abs,
            ..slsqp::StopTols::default()
        }),
    );
    match res {
        Ok((status, _, fmin)) => {
            log::debug!(
                "Slsqp end: status={status:?} fmin={fmin} calls={}",
                n_call.get()
            );
            match status {
                slsqp::SuccessStatus::MaxEvalReached | slsqp::SuccessStatus::MaxTimeReached => {
                    OptimStatus::NotConverged(format!("{status:?} ({} evaluations)", params.max_eval))
                }
                _ => OptimStatus::Converged,
            }
        }
        Err((status, _, _)) => {
            log::warn!("Slsqp optimizer failure status={status:?}");
            OptimStatus::NotConverged(format!("{status:?}"))
        }
    }
}

fn cobyla_minimize(tracker: &BestTracker, x0: &[f64], params: &OptimParams) -> OptimStatus {
    use cobyla::{minimize, Func, RhoBeg, StopTols, SuccessStatus};

    let n_call = Cell::new(0);
    let cons: Vec<&dyn Func<()>> = vec![];
    let res = minimize(
        |x: &[f64], _: &mut ()| {
            n_call.set(n_call.get() + 1);
            tracker.eval(x)
        },
        x0,
        tracker.bounds,
        &cons,
        (),
        params.max_eval,
        RhoBeg::All(params.rhobeg),
        Some(StopTols {
            ftol_rel: params.ftol_rel,
            ftol_abs: params.ftol_abs,
            ..StopTols::default()
        }),
    );
    match res {
        Ok((status, _, fmin)) => {
            log::debug!(
                "Cobyla end: status={status:?} fmin={fmin} calls={}",
                n_call.get()
            );
            match status {
                SuccessStatus::MaxEvalReached | SuccessStatus::MaxTimeReached => {
                    OptimStatus::NotConverged(format!("{status:?} ({} evaluations)", params.max_eval))
                }
                _ => OptimStatus::Converged,
            }
        }
        Err((status, _, _)) => {
            log::warn!("Cobyla optimizer failure status={status:?}");
            OptimStatus::NotConverged(format!("{status:?}"))
        }
    }
}

/// Magnitude given to gradient components facing an infeasible point
const GRADIENT_WALL: f64 = 1e10;

/// Finite differences gradient of the tracked objective at `x`.
///
/// Central differences are used when every component lies at least one step
/// away from its bounds, otherwise differences are taken one-sided towards the
/// inside of the domain for the components lying on a bound.
fn bounded_gradient(tracker: &BestTracker, x: &[f64]) -> Vec<f64> {
    let h = f64::EPSILON.sqrt();
    let interior = x
        .iter()
        .zip(tracker.bounds)
        .all(|(v, (lo, up))| v - h >= *lo && v + h <= *up);
    let grad = if interior {
        x.to_vec().central_diff(&|x: &Vec<f64>| tracker.eval(x))
    } else {
        let fx = tracker.eval(x);
        let mut xh = x.to_vec();
        (0..x.len())
            .map(|i| {
                let (lo, up) = tracker.bounds[i];
                match (x[i] - h >= lo, x[i] + h <= up) {
                    (true, true) => {
                        let fwd = eval_shifted(tracker, &mut xh, i, h);
                        (fwd - eval_shifted(tracker, &mut xh, i, -h)) / (2. * h)
                    }
                    (_, true) => (eval_shifted(tracker, &mut xh, i, h) - fx) / h,
                    _ => (fx - eval_shifted(tracker, &mut xh, i, -h)) / h,
                }
            })
            .collect()
    };
    grad.into_iter()
        .map(|v| {
            if v.is_nan() {
                0.
            } else {
                v.clamp(-GRADIENT_WALL, GRADIENT_WALL)
            }
        })
        .collect()
}

fn eval_shifted(tracker: &BestTracker, x: &mut [f64], i: usize, step: f64) -> f64 {
    let xi = x[i];
    x[i] = xi + step;
    let fx = tracker.eval(x);
    x[i] = xi;
    fx
}

/// Starting points of a multistart optimization as a (n_start + 1, nx) array:
/// `x0` first then `n_start` points drawn uniformly within `bounds`
pub(crate) fn prepare_multistart(
    n_start: usize,
    x0: &Array1<f64>,
    bounds: &[(f64, f64)],
    seed: u64,
) -> Array2<f64> {
    let mut x0s = Array2::zeros((n_start + 1, x0.len()));
    x0s.row_mut(0).assign(x0);
    if n_start > 0 {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let unit = Array2::random_using((n_start, x0.len()), Uniform::new(0., 1.), &mut rng);
        Zip::from(x0s.slice_mut(s![1.., ..]).rows_mut())
            .and(unit.rows())
            .for_each(|mut x, u| {
                Zip::from(&mut x)
                    .and(&u)
                    .and(bounds)
                    .for_each(|xi, ui, (lo, up)| *xi = lo + ui * (up - lo));
            });
    }
    x0s
}

/// Run local minimizations from each row of `x0s` in parallel, the best minimum wins.
/// Reported evaluations are summed over all runs.
pub(crate) fn minimize_multistart<M: BoundedMinimizer + Sync>(
    minimizer: &M,
    fun: &Objective,
    x0s: &Array2<f64>,
    bounds: &[(f64, f64)],
    params: &OptimParams,
) -> Option<Minimum> {
    let runs: Vec<(usize, Option<Minimum>)> = (0..x0s.nrows())
        .into_par_iter()
        .map(|i| {
            let x0 = x0s.row(i).to_vec();
            let res = minimizer.minimize(fun, &x0, bounds, params);
            if let Some(res) = res.as_ref() {
                log::debug!("Start #{i} from {x0:?}: fmin={} at {}", res.fmin, res.x);
            }
            (i, res)
        })
        .collect();

    let n_eval: usize = runs.iter().flat_map(|(_, r)| r).map(|r| r.n_eval).sum();
    runs.into_iter()
        .filter_map(|(_, r)| r)
        .reduce(|a, b| if b.fmin < a.fmin { b } else { a })
        .map(|best| Minimum { n_eval, ..best })
}
