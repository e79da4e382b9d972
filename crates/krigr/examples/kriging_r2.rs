use krigr::correlation_models::correlation_profile;
use krigr::{likelihood_surface, Kriging, SampleSet};
use ndarray::{array, concatenate, Array, Array1, Axis};
use ndarray_npy::write_npy;

fn f(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| v.sin() + 0.95 + 0.075 * v * v - 0.001 * v.powi(4))
}

fn main() {
    env_logger::init();

    let xt = array![1., 3., 5., 7., 9., 11.];
    let yt = f(&xt);
    let samples =
        SampleSet::new(xt.clone().insert_axis(Axis(1)), yt).expect("valid sample set");

    println!("Train kriging surrogate at {xt}");
    let kriging = Kriging::params()
        .fit_samples(&samples)
        .expect("Kriging fitting");
    println!("{kriging}");
    println!("Optimization status: {:?}", kriging.status());

    let xtest = Array::linspace(0., 12., 121);
    let ytest = f(&xtest);
    let xtest = xtest.insert_axis(Axis(1));
    let (ypred, yvar) = kriging
        .predict_valvar(&xtest)
        .expect("Kriging prediction");

    println!("Prediction errors (x, err(x), sigma(x)) every unit");
    let table = concatenate![
        Axis(1),
        xtest,
        (&ypred - &ytest).insert_axis(Axis(1)),
        yvar.mapv(|v| v.sqrt()).insert_axis(Axis(1))
    ];
    for row in table.rows().into_iter().step_by(10) {
        println!("{row}");
    }

    // Likelihood landscape around the optimum
    let thetas = Array::logspace(10., -3., 2., 60);
    let ps = Array::linspace(1., 2., 11);
    let surface = likelihood_surface(&samples, &thetas, &ps).expect("likelihood surface");
    if let Some((best, value)) = surface.argmin() {
        println!("Best grid point {best} with likelihood {value}");
    }
    println!("{} infeasible grid points", surface.failures.len());

    let hyper = kriging.hyperparameters();
    let distances = Array::linspace(0., 10., 101);
    let profile = correlation_profile(&distances, hyper);

    let out_dir = "target/examples";
    std::fs::create_dir_all(out_dir).ok();
    write_npy(format!("{out_dir}/krg_x.npy"), &xtest).expect("x saved");
    write_npy(format!("{out_dir}/krg_pred.npy"), &ypred).expect("prediction saved");
    write_npy(format!("{out_dir}/krg_var.npy"), &yvar).expect("variance saved");
    write_npy(format!("{out_dir}/krg_likelihood.npy"), &surface.values).expect("surface saved");
    write_npy(format!("{out_dir}/krg_corr.npy"), &profile).expect("profile saved");
    println!("Plot data written in {out_dir}");
}
