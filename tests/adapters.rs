use std::cell::{Cell, RefCell};

use anyhow::{anyhow, ensure};
use approx::assert_abs_diff_eq;
use faer::Mat;
use pretty_assertions::assert_eq;
use probmodel::{
    normal_logpdf_scalar, EngineFit, EngineModelAdapter, ExternalOp, FitSettings, ModelAdapter,
    ModelError, ModelSource, ParamMap, ParamValue, SamplingEngine, SharedInput, SymbolicModel,
    SymbolicModelAdapter, UserModel, UserModelAdapter, VarInfo,
};

/// `mu ~ N(0, 1)` and `y_i ~ N(mu, 1)` for the observed `y`.
struct NormalMean {
    data: SharedInput<Vec<f64>>,
}

impl NormalMean {
    fn closed_form(mu: f64, data: &[f64]) -> f64 {
        normal_logpdf_scalar(mu, 0., 1.)
            + data
                .iter()
                .map(|&y| normal_logpdf_scalar(y, mu, 1.))
                .sum::<f64>()
    }
}

impl SymbolicModel for NormalMean {
    type Data = Vec<f64>;

    fn free_vars(&self) -> Vec<VarInfo> {
        vec![VarInfo::scalar("mu")]
    }

    fn test_point(&self) -> ParamMap {
        [("mu", 0.)].into_iter().collect()
    }

    fn logp(&self, point: &ParamMap) -> anyhow::Result<f64> {
        let mu = point
            .get("mu")
            .and_then(ParamValue::as_scalar)
            .ok_or_else(|| anyhow!("mu is not a scalar"))?;
        let data = self.data.get_value().ok_or_else(|| anyhow!("no data"))?;
        Ok(Self::closed_form(mu, &data))
    }

    fn dlogp(&self, point: &ParamMap, _vars: &[VarInfo]) -> anyhow::Result<ParamMap> {
        let mu = point
            .get("mu")
            .and_then(ParamValue::as_scalar)
            .ok_or_else(|| anyhow!("mu is not a scalar"))?;
        let data = self.data.get_value().ok_or_else(|| anyhow!("no data"))?;
        let grad = -mu + data.iter().map(|y| y - mu).sum::<f64>();
        Ok([("mu", grad)].into_iter().collect())
    }
}

#[test]
fn symbolic_scalar_model() {
    let data = SharedInput::with_shape(vec![None]);
    let mut adapter = SymbolicModelAdapter::new(NormalMean { data: data.clone() }, data);
    assert_eq!(adapter.num_vars(), Some(1));

    let observed = vec![1., 2., 3.];
    let samples = Mat::from_fn(2, 1, |i, _| i as f64);
    let out = adapter.log_prob(&observed, &samples).unwrap();

    assert_eq!(out.nrows(), 2);
    assert_abs_diff_eq!(out[0], NormalMean::closed_form(0., &observed), epsilon = 1e-12);
    assert_abs_diff_eq!(out[1], NormalMean::closed_form(1., &observed), epsilon = 1e-12);
    // log N(0; 0, 1) + log N(1; 0, 1) + log N(2; 0, 1) + log N(3; 0, 1)
    assert_abs_diff_eq!(out[0], -4. * 0.918938533204673 - 7., epsilon = 1e-12);

    let grad = adapter.dlogp_fn()(&[2.]).unwrap();
    assert_abs_diff_eq!(grad[0], -2. + (-1. + 0. + 1.));
}

#[test]
fn symbolic_observed_shape() {
    let data = SharedInput::with_shape(vec![Some(3)]);
    let mut adapter = SymbolicModelAdapter::new(NormalMean { data: data.clone() }, data);
    let samples = Mat::zeros(1, 1);
    assert!(adapter.log_prob(&vec![1., 2., 3.], &samples).is_ok());
    let err = adapter.log_prob(&vec![1., 2.], &samples).unwrap_err();
    assert!(matches!(err, ModelError::ObservedShape { .. }));
}

/// A fitted engine model with parameters `mu`, `sigma > 0` and `theta[3]`.
struct Fit {
    dims: Vec<Vec<usize>>,
    names: Vec<String>,
    adjust_flags: RefCell<Vec<bool>>,
}

impl EngineFit for Fit {
    fn par_dims(&self) -> &[Vec<usize>] {
        &self.dims
    }

    fn model_pars(&self) -> &[String] {
        &self.names
    }

    fn unconstrain_pars(&self, pars: &ParamMap) -> anyhow::Result<Vec<f64>> {
        let names: Vec<&str> = pars.names().collect();
        ensure!(names == ["mu", "sigma", "theta"], "unexpected order {names:?}");
        let mut out = vec![];
        for (name, value) in pars.iter() {
            match name {
                "sigma" => out.push(value.as_scalar().unwrap_or(f64::NAN).ln()),
                _ => out.extend_from_slice(value.as_slice()),
            }
        }
        Ok(out)
    }

    fn log_prob(&self, upars: &[f64], adjust_transform: bool) -> anyhow::Result<f64> {
        self.adjust_flags.borrow_mut().push(adjust_transform);
        Ok(upars.iter().map(|&x| normal_logpdf_scalar(x, 0., 1.)).sum())
    }
}

#[derive(Default)]
struct Engine {
    fits: Cell<usize>,
    data_seen: RefCell<Vec<f64>>,
}

impl SamplingEngine for Engine {
    type Data = Vec<f64>;
    type Fit = Fit;

    fn fit(
        &self,
        source: &ModelSource,
        data: &Vec<f64>,
        settings: &FitSettings,
    ) -> anyhow::Result<Fit> {
        ensure!(
            matches!(source, ModelSource::Code(_)),
            "test engine only compiles inline code"
        );
        ensure!(settings.iter == 1 && settings.chains == 1);
        self.fits.set(self.fits.get() + 1);
        *self.data_seen.borrow_mut() = data.clone();
        Ok(Fit {
            dims: vec![vec![], vec![], vec![3]],
            names: vec!["mu".into(), "sigma".into(), "theta".into()],
            adjust_flags: RefCell::new(vec![]),
        })
    }
}

#[test]
fn engine_initializes_once() {
    let mut adapter = EngineModelAdapter::new(Engine::default(), None, Some("model".into())).unwrap();
    assert_eq!(adapter.num_vars(), None);

    let samples = Mat::from_fn(3, 5, |i, j| if j == 1 { 1. } else { i as f64 });
    let out = adapter.log_prob(&vec![1., 2.], &samples).unwrap();
    assert_eq!(out.nrows(), 3);
    assert_eq!(adapter.num_vars(), Some(5));

    let out2 = adapter.log_prob(&vec![10.], &samples).unwrap();
    assert_eq!(out.try_as_col_major().unwrap().as_slice(), out2.try_as_col_major().unwrap().as_slice());
    assert_eq!(adapter.engine().fits.get(), 1);
    // data of later calls is not rebound
    assert_eq!(*adapter.engine().data_seen.borrow(), vec![1., 2.]);

    let fit = adapter.fit().unwrap();
    assert_eq!(fit.adjust_flags.borrow().len(), 6);
    assert!(fit.adjust_flags.borrow().iter().all(|&adjust| !adjust));
}

#[test]
fn engine_log_density_per_row() {
    let mut adapter = EngineModelAdapter::from_code(Engine::default(), "model");
    let samples = Mat::from_fn(2, 5, |i, j| match (i, j) {
        (_, 1) => (1. + i as f64).exp(),
        (0, _) => 0.,
        _ => 2.,
    });
    let out = adapter.log_prob(&vec![], &samples).unwrap();
    let expected = |x: f64, log_sigma: f64| {
        4. * normal_logpdf_scalar(x, 0., 1.) + normal_logpdf_scalar(log_sigma, 0., 1.)
    };
    assert_abs_diff_eq!(out[0], expected(0., 1.), epsilon = 1e-12);
    assert_abs_diff_eq!(out[1], expected(2., 2.), epsilon = 1e-12);
}

#[test]
fn engine_rejects_wrong_row_length() {
    let mut adapter = EngineModelAdapter::from_code(Engine::default(), "model");
    let err = adapter.log_prob(&vec![], &Mat::zeros(2, 4)).unwrap_err();
    assert!(err.is_contract_violation());
    assert!(matches!(
        err,
        ModelError::RowLength {
            expected: 5,
            found: 4,
        }
    ));
    // initialization still happened, and is not repeated
    assert!(adapter.is_initialized());
    assert!(adapter.log_prob(&vec![], &Mat::zeros(2, 6)).is_err());
    assert_eq!(adapter.engine().fits.get(), 1);
}

#[test]
fn engine_backend_errors_pass_through() {
    let mut adapter = EngineModelAdapter::from_file(Engine::default(), "model.stan");
    let err = adapter.log_prob(&vec![], &Mat::zeros(1, 5)).unwrap_err();
    assert!(matches!(err, ModelError::Backend(_)));
    assert_eq!(err.to_string(), "test engine only compiles inline code");
    assert!(!adapter.is_initialized());
}

/// Log density of independent standard normal latent variables, shifted by
/// the mean of the observed data.
struct Shifted {
    dim: usize,
}

impl UserModel for Shifted {
    type Observed = Vec<f64>;

    fn num_vars(&self) -> Option<usize> {
        Some(self.dim)
    }

    fn raw_log_prob(
        &self,
        observed: &Vec<f64>,
        samples: &Mat<f64>,
    ) -> probmodel::Result<faer::Col<f64>> {
        let shift = observed.iter().sum::<f64>() / observed.len() as f64;
        Ok(faer::Col::from_fn(samples.nrows(), |i| {
            (0..samples.ncols())
                .map(|j| normal_logpdf_scalar(samples[(i, j)], shift, 1.))
                .sum()
        }))
    }
}

#[test]
fn user_model_rows_in_order() {
    let mut adapter = UserModelAdapter::new(Shifted { dim: 2 });
    let samples = Mat::from_fn(4, 2, |i, _| i as f64);
    let out = adapter.log_prob(&vec![1., 3.], &samples).unwrap();
    assert_eq!(out.nrows(), 4);
    for i in 0..4 {
        assert_abs_diff_eq!(out[i], 2. * normal_logpdf_scalar(i as f64, 2., 1.));
    }
}

#[test]
fn external_op_from_adapter() {
    let data = SharedInput::new();
    let mut adapter = SymbolicModelAdapter::new(NormalMean { data: data.clone() }, data);
    let observed = vec![0.];
    let samples = Mat::from_fn(3, 1, |i, _| i as f64);

    let expected: Vec<f32> = (0..3)
        .map(|i| NormalMean::closed_form(i as f64, &observed) as f32)
        .collect();

    let mut op = ExternalOp::from_adapter(&mut adapter, &observed);
    assert_eq!(op.num_vars(), Some(1));
    assert!(!op.differentiable());
    let out = op.forward(&samples).unwrap();
    assert_eq!(out.try_as_col_major().unwrap().as_slice(), expected.as_slice());
    assert!(op.forward(&Mat::zeros(3, 2)).is_err());
}
