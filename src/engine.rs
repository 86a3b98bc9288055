//! Models written in the modeling language of a sampling engine.
//!
//! The engine compiles a model from its source and the observed data. We only
//! need the compiled model for its parameter metadata and its log density
//! function, so it is fitted with a minimal run ([`FitSettings::default`])
//! the first time the adapter is asked for a log density.
//!
//! The engine addresses constrained parameters by name, but evaluates its
//! log density on a flat unconstrained vector. Samples handed to the adapter
//! are flat vectors in the engine's parameter order; each one is turned into
//! a named point, unconstrained by the engine and evaluated without the
//! Jacobian adjustment of the transform.

use std::fmt::Display;
use std::path::PathBuf;

use faer::{Col, Mat};

use crate::error::{ModelError, Result};
use crate::model::{eval_rows, ModelAdapter};
use crate::params::{ParamMap, ParamValue};

/// Where the engine reads the model definition from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    File(PathBuf),
    Code(String),
}

impl Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSource::File(path) => write!(f, "file {}", path.display()),
            ModelSource::Code(code) => write!(f, "inline code ({} bytes)", code.len()),
        }
    }
}

/// Settings for the engine run that instantiates the model.
#[derive(Debug, Clone, Copy)]
pub struct FitSettings {
    /// Number of iterations per chain.
    pub iter: u64,
    pub chains: usize,
    pub seed: u64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            iter: 1,
            chains: 1,
            seed: 0,
        }
    }
}

/// A model compiled and instantiated by a sampling engine.
pub trait EngineFit {
    /// Dimensions of each parameter, empty for scalars.
    fn par_dims(&self) -> &[Vec<usize>];

    /// Parameter names, in the same order as [`EngineFit::par_dims`].
    fn model_pars(&self) -> &[String];

    /// Convert a named point on the constrained space to the engine's flat
    /// unconstrained representation.
    fn unconstrain_pars(&self, pars: &ParamMap) -> anyhow::Result<Vec<f64>>;

    /// Log density at an unconstrained point. With `adjust_transform` the
    /// log determinant of the Jacobian of the constraining transform is added.
    fn log_prob(&self, upars: &[f64], adjust_transform: bool) -> anyhow::Result<f64>;
}

/// Entry point of a sampling engine.
pub trait SamplingEngine {
    type Data;
    type Fit: EngineFit;

    fn fit(
        &self,
        source: &ModelSource,
        data: &Self::Data,
        settings: &FitSettings,
    ) -> anyhow::Result<Self::Fit>;
}

/// A fitted model together with the length of its flat samples.
struct Instance<F> {
    fit: F,
    num_vars: usize,
}

/// Adapter for models of a sampling engine.
///
/// The observed data passed to the first [`ModelAdapter::log_prob`] call is
/// compiled into the model. Data passed to later calls is ignored.
pub struct EngineModelAdapter<E: SamplingEngine> {
    engine: E,
    source: ModelSource,
    settings: FitSettings,
    /// `None` until the first log density evaluation.
    instance: Option<Instance<E::Fit>>,
}

impl<E: SamplingEngine> EngineModelAdapter<E> {
    /// Create an adapter from exactly one of a model file and inline model
    /// code.
    pub fn new(engine: E, file: Option<PathBuf>, model_code: Option<String>) -> Result<Self> {
        let source = match (file, model_code) {
            (Some(file), None) => ModelSource::File(file),
            (None, Some(code)) => ModelSource::Code(code),
            (None, None) => {
                return Err(ModelError::Configuration(
                    "Either a model file or model code is required".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ModelError::Configuration(
                    "Only one of model file and model code can be given".into(),
                ))
            }
        };
        Ok(Self::with_source(engine, source))
    }

    pub fn from_file(engine: E, file: impl Into<PathBuf>) -> Self {
        Self::with_source(engine, ModelSource::File(file.into()))
    }

    pub fn from_code(engine: E, model_code: impl Into<String>) -> Self {
        Self::with_source(engine, ModelSource::Code(model_code.into()))
    }

    fn with_source(engine: E, source: ModelSource) -> Self {
        Self {
            engine,
            source,
            settings: FitSettings::default(),
            instance: None,
        }
    }

    pub fn with_settings(mut self, settings: FitSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.is_some()
    }

    /// The instantiated model, once the adapter is initialized.
    pub fn fit(&self) -> Option<&E::Fit> {
        self.instance.as_ref().map(|instance| &instance.fit)
    }

    fn instantiate(&self, data: &E::Data) -> Result<Instance<E::Fit>> {
        log::info!(
            "Instantiating engine model from {}, the engine may print diagnostics",
            self.source
        );
        let fit = self.engine.fit(&self.source, data, &self.settings)?;
        if fit.par_dims().len() != fit.model_pars().len() {
            return Err(anyhow::anyhow!(
                "Engine returned {} parameter dimensions for {} parameters",
                fit.par_dims().len(),
                fit.model_pars().len()
            )
            .into());
        }
        let num_vars = fit.par_dims().iter().map(|dims| param_size(dims)).sum();
        log::debug!(
            "engine model has {} parameters, {} dimensions",
            fit.model_pars().len(),
            num_vars
        );
        Ok(Instance { fit, num_vars })
    }
}

/// Number of values a parameter occupies in a flat sample.
fn param_size(dims: &[usize]) -> usize {
    if dims.is_empty() {
        1
    } else {
        dims.iter().product()
    }
}

/// Split a flat sample into the named constrained parameters of `fit`.
fn constrained_point<F: EngineFit>(fit: &F, row: &[f64]) -> Result<ParamMap> {
    let mut point = ParamMap::with_capacity(fit.model_pars().len());
    let mut idx = 0;
    for (dims, name) in fit.par_dims().iter().zip(fit.model_pars()) {
        let size = param_size(dims);
        let values = row.get(idx..idx + size).ok_or(ModelError::ParamCount {
            expected: idx + size,
            found: row.len(),
        })?;
        let value = if dims.is_empty() {
            ParamValue::Scalar(values[0])
        } else {
            ParamValue::array(dims.clone(), values.to_vec())
        };
        point.insert(name.clone(), value);
        idx += size;
    }
    if idx != row.len() {
        return Err(ModelError::ParamCount {
            expected: idx,
            found: row.len(),
        });
    }
    Ok(point)
}

impl<E: SamplingEngine> ModelAdapter for EngineModelAdapter<E> {
    type Observed = E::Data;

    fn num_vars(&self) -> Option<usize> {
        self.instance.as_ref().map(|instance| instance.num_vars)
    }

    fn log_prob(&mut self, observed: &Self::Observed, samples: &Mat<f64>) -> Result<Col<f64>> {
        let instance = match self.instance.take() {
            Some(instance) => instance,
            None => self.instantiate(observed)?,
        };
        let Instance { fit, num_vars } = &*self.instance.insert(instance);
        eval_rows(samples, *num_vars, |row| {
            let pars = constrained_point(fit, row)?;
            let upars = fit.unconstrain_pars(&pars)?;
            // no Jacobian term for the constraining transform
            Ok(fit.log_prob(&upars, false)?)
        })
    }
}
