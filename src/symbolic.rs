//! Models written against a symbolic modeling library.
//!
//! A symbolic model is built once against a [`SharedInput`] that holds the
//! observed data. The adapter overwrites that slot on each call to
//! [`ModelAdapter::log_prob`] and evaluates the model's log density for each
//! sample through a fixed [`Bijection`] between flat vectors and named
//! parameters.
//!
//! The slot is shared state. Two adapters (or an adapter and other code)
//! writing different data to the same slot concurrently race with each
//! other, the last write wins.

use std::sync::{Arc, PoisonError, RwLock};

use faer::{Col, Mat};

use crate::error::{ModelError, Result};
use crate::model::{eval_rows, ModelAdapter};
use crate::ordering::{ArrayOrdering, Bijection, VarInfo};
use crate::params::ParamMap;

/// Data that knows its own shape.
pub trait DataShape {
    fn data_shape(&self) -> Vec<usize>;
}

impl DataShape for f64 {
    fn data_shape(&self) -> Vec<usize> {
        vec![]
    }
}

impl DataShape for Vec<f64> {
    fn data_shape(&self) -> Vec<usize> {
        vec![self.len()]
    }
}

impl DataShape for Col<f64> {
    fn data_shape(&self) -> Vec<usize> {
        vec![self.nrows()]
    }
}

impl DataShape for Mat<f64> {
    fn data_shape(&self) -> Vec<usize> {
        vec![self.nrows(), self.ncols()]
    }
}

/// A mutable input slot shared between a symbolic model and its adapter.
///
/// Clones refer to the same slot.
#[derive(Debug)]
pub struct SharedInput<D> {
    value: Arc<RwLock<Option<D>>>,
    shape: Option<Vec<Option<usize>>>,
}

impl<D> Clone for SharedInput<D> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            shape: self.shape.clone(),
        }
    }
}

impl<D> Default for SharedInput<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> SharedInput<D> {
    /// An empty slot that accepts data of any shape.
    pub fn new() -> Self {
        Self {
            value: Arc::new(RwLock::new(None)),
            shape: None,
        }
    }

    /// An empty slot that only accepts data of the given shape. `None`
    /// entries accept any length along that axis.
    pub fn with_shape(shape: Vec<Option<usize>>) -> Self {
        Self {
            value: Arc::new(RwLock::new(None)),
            shape: Some(shape),
        }
    }

    pub fn expected_shape(&self) -> Option<&[Option<usize>]> {
        self.shape.as_deref()
    }

    /// Run `func` with the current value of the slot.
    pub fn with_value<T>(&self, func: impl FnOnce(Option<&D>) -> T) -> T {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        func(guard.as_ref())
    }

    pub fn is_set(&self) -> bool {
        self.with_value(|value| value.is_some())
    }
}

impl<D: DataShape> SharedInput<D> {
    /// Replace the value of the slot.
    pub fn set_value(&self, value: D) -> Result<()> {
        if let Some(expected) = self.shape.as_ref() {
            let found = value.data_shape();
            let matches = expected.len() == found.len()
                && expected
                    .iter()
                    .zip(found.iter())
                    .all(|(expected, &found)| expected.map_or(true, |len| len == found));
            if !matches {
                return Err(ModelError::ObservedShape {
                    expected: expected.clone(),
                    found,
                });
            }
        }
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }
}

impl<D: Clone> SharedInput<D> {
    pub fn get_value(&self) -> Option<D> {
        self.with_value(|value| value.cloned())
    }
}

/// A model definition of a symbolic modeling library.
///
/// Implementations read their observed data from a [`SharedInput`] they
/// were built with.
pub trait SymbolicModel {
    type Data: DataShape + Clone;

    /// All free variables of the model in declaration order.
    fn free_vars(&self) -> Vec<VarInfo>;

    /// A point containing a valid value for every variable of the model.
    fn test_point(&self) -> ParamMap;

    /// Log density of the model at `point`.
    fn logp(&self, point: &ParamMap) -> anyhow::Result<f64>;

    /// Gradient of the log density with respect to `vars`, as a point with
    /// one entry per variable.
    fn dlogp(&self, point: &ParamMap, vars: &[VarInfo]) -> anyhow::Result<ParamMap>;
}

/// Adapter for models of a symbolic modeling library.
pub struct SymbolicModelAdapter<M: SymbolicModel> {
    model: M,
    observed: SharedInput<M::Data>,
    vars: Vec<VarInfo>,
    bijection: Bijection,
}

impl<M: SymbolicModel> SymbolicModelAdapter<M> {
    /// Wrap `model`, which must read its data from `observed`.
    ///
    /// The continuous free variables of the model are flattened in their
    /// declaration order.
    pub fn new(model: M, observed: SharedInput<M::Data>) -> Self {
        let vars: Vec<VarInfo> = model
            .free_vars()
            .into_iter()
            .filter(|var| var.continuous)
            .collect();
        let ordering = ArrayOrdering::new(vars.iter().cloned());
        let bijection = Bijection::new(ordering, model.test_point());
        log::debug!(
            "symbolic model with {} free variables, {} dimensions",
            vars.len(),
            bijection.ordering().size()
        );
        Self {
            model,
            observed,
            vars,
            bijection,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn observed(&self) -> &SharedInput<M::Data> {
        &self.observed
    }

    pub fn bijection(&self) -> &Bijection {
        &self.bijection
    }

    /// The continuous free variables, in flattening order.
    pub fn vars(&self) -> &[VarInfo] {
        &self.vars
    }

    /// The log density as a function of a flat vector.
    pub fn logp_fn(&self) -> impl Fn(&[f64]) -> Result<f64> + '_ {
        self.bijection
            .mapf(move |point| self.model.logp(point).map_err(ModelError::Backend))
    }

    /// The gradient of the log density as a function of a flat vector.
    pub fn dlogp_fn(&self) -> impl Fn(&[f64]) -> Result<Vec<f64>> + '_ {
        self.bijection.mapf(move |point| {
            let grad = self
                .model
                .dlogp(point, &self.vars)
                .map_err(ModelError::Backend)?;
            self.bijection.map(&grad)
        })
    }
}

impl<M: SymbolicModel> ModelAdapter for SymbolicModelAdapter<M> {
    type Observed = M::Data;

    fn num_vars(&self) -> Option<usize> {
        Some(self.bijection.ordering().size())
    }

    fn log_prob(&mut self, observed: &Self::Observed, samples: &Mat<f64>) -> Result<Col<f64>> {
        self.observed.set_value(observed.clone())?;
        let logp = self.logp_fn();
        eval_rows(samples, self.bijection.ordering().size(), logp)
    }
}
