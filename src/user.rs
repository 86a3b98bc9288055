//! Models written as plain numeric code.

use faer::{Col, Mat};

use crate::error::{ModelError, Result};
use crate::external::ExternalOp;
use crate::model::{check_row_len, ModelAdapter};

/// A model implemented directly by the user.
///
/// Only [`UserModel::raw_log_prob`] has to be implemented; the observed data
/// can be of any type the implementation works with.
pub trait UserModel {
    type Observed: Clone;

    /// Length of one flattened latent sample, if the model knows it.
    fn num_vars(&self) -> Option<usize> {
        None
    }

    /// Compute `[log p(observed, z_1), ..., log p(observed, z_S)]` for the
    /// rows `z_s` of `samples`.
    fn raw_log_prob(&self, observed: &Self::Observed, samples: &Mat<f64>) -> Result<Col<f64>> {
        let _ = (observed, samples);
        Err(ModelError::NotImplemented(
            "raw_log_prob must be implemented by the model".into(),
        ))
    }
}

/// Adapter for a [`UserModel`].
///
/// The observed data of the last [`ModelAdapter::log_prob`] call is cached,
/// so that batches can later be evaluated without passing it again.
pub struct UserModelAdapter<M: UserModel> {
    model: M,
    observed: Option<M::Observed>,
}

impl<M: UserModel> UserModelAdapter<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            observed: None,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// The cached observed data.
    pub fn observed(&self) -> Option<&M::Observed> {
        self.observed.as_ref()
    }

    /// Evaluate `samples` with the cached observed data.
    ///
    /// If the model knows its dimension, batches of a different width are
    /// rejected before the model sees them.
    pub fn log_prob_cached(&self, samples: &Mat<f64>) -> Result<Col<f64>> {
        let observed = self.observed.as_ref().ok_or(ModelError::Unbound)?;
        if let Some(num_vars) = self.model.num_vars() {
            check_row_len(samples, num_vars)?;
        }
        let out = self.model.raw_log_prob(observed, samples)?;
        if out.nrows() != samples.nrows() {
            return Err(ModelError::OutputLength {
                expected: samples.nrows(),
                found: out.nrows(),
            });
        }
        Ok(out)
    }

    /// Cache `observed` and return an op that evaluates batches with it.
    pub fn log_prob_op(&mut self, observed: &M::Observed) -> ExternalOp<'_> {
        self.observed = Some(observed.clone());
        let this: &Self = self;
        ExternalOp::new(this.model.num_vars(), move |samples| {
            this.log_prob_cached(samples)
        })
    }
}

impl<M: UserModel> ModelAdapter for UserModelAdapter<M> {
    type Observed = M::Observed;

    fn num_vars(&self) -> Option<usize> {
        self.model.num_vars()
    }

    fn log_prob(&mut self, observed: &Self::Observed, samples: &Mat<f64>) -> Result<Col<f64>> {
        self.observed = Some(observed.clone());
        self.log_prob_cached(samples)
    }
}
