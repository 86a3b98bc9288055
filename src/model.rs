//! The uniform interface over probability models of different back-ends.
//!
//! Every adapter evaluates `log p(x, z_s)` for a fixed observed data set `x`
//! and a batch of latent samples `z_1, ..., z_S`. Samples are the rows of a
//! `S × num_vars` matrix, the result is a column of `S` log densities in
//! row order.

use faer::{Col, Mat};

use crate::error::{ModelError, Result};
use crate::math::copy_row;

/// A probability model that can be queried for its log joint density.
pub trait ModelAdapter {
    /// The observed data the model is conditioned on.
    type Observed;

    /// Length of one flattened latent sample.
    ///
    /// `None` if the model does not know its dimension yet, for example an
    /// engine-backed model before its first evaluation.
    fn num_vars(&self) -> Option<usize>;

    /// Compute `[log p(observed, z_1), ..., log p(observed, z_S)]` where
    /// `z_s` is row `s` of `samples`.
    ///
    /// Either the whole batch succeeds or an error is returned.
    fn log_prob(&mut self, observed: &Self::Observed, samples: &Mat<f64>) -> Result<Col<f64>>;

    /// Log density of a single flattened sample.
    fn log_prob_one(&mut self, observed: &Self::Observed, sample: &[f64]) -> Result<f64> {
        let samples = Mat::from_fn(1, sample.len(), |_, j| sample[j]);
        let out = self.log_prob(observed, &samples)?;
        Ok(out[0])
    }
}

impl<A: ModelAdapter + ?Sized> ModelAdapter for Box<A> {
    type Observed = A::Observed;

    fn num_vars(&self) -> Option<usize> {
        (**self).num_vars()
    }

    fn log_prob(&mut self, observed: &Self::Observed, samples: &Mat<f64>) -> Result<Col<f64>> {
        (**self).log_prob(observed, samples)
    }
}

/// Evaluate `func` on every row of `samples`.
///
/// Fails before any evaluation if the rows do not have length `expected`.
pub(crate) fn eval_rows(
    samples: &Mat<f64>,
    expected: usize,
    mut func: impl FnMut(&[f64]) -> Result<f64>,
) -> Result<Col<f64>> {
    check_row_len(samples, expected)?;
    let mut out = Col::zeros(samples.nrows());
    let mut row = vec![0f64; expected];
    for (i, val) in out.try_as_col_major_mut().unwrap().as_slice_mut().iter_mut().enumerate() {
        copy_row(samples, i, &mut row);
        *val = func(row.as_slice())?;
        log::trace!("row {} logp {}", i, *val);
    }
    Ok(out)
}

pub(crate) fn check_row_len(samples: &Mat<f64>, expected: usize) -> Result<()> {
    if samples.ncols() != expected {
        return Err(ModelError::RowLength {
            expected,
            found: samples.ncols(),
        });
    }
    Ok(())
}
