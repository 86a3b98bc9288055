//! The boundary between model adapters and a differentiable computation
//! graph.
//!
//! Adapters evaluate log densities in foreign code (a symbolic runtime, a
//! sampling engine, user code). A graph that trains a variational family
//! embeds such an evaluation as one opaque node: a `S × num_vars` batch of
//! f64 samples goes in, `S` f32 log densities come out, and no gradient flows
//! back through the node.

use faer::{Col, Mat};

use crate::error::{ModelError, Result};
use crate::model::{check_row_len, ModelAdapter};

/// An opaque batch function embedded in a computation graph.
pub struct ExternalOp<'a> {
    num_vars: Option<usize>,
    func: Box<dyn FnMut(&Mat<f64>) -> Result<Col<f64>> + 'a>,
}

impl<'a> ExternalOp<'a> {
    /// Wrap a batch function. If `num_vars` is known, inputs with a
    /// different number of columns are rejected before `func` is called.
    pub fn new(
        num_vars: Option<usize>,
        func: impl FnMut(&Mat<f64>) -> Result<Col<f64>> + 'a,
    ) -> Self {
        Self {
            num_vars,
            func: Box::new(func),
        }
    }

    /// Bind `observed` and evaluate `adapter` on each batch passed to the op.
    pub fn from_adapter<A: ModelAdapter + ?Sized>(
        adapter: &'a mut A,
        observed: &'a A::Observed,
    ) -> Self {
        let num_vars = adapter.num_vars();
        Self::new(num_vars, move |samples| adapter.log_prob(observed, samples))
    }

    pub fn num_vars(&self) -> Option<usize> {
        self.num_vars
    }

    /// The op never propagates gradients.
    pub fn differentiable(&self) -> bool {
        false
    }

    /// Evaluate the op on a batch of samples.
    pub fn forward(&mut self, samples: &Mat<f64>) -> Result<Col<f32>> {
        if let Some(num_vars) = self.num_vars {
            check_row_len(samples, num_vars)?;
        }
        let out = (self.func)(samples)?;
        if out.nrows() != samples.nrows() {
            return Err(ModelError::OutputLength {
                expected: samples.nrows(),
                found: out.nrows(),
            });
        }
        Ok(Col::from_fn(out.nrows(), |i| out[i] as f32))
    }

    /// Vector-Jacobian product of the op: always zero, the op is a
    /// stop-gradient boundary.
    pub fn vjp(&self, samples: &Mat<f64>, _cotangent: &Col<f32>) -> Mat<f64> {
        Mat::zeros(samples.nrows(), samples.ncols())
    }
}

impl std::fmt::Debug for ExternalOp<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalOp")
            .field("num_vars", &self.num_vars)
            .finish_non_exhaustive()
    }
}
