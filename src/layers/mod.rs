//! Distribution layers of a variational family.
//!
//! A layer is one independent factor of the joint variational distribution.
//! Which of the optional operations a layer supports is declared through its
//! [`Capabilities`]; the [`Variational`](crate::Variational) container
//! combines those of all its layers.

mod normal;

use std::fmt::{Debug, Display};

use faer::{Col, Mat};
use rand::RngCore;

use crate::error::{ModelError, Result};

pub use normal::{Normal, NormalSettings};

/// Optional operations supported by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Samples are a differentiable transform of parameter-free noise.
    pub reparam: bool,
    pub log_prob: bool,
    /// The entropy has a closed form.
    pub entropy: bool,
    /// The layer is a [`Normal`].
    pub normal: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        reparam: false,
        log_prob: false,
        entropy: false,
        normal: false,
    };

    pub const ALL: Capabilities = Capabilities {
        reparam: true,
        log_prob: true,
        entropy: true,
        normal: true,
    };

    /// Capabilities supported by both `self` and `other`.
    pub fn and(self, other: Capabilities) -> Capabilities {
        Capabilities {
            reparam: self.reparam & other.reparam,
            log_prob: self.log_prob & other.log_prob,
            entropy: self.entropy & other.entropy,
            normal: self.normal & other.normal,
        }
    }
}

/// How a layer draws its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// A closed-form, differentiable transform of standard noise.
    Reparameterized,
    /// An external sampler whose draws are fed to the graph as plain values.
    External,
}

/// One factor of a variational distribution.
pub trait Layer: Debug + Display + Send + Sync {
    /// Shape of a single draw.
    fn shape(&self) -> &[usize];

    /// Number of scalar values in a single draw.
    fn num_vars(&self) -> usize;

    /// Number of free variational parameters.
    fn num_params(&self) -> usize;

    fn is_multivariate(&self) -> bool;

    fn capabilities(&self) -> Capabilities;

    fn sampling_strategy(&self) -> SamplingStrategy {
        if self.capabilities().reparam {
            SamplingStrategy::Reparameterized
        } else {
            SamplingStrategy::External
        }
    }

    /// Draw `size` independent samples, one per row.
    fn sample(&self, rng: &mut dyn RngCore, size: usize) -> Result<Mat<f64>>;

    /// Log density of each row of `xs`.
    fn log_prob(&self, xs: &Mat<f64>) -> Result<Col<f64>> {
        let _ = xs;
        Err(ModelError::NotImplemented(format!(
            "log_prob of layer {}",
            self
        )))
    }

    fn entropy(&self) -> Result<f64> {
        Err(ModelError::NotImplemented(format!("entropy of layer {}", self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_capabilities() {
        let partial = Capabilities {
            entropy: false,
            ..Capabilities::ALL
        };
        assert_eq!(Capabilities::ALL.and(Capabilities::ALL), Capabilities::ALL);
        assert_eq!(Capabilities::ALL.and(partial), partial);
        assert_eq!(partial.and(Capabilities::NONE), Capabilities::NONE);
    }
}
