//! A variational distribution made of independent layers.
//!
//! The joint density of the container is the product of the layer densities,
//! so joint log densities and entropies are sums over the layers.
//!
//! A container with a single layer does not wrap that layer's draws:
//! [`Variational::sample`] returns [`Draws::Single`] and
//! [`Variational::log_prob`] expects one. With any other number of layers
//! draws are [`Draws::Joint`], one matrix per layer.

use std::fmt::Display;

use faer::{Col, Mat};
use itertools::Itertools;
use rand::RngCore;

use crate::error::{ModelError, Result};
use crate::layers::{Capabilities, Layer};
use crate::math::add_assign;

/// Draws of a variational distribution, or inputs to its log density.
#[derive(Debug, Clone, PartialEq)]
pub enum Draws {
    /// The draws of the only layer of a container.
    Single(Mat<f64>),
    /// Draws of each layer, in layer order.
    Joint(Vec<Mat<f64>>),
}

impl Draws {
    /// Number of per-layer entries.
    pub fn len(&self) -> usize {
        match self {
            Draws::Single(_) => 1,
            Draws::Joint(draws) => draws.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of rows of the first entry.
    pub fn batch_size(&self) -> Option<usize> {
        match self {
            Draws::Single(draws) => Some(draws.nrows()),
            Draws::Joint(draws) => draws.first().map(|draws| draws.nrows()),
        }
    }

    pub fn as_single(&self) -> Option<&Mat<f64>> {
        match self {
            Draws::Single(draws) => Some(draws),
            Draws::Joint(_) => None,
        }
    }

    pub fn as_joint(&self) -> Option<&[Mat<f64>]> {
        match self {
            Draws::Single(_) => None,
            Draws::Joint(draws) => Some(draws),
        }
    }
}

/// Values derived from the layers of a container.
#[derive(Debug, Clone, PartialEq)]
struct Summary {
    shape: Vec<Vec<usize>>,
    num_vars: usize,
    num_params: usize,
    capabilities: Capabilities,
    is_multivariate: Vec<bool>,
}

impl Summary {
    fn empty() -> Self {
        Self {
            shape: vec![],
            num_vars: 0,
            num_params: 0,
            capabilities: Capabilities::ALL,
            is_multivariate: vec![],
        }
    }

    fn with_layer(&self, layer: &dyn Layer) -> Self {
        let mut shape = self.shape.clone();
        shape.push(layer.shape().to_vec());
        let mut is_multivariate = self.is_multivariate.clone();
        is_multivariate.push(layer.is_multivariate());
        Self {
            shape,
            num_vars: self.num_vars + layer.num_vars(),
            num_params: self.num_params + layer.num_params(),
            capabilities: self.capabilities.and(layer.capabilities()),
            is_multivariate,
        }
    }
}

/// A container of distribution layers.
#[derive(Debug)]
pub struct Variational {
    layers: Vec<Box<dyn Layer>>,
    summary: Summary,
    arch: pulp::Arch,
}

impl Default for Variational {
    fn default() -> Self {
        Self::new()
    }
}

impl Variational {
    /// An empty container. Its capability flags are all true.
    pub fn new() -> Self {
        Self {
            layers: vec![],
            summary: Summary::empty(),
            arch: pulp::Arch::new(),
        }
    }

    pub fn from_layers(layers: impl IntoIterator<Item = Box<dyn Layer>>) -> Self {
        let mut variational = Self::new();
        for layer in layers {
            variational.add_boxed(layer);
        }
        variational
    }

    /// Add a layer on top of the layer stack.
    pub fn add(&mut self, layer: impl Layer + 'static) {
        self.add_boxed(Box::new(layer))
    }

    pub fn add_boxed(&mut self, layer: Box<dyn Layer>) {
        let summary = self.summary.with_layer(layer.as_ref());
        log::debug!(
            "adding layer {} with {} variables and {} parameters",
            self.layers.len(),
            layer.num_vars(),
            layer.num_params()
        );
        self.layers.push(layer);
        self.summary = summary;
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The shape of a draw of each layer.
    pub fn shape(&self) -> &[Vec<usize>] {
        &self.summary.shape
    }

    pub fn num_vars(&self) -> usize {
        self.summary.num_vars
    }

    pub fn num_params(&self) -> usize {
        self.summary.num_params
    }

    pub fn capabilities(&self) -> Capabilities {
        self.summary.capabilities
    }

    pub fn is_reparam(&self) -> bool {
        self.summary.capabilities.reparam
    }

    pub fn is_normal(&self) -> bool {
        self.summary.capabilities.normal
    }

    pub fn is_entropy(&self) -> bool {
        self.summary.capabilities.entropy
    }

    pub fn is_log_prob(&self) -> bool {
        self.summary.capabilities.log_prob
    }

    pub fn is_multivariate(&self) -> &[bool] {
        &self.summary.is_multivariate
    }

    /// Draw `size` samples from each layer.
    pub fn sample(&self, rng: &mut dyn RngCore, size: usize) -> Result<Draws> {
        let mut draws: Vec<Mat<f64>> = self
            .layers
            .iter()
            .map(|layer| layer.sample(&mut *rng, size))
            .collect::<Result<_>>()?;
        if draws.len() == 1 {
            return Ok(Draws::Single(draws.remove(0)));
        }
        Ok(Draws::Joint(draws))
    }

    /// Joint log density of `xs`, the sum of the log densities of all
    /// layers.
    ///
    /// All entries of `xs` must have the same number of rows.
    pub fn log_prob(&self, xs: &Draws) -> Result<Col<f64>> {
        if let [layer] = self.layers.as_slice() {
            return match xs {
                Draws::Single(xs) => layer.log_prob(xs),
                Draws::Joint(xs) => Err(ModelError::LayerCount {
                    expected: 1,
                    found: xs.len(),
                }),
            };
        }

        let xs = match xs {
            Draws::Joint(xs) if xs.len() == self.layers.len() => xs,
            _ => {
                return Err(ModelError::LayerCount {
                    expected: self.layers.len(),
                    found: xs.len(),
                })
            }
        };

        let batch = xs.first().map_or(0, |xs| xs.nrows());
        let mut log_prob = Col::zeros(batch);
        for (idx, (layer, xs)) in self.layers.iter().zip(xs).enumerate() {
            if xs.nrows() != batch {
                return Err(ModelError::BatchSize {
                    layer: idx,
                    expected: batch,
                    found: xs.nrows(),
                });
            }
            let layer_log_prob = layer.log_prob(xs)?;
            if layer_log_prob.nrows() != batch {
                return Err(ModelError::OutputLength {
                    expected: batch,
                    found: layer_log_prob.nrows(),
                });
            }
            add_assign(self.arch, &mut log_prob, &layer_log_prob);
        }
        Ok(log_prob)
    }

    /// Sum of the entropies of all layers.
    pub fn entropy(&self) -> Result<f64> {
        self.layers
            .iter()
            .try_fold(0f64, |total, layer| -> Result<f64> {
                Ok(total + layer.entropy()?)
            })
    }
}

impl Display for Variational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.layers.iter().join("\n"))
    }
}
