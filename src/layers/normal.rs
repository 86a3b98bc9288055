use std::fmt::Display;

use faer::{Col, Mat};
use itertools::{izip, Itertools};
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{ModelError, Result};
use crate::layers::{Capabilities, Layer};
use crate::math::{normal_logpdf_scalar, HALF_LN_2PI};
use crate::model::check_row_len;

/// Initial values of a [`Normal`] layer.
#[derive(Debug, Clone, Copy)]
pub struct NormalSettings {
    pub init_loc: f64,
    pub init_log_scale: f64,
}

impl Default for NormalSettings {
    fn default() -> Self {
        Self {
            init_loc: 0f64,
            init_log_scale: 0f64,
        }
    }
}

/// Mean-field normal distribution, parametrized by location and log scale.
#[derive(Debug, Clone)]
pub struct Normal {
    shape: [usize; 1],
    loc: Vec<f64>,
    log_scale: Vec<f64>,
}

impl Normal {
    pub fn new(num_vars: usize) -> Self {
        Self::with_settings(num_vars, NormalSettings::default())
    }

    pub fn with_settings(num_vars: usize, settings: NormalSettings) -> Self {
        Self {
            shape: [num_vars],
            loc: vec![settings.init_loc; num_vars],
            log_scale: vec![settings.init_log_scale; num_vars],
        }
    }

    pub fn from_params(loc: Vec<f64>, log_scale: Vec<f64>) -> Result<Self> {
        if loc.len() != log_scale.len() {
            return Err(ModelError::ParamCount {
                expected: loc.len(),
                found: log_scale.len(),
            });
        }
        Ok(Self {
            shape: [loc.len()],
            loc,
            log_scale,
        })
    }

    pub fn loc(&self) -> &[f64] {
        &self.loc
    }

    pub fn log_scale(&self) -> &[f64] {
        &self.log_scale
    }

    /// All parameters, locations first.
    pub fn params(&self) -> Vec<f64> {
        self.loc
            .iter()
            .chain(self.log_scale.iter())
            .copied()
            .collect()
    }

    /// Set all parameters, in the layout of [`Normal::params`].
    pub fn set_params(&mut self, params: &[f64]) -> Result<()> {
        if params.len() != self.num_params() {
            return Err(ModelError::ParamCount {
                expected: self.num_params(),
                found: params.len(),
            });
        }
        let (loc, log_scale) = params.split_at(self.loc.len());
        self.loc.copy_from_slice(loc);
        self.log_scale.copy_from_slice(log_scale);
        Ok(())
    }
}

impl Display for Normal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt = |vals: &mut dyn Iterator<Item = f64>| vals.map(|x| format!("{x:.3}")).join(" ");
        writeln!(f, "mean:")?;
        writeln!(f, "{}", fmt(&mut self.loc.iter().copied()))?;
        writeln!(f, "std dev:")?;
        write!(f, "{}", fmt(&mut self.log_scale.iter().map(|x| x.exp())))
    }
}

impl Layer for Normal {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn num_vars(&self) -> usize {
        self.loc.len()
    }

    fn num_params(&self) -> usize {
        2 * self.loc.len()
    }

    fn is_multivariate(&self) -> bool {
        false
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn sample(&self, rng: &mut dyn RngCore, size: usize) -> Result<Mat<f64>> {
        let mut out = Mat::zeros(size, self.num_vars());
        for i in 0..size {
            for (j, (&loc, &log_scale)) in izip!(&self.loc, &self.log_scale).enumerate() {
                let eps: f64 = StandardNormal.sample(rng);
                out[(i, j)] = loc + log_scale.exp() * eps;
            }
        }
        Ok(out)
    }

    fn log_prob(&self, xs: &Mat<f64>) -> Result<Col<f64>> {
        check_row_len(xs, self.num_vars())?;
        Ok(Col::from_fn(xs.nrows(), |i| {
            izip!(&self.loc, &self.log_scale)
                .enumerate()
                .map(|(j, (&loc, &log_scale))| {
                    normal_logpdf_scalar(xs[(i, j)], loc, log_scale.exp())
                })
                .sum::<f64>()
        }))
    }

    fn entropy(&self) -> Result<f64> {
        let dim = self.num_vars() as f64;
        Ok(self.log_scale.iter().sum::<f64>() + dim * (0.5 + HALF_LN_2PI))
    }
}
