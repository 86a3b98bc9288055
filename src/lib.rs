//! Query probability models from different back-ends for their log joint
//! density, and compose variational distributions from independent layers.
//!
//! Three adapters implement [`ModelAdapter`]:
//!
//! - [`SymbolicModelAdapter`] for models of a symbolic modeling library that
//!   read their data from a [`SharedInput`],
//! - [`EngineModelAdapter`] for models compiled by a sampling engine,
//! - [`UserModelAdapter`] for models written as plain numeric code.
//!
//! Latent samples are passed as the rows of a `faer::Mat<f64>` and log
//! densities are returned as a `faer::Col<f64>` with one entry per row.
//!
//! [`Variational`] combines [`Layer`]s into a joint distribution, and
//! [`ExternalOp`] wraps an adapter as an opaque, non-differentiable node of a
//! computation graph.

mod engine;
mod error;
mod external;
pub mod layers;
mod math;
mod model;
mod ordering;
mod params;
mod symbolic;
mod user;
mod variational;

pub use engine::{EngineFit, EngineModelAdapter, FitSettings, ModelSource, SamplingEngine};
pub use error::{ModelError, Result};
pub use external::ExternalOp;
pub use layers::{Capabilities, Layer, Normal, NormalSettings, SamplingStrategy};
pub use math::{normal_logpdf, normal_logpdf_scalar};
pub use model::ModelAdapter;
pub use ordering::{ArrayOrdering, Bijection, VarInfo};
pub use params::{ParamMap, ParamValue};
pub use symbolic::{DataShape, SharedInput, SymbolicModel, SymbolicModelAdapter};
pub use user::{UserModel, UserModelAdapter};
pub use variational::{Draws, Variational};
