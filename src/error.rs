use thiserror::Error;

/// Errors returned by model adapters, the variational container and the
/// external op boundary.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelError {
    /// The adapter was constructed with an invalid combination of arguments.
    #[error("Invalid model configuration: {0}")]
    Configuration(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Samples have {found} columns, expected {expected}")]
    RowLength { expected: usize, found: usize },

    /// `None` entries of `expected` match any length.
    #[error("Observed data has shape {found:?}, expected {expected:?}")]
    ObservedShape {
        expected: Vec<Option<usize>>,
        found: Vec<usize>,
    },

    #[error("Got draws for {found} layers, but the container has {expected}")]
    LayerCount { expected: usize, found: usize },

    #[error("Draws for layer {layer} have batch size {found}, expected {expected}")]
    BatchSize {
        layer: usize,
        expected: usize,
        found: usize,
    },

    #[error("Expected {expected} parameter values, got {found}")]
    ParamCount { expected: usize, found: usize },

    #[error("External op returned {found} values for a batch of {expected}")]
    OutputLength { expected: usize, found: usize },

    /// A cached value was needed before any observed data was bound.
    #[error("No observed data bound to the model")]
    Unbound,

    /// Failures of the symbolic runtime, the sampling engine or user code.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl ModelError {
    /// Whether the error is a violation of a shape or length contract by
    /// the caller, as opposed to a configuration or back-end failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ModelError::RowLength { .. }
                | ModelError::ObservedShape { .. }
                | ModelError::LayerCount { .. }
                | ModelError::BatchSize { .. }
                | ModelError::ParamCount { .. }
                | ModelError::OutputLength { .. }
                | ModelError::Unbound
        )
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
