//! Error taxonomy of the diffusion engine.
//!
//! Every failure is local to the operation that raised it; nothing retries.

use crate::types::KcId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A wrong or unknown entity was passed where a knowledge component,
    /// link or exercise was required.
    #[error("construction error: {0}")]
    Construction(String),

    /// A component or config value is not set up for the requested
    /// operation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A parameter left its valid interval.
    #[error("{name} out of range: {value} not in [{min}, {max}]")]
    Range {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The prerequisite graph contains a cycle. Diffusion assumes a DAG;
    /// traversal stops as soon as a component reappears on its own
    /// propagation path.
    #[error("cycle detected in prerequisite graph at KC #{0}")]
    Cycle(KcId),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub(crate) fn range(name: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::Range {
            name,
            value,
            min,
            max,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Validate that `value` lies in `[min, max]`.
pub(crate) fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(GraphError::range(name, value, min, max));
    }
    Ok(())
}
