//! Contracts with the external collaborators: device, surface, launcher.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{BindingParams, Unit};

/// The emulated machine, as seen by the primary.
///
/// Output flows the other way: the host feeds every `(unit, byte)` the
/// device emits into the primary's router.
pub trait Device: Send + Sync {
    /// Feed one character to the device on behalf of `unit`.
    fn inject_input(&self, unit: Unit, byte: u8);
}

/// Local rendering surface of one execution context.
pub trait Surface: Send + Sync {
    /// Paint output text.
    fn render(&self, text: &str);
}

/// Reference to an externally owned execution context.
///
/// Only the spawner that created it may hold one.
pub trait ContextHandle: Send + Sync {
    /// Whether the context is still running.
    fn is_alive(&self) -> bool;

    /// Ask the host to tear the context down.
    fn terminate(&self);
}

/// Launch error.
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    #[error("Context creation blocked: {0}")]
    Blocked(String),
    #[error("Context creation failed: {0}")]
    Failed(String),
}

/// Host facility that creates new execution contexts.
#[async_trait]
pub trait ContextLauncher: Send + Sync {
    /// Create a context bound through `params`.
    async fn launch(&self, params: BindingParams) -> Result<Arc<dyn ContextHandle>, LaunchError>;
}
