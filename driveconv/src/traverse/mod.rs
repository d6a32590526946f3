pub mod engine;
pub mod locator;
pub mod predicate;
pub mod provider;
pub mod queue;
pub mod stack;

#[cfg(test)]
pub(crate) mod fake;

use thiserror::Error;

use crate::store::StoreError;
use crate::trace::TraceError;
use provider::ProviderError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
}
