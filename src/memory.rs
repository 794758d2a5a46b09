//! Optional memory collaborator.
//!
//! A chain with a [`Memory`] attached loads prior context before executing
//! and saves the new turn afterwards. The crate ships no implementation;
//! storage and any locking it needs belong to the implementor.

use crate::values::ChainValues;
use async_trait::async_trait;

#[async_trait]
pub trait Memory: Send + Sync {
    /// Keys this memory adds to the value bag on [`load`](Self::load).
    ///
    /// Chains do not require callers to supply these keys.
    fn memory_keys(&self) -> Vec<String>;

    /// Remembered variables for this turn. They are merged into the bag and
    /// win over caller-supplied values with the same key.
    async fn load(&self, values: &ChainValues) -> anyhow::Result<ChainValues>;

    /// Record a finished turn.
    async fn save(&self, inputs: &ChainValues, outputs: &ChainValues) -> anyhow::Result<()>;
}
