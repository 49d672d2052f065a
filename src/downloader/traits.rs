// Retrieval strategy trait definition

use async_trait::async_trait;

use super::models::{RetrievalRequest, StrategyOutcome};

/// One self-contained way of obtaining media
///
/// Implementations never return `Err`: every failure, timeout included, is a
/// `StrategyOutcome::Failed` so the executor can move on to the next entry.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Name of the strategy (for logging and client diagnostics)
    fn name(&self) -> &str;

    async fn attempt(&self, request: &RetrievalRequest) -> StrategyOutcome;
}
