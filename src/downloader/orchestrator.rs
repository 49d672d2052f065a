// Strategy executor with ordered fallback

use reqwest::Url;

use super::errors::{DownloadError, StrategyFailure};
use super::models::{Retrieval, RetrievalRequest, StrategyOutcome};
use super::traits::RetrievalStrategy;

pub struct StrategyExecutor {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
}

impl StrategyExecutor {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn RetrievalStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies strictly in order; the first success wins.
    ///
    /// A structurally invalid URL is rejected before any strategy runs.
    pub async fn execute(&self, request: &RetrievalRequest) -> Result<Retrieval, DownloadError> {
        validate_source_url(request.source_url())?;

        let mut failures: Vec<StrategyFailure> = Vec::new();

        for strategy in &self.strategies {
            tracing::info!(
                strategy = strategy.name(),
                url = request.source_url(),
                audio_only = request.audio_only(),
                "trying strategy"
            );

            match strategy.attempt(request).await {
                StrategyOutcome::Failed(failure) => {
                    tracing::warn!(strategy = strategy.name(), reason = %failure.reason, "strategy failed");
                    failures.push(failure);
                }
                outcome => {
                    tracing::info!(strategy = strategy.name(), "strategy succeeded");
                    return Ok(Retrieval {
                        strategy: strategy.name().to_string(),
                        outcome,
                    });
                }
            }
        }

        tracing::error!(attempted = failures.len(), "all strategies failed");
        Err(DownloadError::AggregateFailure(failures))
    }
}

impl Default for StrategyExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute http(s) URL with a host
pub fn validate_source_url(source_url: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(source_url)
        .map_err(|_| DownloadError::InvalidInput("Invalid URL".to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::InvalidInput(
            "Invalid URL: only http and https are supported".to_string(),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(DownloadError::InvalidInput("Invalid URL: missing host".to_string()));
    }

    Ok(url)
}
