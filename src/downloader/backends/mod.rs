// Retrieval strategies

pub mod remote_api;
pub mod ytdlp;

pub use remote_api::{extract_media_id, RemoteApiStrategy};
pub use ytdlp::{LocalToolStrategy, LOCAL_TOOL_STRATEGY};

use reqwest::Client;

use crate::config::{Config, StrategyDescriptor};
use crate::downloader::orchestrator::StrategyExecutor;
use crate::downloader::tools::ToolCommand;
use crate::downloader::workspace::WorkspaceManager;

/// Build the executor chain in configured priority order
pub fn build_executor(
    config: &Config,
    command: &ToolCommand,
    workspaces: &WorkspaceManager,
    client: &Client,
) -> StrategyExecutor {
    let mut executor = StrategyExecutor::new();

    for descriptor in &config.strategies {
        match descriptor {
            StrategyDescriptor::LocalTool => {
                executor.add_strategy(Box::new(
                    LocalToolStrategy::new(command.clone(), workspaces.clone(), config.tool_timeout())
                        .with_proxy(config.proxy.clone()),
                ));
            }
            StrategyDescriptor::RemoteApi { name, endpoints } => {
                executor.add_strategy(Box::new(RemoteApiStrategy::new(
                    name.clone(),
                    endpoints.clone(),
                    client.clone(),
                    config.remote_timeout(),
                )));
            }
        }
    }

    executor
}
