// Downloader module - retrieval pipeline behind the HTTP surface

pub mod backends;
pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;
pub mod workspace;

pub use backends::build_executor;
pub use errors::{DownloadError, FailureKind, StrategyFailure};
pub use models::{Retrieval, RetrievalRequest, StrategyOutcome, ToolsReport};
pub use orchestrator::StrategyExecutor;
pub use tools::{ToolCommand, ToolManager};
pub use traits::RetrievalStrategy;
pub use workspace::{Workspace, WorkspaceManager};
