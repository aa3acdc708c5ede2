// Operation executors: in-process or through the worker process

pub mod remote;

use crate::ops::{self, Operation, OperationResult};

pub use remote::{ExecutorError, RemoteConfig, RemoteExecutor};

/// Runs operations inside the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub async fn execute(&self, operation: Operation) -> OperationResult {
        ops::apply(&operation).await
    }
}

/// The two interchangeable execution strategies
pub enum Executor {
    Local(LocalExecutor),
    Remote(RemoteExecutor),
}

impl Executor {
    pub fn local() -> Self {
        Self::Local(LocalExecutor)
    }

    pub fn remote(config: RemoteConfig) -> Self {
        Self::Remote(RemoteExecutor::new(config))
    }

    pub async fn execute(&self, operation: Operation) -> OperationResult {
        match self {
            Self::Local(local) => local.execute(operation).await,
            Self::Remote(remote) => remote.execute(operation).await,
        }
    }

    /// Release any worker process; a no-op for the local strategy
    pub async fn stop(&self) {
        if let Self::Remote(remote) = self {
            remote.stop().await;
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }
}
