pub mod cli;
pub mod commands;
pub mod config;
pub mod executor;
pub mod logging;
pub mod ops;
pub mod queue;
pub mod report;
pub mod reporter;
pub mod time;
pub mod worker;

pub use executor::Executor;
pub use queue::TaskQueue;
pub use reporter::{LifecycleEvent, Reporter, ReporterOptions};
