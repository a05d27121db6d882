//! CLI command implementations

pub mod error;
pub mod harvest;
pub mod progress;

pub use error::CliError;
pub use harvest::{Cli, Commands, OutputFormat, ScheduleArgs, TimeUnit};
pub use progress::ProgressBarObserver;
