//! tidyplan - sort a flat directory into category folders, reversibly.
//!
//! The work happens in four stages that hand JSON documents to each other:
//! [`scanner`] lists and classifies files, [`planner`] turns the scan into a
//! conflict-free [`MovePlan`], [`executor`] applies the plan and records an
//! [`ExecutionLog`], and [`rollback`] uses that log to put every file back.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod document;
pub mod executor;
pub mod file_category;
pub mod output;
pub mod planner;
pub mod relocate;
pub mod rollback;
pub mod scanner;
pub mod timestamp;

pub use checksum::Checksum;
pub use config::{CompiledFilters, Config, ConfigError};
pub use executor::{ApplyOptions, ExecutionLog, Executor, OperationResult, RunStats, Status};
pub use file_category::{CategoryMap, CategoryTable};
pub use planner::{MoveOperation, MovePlan, generate_plan};
pub use relocate::{FsRelocator, Relocator};
pub use rollback::{RollbackLog, RollbackManager, RollbackOptions};
pub use scanner::{FileRecord, ScanResult, Scanner};

pub use cli::{Cli, run_cli};
