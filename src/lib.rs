pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::cli::{ConsoleNotifier, LocalStorage};
pub use config::toml_config::TomlConfig;
pub use core::{export::ExportEngine, fetcher::HttpRecordSource};
pub use domain::model::{ExportFormat, ExportJob, ExportOutcome, Notice, Record};
pub use utils::error::{ExportError, Result};
