pub mod encoders;
pub mod export;
pub mod fetcher;
pub mod projection;

pub use crate::domain::model::{ExportFormat, Record};
pub use crate::domain::ports::{ConfigProvider, Notifier, PageStrategy, RecordSource, Storage};
pub use crate::utils::error::Result;
