use crate::core::{Notifier, Storage};
use crate::domain::model::Notice;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Saves export files under a base directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    pub fn path_of(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.path_of(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        tracing::debug!("💾 Wrote {} bytes to {}", data.len(), full_path.display());
        Ok(())
    }
}

/// 終端機版的提示訊息
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!("🔔 Notice: {:?}", notice);
        match notice {
            Notice::Success { file_name } => {
                println!("✅ Export completed: {}", file_name);
            }
            Notice::NoRecords => {
                println!("📭 No records to export");
            }
            Notice::Failure { message } => {
                eprintln!("❌ {}", message);
            }
        }
    }
}
