use crate::core::encoders;
use crate::core::{Notifier, RecordSource, Storage};
use crate::domain::model::{ExportJob, ExportOutcome, Notice, Record};
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::Validate;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};

/// Drives one export control: fetch, project, encode, save, notify.
///
/// Each engine owns its own in-progress flag, so two engines never share
/// mutable state while a third trigger on a busy engine is rejected.
pub struct ExportEngine<R: RecordSource, S: Storage, N: Notifier> {
    source: R,
    storage: S,
    notifier: N,
    exporting: AtomicBool,
    generated_on: Option<NaiveDate>,
}

/// Clears the in-progress flag on every exit path.
struct ExportingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExportingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ExportingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<R: RecordSource, S: Storage, N: Notifier> ExportEngine<R, S, N> {
    pub fn new(source: R, storage: S, notifier: N) -> Self {
        Self {
            source,
            storage,
            notifier,
            exporting: AtomicBool::new(false),
            generated_on: None,
        }
    }

    /// Pins the date printed on PDF reports.
    pub fn with_generation_date(mut self, date: NaiveDate) -> Self {
        self.generated_on = Some(date);
        self
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }

    pub async fn run_export(&self, job: &ExportJob) -> Result<ExportOutcome> {
        let Some(_guard) = ExportingGuard::acquire(&self.exporting) else {
            tracing::warn!("⏳ Export of {} ignored, another export is running", job.resource_path);
            return Err(ExportError::ExportInProgressError);
        };

        tracing::info!(
            "🚀 Starting {} export of {} -> {}",
            job.format,
            job.resource_path,
            job.file_name()
        );

        match self.execute(job).await {
            Ok(ExportOutcome::NoRecords) => {
                tracing::info!("📭 No records to export from {}", job.resource_path);
                self.notifier.notify(Notice::NoRecords);
                Ok(ExportOutcome::NoRecords)
            }
            Ok(saved) => {
                tracing::info!("✅ Export saved as {}", job.file_name());
                self.notifier.notify(Notice::Success {
                    file_name: job.file_name(),
                });
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(
                    "❌ Export of {} failed: {} (Category: {:?}, Severity: {:?})",
                    job.resource_path,
                    e,
                    e.category(),
                    e.severity()
                );
                self.notifier.notify(Notice::Failure {
                    message: e.user_friendly_message(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &ExportJob) -> Result<ExportOutcome> {
        job.validate()?;

        // Extract
        let raw = self.source.fetch_all(&job.resource_path).await?;
        tracing::debug!("Extracted {} records", raw.len());

        // Transform
        let projected: Vec<Record> = raw.iter().map(|record| (job.projection)(record)).collect();
        if projected.is_empty() {
            return Ok(ExportOutcome::NoRecords);
        }

        // Load
        let generated_on = self
            .generated_on
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let file = encoders::encode(job, &projected, generated_on)?;
        tracing::debug!(
            "Writing {} ({}, {} bytes) to storage",
            file.file_name,
            file.mime_type,
            file.bytes.len()
        );
        self.storage.write_file(&file.file_name, &file.bytes).await?;

        Ok(ExportOutcome::Saved {
            file_name: file.file_name,
            mime_type: file.mime_type,
            bytes: file.bytes.len(),
            records: projected.len(),
        })
    }
}
