use super::RecordEncoder;
use crate::core::{ExportFormat, Record};
use crate::utils::error::Result;

/// Pretty printed array of flat objects. Records are not required to share
/// a key set here.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl RecordEncoder for JsonEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(records)?)
    }
}
