//! File encoders for projected records.
//!
//! Every tabular encoder keys its columns off the first record: the key set
//! and key order of record 0 define the header, and every other record must
//! carry the same keys in the same order. Encoders return typed errors and
//! never write partial output.

pub mod delimited;
pub mod json;
pub mod pdf;
pub mod xlsx;
pub mod xml;

use crate::core::{ExportFormat, Record};
use crate::domain::model::{EncodedFile, ExportJob};
use crate::utils::error::{ExportError, Result};
use chrono::NaiveDate;

pub use delimited::CsvEncoder;
pub use json::JsonEncoder;
pub use pdf::PdfEncoder;
pub use xlsx::XlsxEncoder;
pub use xml::XmlEncoder;

pub trait RecordEncoder {
    fn format(&self) -> ExportFormat;
    fn encode(&self, records: &[Record]) -> Result<Vec<u8>>;
}

/// Column names of a uniform record set, in first-record key order.
pub fn columns(format: ExportFormat, records: &[Record]) -> Result<Vec<String>> {
    let first = records.first().ok_or_else(|| ExportError::EncodeError {
        format: format.to_string(),
        message: "no records to encode".to_string(),
    })?;
    let expected: Vec<String> = first.keys().cloned().collect();

    for (index, record) in records.iter().enumerate().skip(1) {
        if !record.keys().eq(expected.iter()) {
            let found: Vec<&str> = record.keys().map(String::as_str).collect();
            return Err(ExportError::InconsistentRecordError {
                index,
                expected: expected.join(", "),
                found: found.join(", "),
            });
        }
    }
    Ok(expected)
}

/// PDF header labels used when the caller supplies none: the first
/// record's keys, uppercased.
pub fn default_headers(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|record| record.keys().map(|key| key.to_uppercase()).collect())
        .unwrap_or_default()
}

/// 依匯出工作選擇編碼器並產生檔案
pub fn encode(job: &ExportJob, records: &[Record], generated_on: NaiveDate) -> Result<EncodedFile> {
    let bytes = match job.format {
        ExportFormat::Xlsx => XlsxEncoder.encode(records)?,
        ExportFormat::Csv => CsvEncoder.encode(records)?,
        ExportFormat::Xml => XmlEncoder.encode(records)?,
        ExportFormat::Json => JsonEncoder.encode(records)?,
        ExportFormat::Pdf => {
            let title = job.title.clone().unwrap_or_default();
            let headers = job
                .headers
                .clone()
                .unwrap_or_else(|| default_headers(records));
            PdfEncoder::new(title, headers, generated_on).encode(records)?
        }
    };

    Ok(EncodedFile {
        file_name: job.file_name(),
        mime_type: job.format.mime_type(),
        bytes,
    })
}
