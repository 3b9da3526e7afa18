use crate::utils::error::{ExportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 一筆扁平記錄，欄位順序即插入順序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Builder style insert, keeps call order as column order.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Text form of a value inside a table cell.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Xml,
    Pdf,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Xlsx,
        ExportFormat::Csv,
        ExportFormat::Xml,
        ExportFormat::Pdf,
        ExportFormat::Json,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Xml => "xml",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Xml => "application/xml",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn file_name(&self, base_name: &str) -> String {
        format!("{}.{}", base_name, self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.extension() == wanted)
            .ok_or_else(|| ExportError::InvalidConfigValueError {
                field: "format".to_string(),
                value: s.to_string(),
                reason: "Valid formats: xlsx, csv, xml, pdf, json".to_string(),
            })
    }
}

pub type Projection = Arc<dyn Fn(&Record) -> Record + Send + Sync>;

pub fn identity_projection() -> Projection {
    Arc::new(|record: &Record| record.clone())
}

/// 一次匯出請求，不持久化
#[derive(Clone)]
pub struct ExportJob {
    pub resource_path: String,
    pub output_base_name: String,
    pub format: ExportFormat,
    pub title: Option<String>,
    pub headers: Option<Vec<String>>,
    pub projection: Projection,
}

impl ExportJob {
    pub fn new(
        resource_path: impl Into<String>,
        output_base_name: impl Into<String>,
        format: ExportFormat,
    ) -> Self {
        Self {
            resource_path: resource_path.into(),
            output_base_name: output_base_name.into(),
            format,
            title: None,
            headers: None,
            projection: identity_projection(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_projection<F>(mut self, projection: F) -> Self
    where
        F: Fn(&Record) -> Record + Send + Sync + 'static,
    {
        self.projection = Arc::new(projection);
        self
    }

    pub fn with_shared_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn file_name(&self) -> String {
        self.format.file_name(&self.output_base_name)
    }
}

impl fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportJob")
            .field("resource_path", &self.resource_path)
            .field("output_base_name", &self.output_base_name)
            .field("format", &self.format)
            .field("title", &self.title)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl Validate for ExportJob {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("resource_path", &self.resource_path)?;
        validation::validate_file_name("output_base_name", &self.output_base_name)?;

        if self.format == ExportFormat::Pdf {
            let title = validation::validate_required_field("title", &self.title)?;
            validation::validate_non_empty_string("title", title)?;
        }
        Ok(())
    }
}

pub const LATEST_ENTRIES_FIELD: &str = "ultimasAsesorias";
pub const ITEMS_FIELD: &str = "items";

/// The page body layouts the backend is known to return.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// Report endpoints: `{ "ultimasAsesorias": [...] }`
    LatestEntries(Vec<Value>),
    /// Paged endpoints: `{ "items": [...], "total": n }`
    Items(Vec<Value>),
    /// Plain list endpoints: `[...]`
    Bare(Vec<Value>),
}

impl ResponseShape {
    pub fn from_body(body: Value) -> Result<Self> {
        match body {
            Value::Array(items) => Ok(ResponseShape::Bare(items)),
            Value::Object(mut obj) => {
                if let Some(Value::Array(entries)) = obj.remove(LATEST_ENTRIES_FIELD) {
                    return Ok(ResponseShape::LatestEntries(entries));
                }
                if let Some(Value::Array(items)) = obj.remove(ITEMS_FIELD) {
                    return Ok(ResponseShape::Items(items));
                }
                let fields: Vec<&str> = obj.keys().map(String::as_str).collect();
                Err(ExportError::UnrecognizedShapeError {
                    description: format!("object with fields [{}]", fields.join(", ")),
                })
            }
            other => Err(ExportError::UnrecognizedShapeError {
                description: format!("bare {}", json_kind(&other)),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::LatestEntries(_) => LATEST_ENTRIES_FIELD,
            ResponseShape::Items(_) => ITEMS_FIELD,
            ResponseShape::Bare(_) => "array",
        }
    }

    pub fn into_records(self) -> Result<Vec<Record>> {
        let values = match self {
            ResponseShape::LatestEntries(v) | ResponseShape::Items(v) | ResponseShape::Bare(v) => v,
        };

        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(obj) => Ok(Record::from_map(obj)),
                _ => Err(ExportError::MalformedRecordError { index }),
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved {
        file_name: String,
        mime_type: &'static str,
        bytes: usize,
        records: usize,
    },
    NoRecords,
}

/// 每次匯出恰好發出一個通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success { file_name: String },
    NoRecords,
    Failure { message: String },
}
