use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API responded with status {status} for {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unrecognized response shape: {description}")]
    UnrecognizedShapeError { description: String },

    #[error("Record {index} is not a JSON object")]
    MalformedRecordError { index: usize },

    #[error("Record {index} has fields [{found}], expected [{expected}]")]
    InconsistentRecordError {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("{format} encoding failed: {message}")]
    EncodeError { format: String, message: String },

    #[error("An export is already running on this control")]
    ExportInProgressError,

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Unknown export preset: {name}")]
    UnknownPresetError { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Encoding,
    Storage,
    Configuration,
    Concurrency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::ApiError(_) | ExportError::HttpStatusError { .. } => {
                ErrorCategory::Network
            }
            ExportError::UnrecognizedShapeError { .. }
            | ExportError::MalformedRecordError { .. }
            | ExportError::InconsistentRecordError { .. } => ErrorCategory::Data,
            ExportError::ZipError(_)
            | ExportError::CsvError(_)
            | ExportError::SerializationError(_)
            | ExportError::EncodeError { .. } => ErrorCategory::Encoding,
            ExportError::IoError(_) => ErrorCategory::Storage,
            ExportError::ExportInProgressError => ErrorCategory::Concurrency,
            ExportError::UrlError(_)
            | ExportError::ConfigValidationError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::MissingConfigError { .. }
            | ExportError::UnknownPresetError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ExportError::ExportInProgressError => ErrorSeverity::Low,
            ExportError::ApiError(_) => ErrorSeverity::Medium,
            ExportError::HttpStatusError { status, .. } if *status >= 500 => {
                ErrorSeverity::Medium
            }
            ExportError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ExportError::ApiError(_) => {
                "Check that the backend is reachable and retry the export".to_string()
            }
            ExportError::HttpStatusError { status: 401, .. }
            | ExportError::HttpStatusError { status: 403, .. } => {
                "The API token is missing or expired; sign in again and pass a fresh token"
                    .to_string()
            }
            ExportError::HttpStatusError { status, .. } if *status >= 500 => {
                "The backend failed; retry later".to_string()
            }
            ExportError::HttpStatusError { .. } => {
                "Check the resource path of the export".to_string()
            }
            ExportError::UrlError(_) => "Check api.base_url and the resource path".to_string(),
            ExportError::UnrecognizedShapeError { .. } | ExportError::MalformedRecordError { .. } => {
                "The endpoint does not return a record list; pick a list endpoint".to_string()
            }
            ExportError::InconsistentRecordError { .. } => {
                "Use a field mapping so every record has the same columns".to_string()
            }
            ExportError::ZipError(_)
            | ExportError::CsvError(_)
            | ExportError::SerializationError(_)
            | ExportError::EncodeError { .. } => {
                "Try another export format or check the exported fields".to_string()
            }
            ExportError::IoError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            ExportError::ExportInProgressError => {
                "Wait for the running export to finish".to_string()
            }
            ExportError::ConfigValidationError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::MissingConfigError { .. } => {
                "Fix the configuration value and run again".to_string()
            }
            ExportError::UnknownPresetError { .. } => {
                "List the [[exports]] entries of the config file and pick an existing name"
                    .to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Export failed while fetching data: {}", self),
            ErrorCategory::Data => format!("Export failed, unexpected data: {}", self),
            ErrorCategory::Encoding => format!("Export failed while building the file: {}", self),
            ErrorCategory::Storage => format!("Export failed while saving the file: {}", self),
            ErrorCategory::Configuration => format!("Export is misconfigured: {}", self),
            ErrorCategory::Concurrency => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
