use crate::core::fetcher::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::core::projection::{FieldMapping, FieldProjection};
use crate::core::{ConfigProvider, ExportFormat, PageStrategy};
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const MAX_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub exports: Vec<ExportPreset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub page_size: Option<usize>,
    pub exhaustive: Option<bool>,
    pub max_pages: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_output_path() -> String {
    "./exports".to_string()
}

/// 一個具名的匯出設定，對應前端的一個匯出按鈕
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPreset {
    pub name: String,
    pub resource: String,
    pub file_name: String,
    pub title: Option<String>,
    pub format: Option<ExportFormat>,
    pub headers: Option<Vec<String>>,
    pub uppercase_labels: Option<bool>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

impl ExportPreset {
    pub fn projection(&self) -> FieldProjection {
        FieldProjection::new(self.fields.clone())
            .uppercase_labels(self.uppercase_labels.unwrap_or(false))
    }
}

impl TomlConfig {
    /// Config with only an API base URL, used when no file is given.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                token: None,
                timeout_seconds: None,
            },
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
            exports: Vec::new(),
        }
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${EXPORT_API_TOKEN})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
            ExportError::ConfigValidationError {
                field: "environment".to_string(),
                message: e.to_string(),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn preset(&self, name: &str) -> Result<&ExportPreset> {
        self.exports
            .iter()
            .find(|preset| preset.name == name)
            .ok_or_else(|| ExportError::UnknownPresetError {
                name: name.to_string(),
            })
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("api.base_url", &self.api.base_url)?;
        validation::validate_path("output.path", &self.output.path)?;

        if let Some(page_size) = self.fetch.page_size {
            validation::validate_range("fetch.page_size", page_size, 1, MAX_PAGE_SIZE)?;
        }
        if let Some(max_pages) = self.fetch.max_pages {
            validation::validate_range("fetch.max_pages", max_pages, 1, usize::MAX)?;
        }

        let mut names = HashSet::new();
        for (index, preset) in self.exports.iter().enumerate() {
            let prefix = format!("exports[{}]", index);
            validation::validate_non_empty_string(&format!("{}.name", prefix), &preset.name)?;
            validation::validate_non_empty_string(
                &format!("{}.resource", prefix),
                &preset.resource,
            )?;
            validation::validate_file_name(&format!("{}.file_name", prefix), &preset.file_name)?;

            if !names.insert(preset.name.as_str()) {
                return Err(ExportError::InvalidConfigValueError {
                    field: format!("{}.name", prefix),
                    value: preset.name.clone(),
                    reason: "Duplicate preset name".to_string(),
                });
            }

            preset.projection().validate()?;

            if preset.format == Some(ExportFormat::Pdf) {
                let title = validation::validate_required_field(
                    &format!("{}.title", prefix),
                    &preset.title,
                )?;
                validation::validate_non_empty_string(&format!("{}.title", prefix), title)?;
            }
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn api_base_url(&self) -> &str {
        &self.api.base_url
    }

    fn api_token(&self) -> Option<&str> {
        // 未替換的 ${VAR} 視為沒有 token
        self.api
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty() && !token.starts_with("${"))
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn page_size(&self) -> usize {
        self.fetch.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn page_strategy(&self) -> PageStrategy {
        if self.fetch.exhaustive.unwrap_or(false) {
            PageStrategy::Exhaustive {
                max_pages: self.fetch.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            }
        } else {
            PageStrategy::Capped
        }
    }

    fn timeout_seconds(&self) -> Option<u64> {
        self.api.timeout_seconds
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
