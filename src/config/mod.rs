pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use args::CliConfig;

#[cfg(feature = "cli")]
mod args {
    use super::toml_config::TomlConfig;
    use crate::core::projection::{FieldMapping, FieldProjection};
    use crate::core::ExportFormat;
    use crate::domain::model::ExportJob;
    use crate::utils::error::{ExportError, Result};
    use crate::utils::validation::Validate;
    use clap::Parser;

    #[derive(Debug, Clone, Default, Parser)]
    #[command(name = "market-export")]
    #[command(about = "Export marketplace collections to xlsx, csv, xml, pdf or json")]
    pub struct CliConfig {
        /// Path to a TOML configuration file with [[exports]] presets
        #[arg(short, long)]
        pub config: Option<String>,

        /// Name of the preset to run
        #[arg(short, long)]
        pub preset: Option<String>,

        #[arg(long, help = "API base URL, e.g. https://localhost:7185/api")]
        pub base_url: Option<String>,

        #[arg(long, help = "Resource path, e.g. /curso/publicos")]
        pub resource: Option<String>,

        #[arg(short, long, value_enum)]
        pub format: Option<ExportFormat>,

        #[arg(long, help = "Output file name without extension")]
        pub output_name: Option<String>,

        #[arg(long, help = "Report title (required for pdf)")]
        pub title: Option<String>,

        #[arg(long = "header", help = "PDF column label, repeat per column")]
        pub headers: Vec<String>,

        #[arg(long = "field", help = "Field mapping source=Label, repeat per column")]
        pub fields: Vec<String>,

        #[arg(long, help = "Uppercase every output column name")]
        pub uppercase_headers: bool,

        #[arg(long)]
        pub output_path: Option<String>,

        #[arg(long, help = "Bearer token for the API")]
        pub token: Option<String>,

        #[arg(long)]
        pub page_size: Option<usize>,

        #[arg(long, help = "Follow pages until a short page instead of one capped request")]
        pub exhaustive: bool,

        #[arg(long)]
        pub max_pages: Option<usize>,

        #[arg(long, help = "Request timeout in seconds")]
        pub timeout: Option<u64>,

        #[arg(long, help = "List presets of the config file and exit")]
        pub list_presets: bool,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON")]
        pub log_json: bool,

        /// Dry run - show what would be exported without calling the API
        #[arg(long)]
        pub dry_run: bool,
    }

    impl CliConfig {
        pub fn load_config(&self) -> Result<TomlConfig> {
            let mut config = match (&self.config, &self.base_url) {
                (Some(path), _) => TomlConfig::from_file(path)?,
                (None, Some(base_url)) => TomlConfig::new(base_url.clone()),
                (None, None) => {
                    return Err(ExportError::MissingConfigError {
                        field: "--config or --base-url".to_string(),
                    })
                }
            };
            self.apply_overrides(&mut config);
            config.validate()?;
            Ok(config)
        }

        /// 命令列參數覆蓋設定檔
        pub fn apply_overrides(&self, config: &mut TomlConfig) {
            if let Some(base_url) = &self.base_url {
                config.api.base_url = base_url.clone();
            }
            if let Some(token) = &self.token {
                config.api.token = Some(token.clone());
            }
            if let Some(timeout) = self.timeout {
                config.api.timeout_seconds = Some(timeout);
            }
            if let Some(page_size) = self.page_size {
                config.fetch.page_size = Some(page_size);
            }
            if self.exhaustive {
                config.fetch.exhaustive = Some(true);
            }
            if let Some(max_pages) = self.max_pages {
                config.fetch.max_pages = Some(max_pages);
            }
            if let Some(output_path) = &self.output_path {
                config.output.path = output_path.clone();
            }
        }

        /// Builds the job from the selected preset with command line flags on top.
        pub fn build_job(&self, config: &TomlConfig) -> Result<ExportJob> {
            let preset = match &self.preset {
                Some(name) => Some(config.preset(name)?),
                None => None,
            };

            let resource = self
                .resource
                .clone()
                .or_else(|| preset.map(|p| p.resource.clone()))
                .ok_or_else(|| ExportError::MissingConfigError {
                    field: "resource".to_string(),
                })?;
            let format = self
                .format
                .or_else(|| preset.and_then(|p| p.format))
                .ok_or_else(|| ExportError::MissingConfigError {
                    field: "format".to_string(),
                })?;
            let output_name = self
                .output_name
                .clone()
                .or_else(|| preset.map(|p| p.file_name.clone()))
                .unwrap_or_else(|| default_output_name(&resource));

            let projection = if self.fields.is_empty() {
                preset
                    .map(|p| p.projection())
                    .unwrap_or_default()
                    .uppercase_labels(
                        self.uppercase_headers
                            || preset.and_then(|p| p.uppercase_labels).unwrap_or(false),
                    )
            } else {
                let fields = self.fields.iter().map(|f| FieldMapping::parse(f)).collect();
                FieldProjection::new(fields).uppercase_labels(self.uppercase_headers)
            };

            projection.validate()?;

            let mut job = ExportJob::new(resource, output_name, format);
            if !projection.is_identity() {
                job = job.with_shared_projection(projection.into_projection());
            }
            if let Some(title) = self.title.clone().or_else(|| preset.and_then(|p| p.title.clone())) {
                job = job.with_title(title);
            }
            let headers = if self.headers.is_empty() {
                preset.and_then(|p| p.headers.clone())
            } else {
                Some(self.headers.clone())
            };
            if let Some(headers) = headers {
                job = job.with_headers(headers);
            }

            job.validate()?;
            Ok(job)
        }
    }

    /// `/curso/publicos?x=1` -> `publicos`
    pub fn default_output_name(resource: &str) -> String {
        let path = resource.split(['?', '#']).next().unwrap_or_default();
        let segment: String = path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or_default()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();

        if segment.is_empty() {
            "export".to_string()
        } else {
            segment
        }
    }

}
