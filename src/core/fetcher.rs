use crate::core::{ConfigProvider, PageStrategy, Record, RecordSource};
use crate::domain::model::ResponseShape;
use crate::utils::error::{ExportError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Page size requested from the backend. Collections larger than this are
/// truncated in `PageStrategy::Capped` mode.
pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_MAX_PAGES: usize = 100;

pub struct HttpRecordSource {
    client: Client,
    base_url: String,
    token: Option<String>,
    page_size: usize,
    strategy: PageStrategy,
}

impl HttpRecordSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: None,
            page_size: DEFAULT_PAGE_SIZE,
            strategy: PageStrategy::Capped,
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_seconds() {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.api_base_url().to_string(),
            token: config.api_token().map(str::to_string),
            page_size: config.page_size(),
            strategy: config.page_strategy(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_strategy(mut self, strategy: PageStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn page_url(&self, resource_path: &str, page: usize) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            resource_path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &self.page_size.to_string());
        Ok(url)
    }

    async fn fetch_page(&self, resource_path: &str, page: usize) -> Result<Vec<Record>> {
        let url = self.page_url(resource_path, page)?;

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!("📡 Making API request to: {}", url);
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("📡 API response status: {}", status);

        if !status.is_success() {
            return Err(ExportError::HttpStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let shape = ResponseShape::from_body(body)?;
        tracing::debug!("📦 Response shape: {}", shape.name());

        shape.into_records()
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_all(&self, resource_path: &str) -> Result<Vec<Record>> {
        match self.strategy {
            PageStrategy::Capped => {
                let records = self.fetch_page(resource_path, 1).await?;
                if records.len() >= self.page_size {
                    tracing::warn!(
                        "⚠️ {} returned a full page of {} records, the export may be truncated",
                        resource_path,
                        self.page_size
                    );
                }
                tracing::info!("📡 Fetched {} records from {}", records.len(), resource_path);
                Ok(records)
            }
            PageStrategy::Exhaustive { max_pages } => {
                let mut records: Vec<Record> = Vec::new();
                let mut previous: Option<Vec<Record>> = None;

                for page in 1..=max_pages.max(1) {
                    let batch = self.fetch_page(resource_path, page).await?;

                    // 伺服器忽略分頁參數時會回傳整份清單
                    if batch.len() > self.page_size {
                        tracing::warn!(
                            "⚠️ {} returned {} records for pageSize={}, paging is ignored",
                            resource_path,
                            batch.len(),
                            self.page_size
                        );
                        if records.is_empty() {
                            records = batch;
                        }
                        break;
                    }
                    if !batch.is_empty() && previous.as_ref() == Some(&batch) {
                        tracing::warn!(
                            "⚠️ {} returned the same records for page {} and {}, stopping",
                            resource_path,
                            page - 1,
                            page
                        );
                        break;
                    }

                    let short_page = batch.len() < self.page_size;
                    records.extend_from_slice(&batch);
                    previous = Some(batch);

                    if short_page {
                        break;
                    }
                    if page == max_pages {
                        tracing::warn!(
                            "⚠️ Stopped {} after {} pages, more records may exist",
                            resource_path,
                            max_pages
                        );
                    }
                }
                tracing::info!("📡 Fetched {} records from {}", records.len(), resource_path);
                Ok(records)
            }
        }
    }
}
