use crate::domain::model::{Notice, Record};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Where finished export files end up.
pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// 取得某資源的全部記錄（受單頁上限限制）
    async fn fetch_all(&self, resource_path: &str) -> Result<Vec<Record>>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// How many pages the fetcher asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStrategy {
    /// One request for page 1; larger collections are truncated.
    Capped,
    /// Keep requesting until a short page or `max_pages`.
    Exhaustive { max_pages: usize },
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn api_token(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn page_size(&self) -> usize;
    fn page_strategy(&self) -> PageStrategy;
    fn timeout_seconds(&self) -> Option<u64>;
}
