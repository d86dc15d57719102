//! 레지스트리 페이지네이터
//!
//! 1페이지 요청으로 전체 페이지 수를 알아낸 뒤, 나머지 페이지(2..=pages)는
//! 스케줄러가 다운로드 작업과 같은 토큰 풀을 사용하여 병렬로 요청합니다.
//! 1페이지의 플러그인은 정보 조회 응답에서 그대로 사용하므로
//! 각 페이지는 정확히 한 번씩만 요청됩니다.

use std::ops::RangeInclusive;
use std::sync::Arc;

use tracing::debug;

use crate::error::PluginScannerError;
use crate::fetcher::HttpFetcher;

use super::plugin::RegistryPage;

/// 레지스트리 페이지 조회기
#[derive(Debug, Clone)]
pub struct RegistryPaginator {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
    per_page: u32,
}

impl RegistryPaginator {
    /// 새 페이지네이터를 생성합니다.
    pub fn new(fetcher: Arc<HttpFetcher>, base_url: impl Into<String>, per_page: u32) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            per_page,
        }
    }

    /// `n`번째 페이지 URL
    pub fn page_url(&self, page: u32) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{sep}action=query_plugins&request[per_page]={}&request[page]={page}",
            self.base_url, self.per_page
        )
    }

    /// 1페이지를 조회하여 페이지네이션 정보와 1페이지 플러그인을 반환합니다.
    pub async fn fetch_info(&self) -> Result<RegistryPage, PluginScannerError> {
        let page = self.fetch_page(1).await?;
        debug!(
            pages = page.info.pages,
            results = page.info.results,
            "registry info fetched"
        );
        Ok(page)
    }

    /// 페이지 하나를 조회하고 디코딩합니다.
    pub async fn fetch_page(&self, page: u32) -> Result<RegistryPage, PluginScannerError> {
        let url = self.page_url(page);
        let body = self.fetcher.get(&url).await?;
        decode_page(&url, &body)
    }

    /// 정보 조회 이후 요청해야 할 페이지 범위
    pub fn remaining_pages(pages: u32) -> RangeInclusive<u32> {
        2..=pages
    }
}

/// 레지스트리 페이지 JSON을 디코딩합니다.
pub fn decode_page(url: &str, body: &[u8]) -> Result<RegistryPage, PluginScannerError> {
    serde_json::from_slice(body).map_err(|e| PluginScannerError::Decode {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}
