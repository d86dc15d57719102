//! HTTP 페처 -- 레지스트리 페이지 조회와 아카이브 다운로드
//!
//! 하나의 공유 `reqwest::Client`를 사용합니다. 연결 리셋 계열 에러
//! (HTTP/2 GOAWAY 포함)가 관찰되면 클라이언트를 교체 대상으로 표시하고,
//! 다음 요청 직전에 새 클라이언트로 통째로 바꿉니다.
//! 같은 요청을 그 자리에서 재시도하지는 않습니다.
//!
//! 교체 중에도 이미 진행 중인 요청은 이전 클라이언트를 계속 사용합니다.

use std::error::Error as StdError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use metrics::counter;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use echidna_core::metrics as m;

use crate::config::PluginScannerConfig;
use crate::error::PluginScannerError;

/// 공유 HTTP 클라이언트
pub struct HttpFetcher {
    client: RwLock<reqwest::Client>,
    refresh_pending: AtomicBool,
    settings: ClientSettings,
}

#[derive(Debug, Clone)]
struct ClientSettings {
    user_agent: String,
    timeout: std::time::Duration,
    pool_max_idle_per_host: usize,
}

impl ClientSettings {
    fn build(&self) -> Result<reqwest::Client, PluginScannerError> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .map_err(|e| PluginScannerError::Config {
                field: "registry".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })
    }
}

impl HttpFetcher {
    /// 설정으로 페처를 생성합니다.
    pub fn new(config: &PluginScannerConfig) -> Result<Self, PluginScannerError> {
        let settings = ClientSettings {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            pool_max_idle_per_host: config.pool_max_idle_per_host,
        };
        let client = settings.build()?;
        Ok(Self {
            client: RwLock::new(client),
            refresh_pending: AtomicBool::new(false),
            settings,
        })
    }

    /// GET 요청의 응답 본문을 반환합니다.
    pub async fn get(&self, url: &str) -> Result<Bytes, PluginScannerError> {
        let response = self.send(url).await?;
        response.bytes().await.map_err(|e| self.transport_error(url, &e))
    }

    /// GET 응답 본문을 파일로 기록하고 기록한 바이트 수를 반환합니다.
    ///
    /// 실패하면 부분적으로 기록된 파일을 삭제합니다.
    pub async fn download(&self, url: &str, path: &Path) -> Result<u64, PluginScannerError> {
        let mut response = self.send(url).await?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| PluginScannerError::Io {
                path: path.display().to_string(),
                source: e,
            })?;

        let mut written: u64 = 0;
        let result: Result<(), PluginScannerError> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| self.transport_error(url, &e))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| PluginScannerError::Io {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| PluginScannerError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
        .await;

        drop(file);

        if let Err(e) = result {
            if let Err(rm) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %rm, "failed to remove partial download");
            }
            return Err(e);
        }

        Ok(written)
    }

    /// 교체가 예약되어 있으면 새 클라이언트로 교체합니다.
    ///
    /// 교체했으면 `true`를 반환합니다.
    pub async fn refresh_if_pending(&self) -> Result<bool, PluginScannerError> {
        if !self.refresh_pending.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let fresh = match self.settings.build() {
            Ok(c) => c,
            Err(e) => {
                // 다음 요청에서 다시 시도
                self.refresh_pending.store(true, Ordering::Release);
                return Err(e);
            }
        };
        *self.client.write().await = fresh;
        counter!(m::REGISTRY_CLIENT_REFRESHES_TOTAL).increment(1);
        info!("http client refreshed after connection reset");
        Ok(true)
    }

    /// 클라이언트 교체가 예약되어 있는지 여부
    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending.load(Ordering::Acquire)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, PluginScannerError> {
        if let Err(e) = self.refresh_if_pending().await {
            warn!(error = %e, "http client refresh failed, using current client");
        }

        let client = self.client.read().await.clone();
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PluginScannerError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    fn transport_error(&self, url: &str, err: &reqwest::Error) -> PluginScannerError {
        if is_connection_reset(err) && !self.refresh_pending.swap(true, Ordering::AcqRel) {
            warn!(url, error = %err, "connection reset, http client scheduled for refresh");
        }
        PluginScannerError::Http {
            url: url.to_owned(),
            reason: error_chain(err),
        }
    }
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("settings", &self.settings)
            .field("refresh_pending", &self.refresh_pending())
            .finish()
    }
}

/// 연결 리셋 계열 에러인지 판별합니다 (에러 source 체인 전체 검사).
pub fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("goaway") || text.contains("connection reset") {
            return true;
        }
        current = e.source();
    }
    false
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}
