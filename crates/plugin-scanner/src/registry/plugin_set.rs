//! 플러그인 집합 -- 처리 대기 중인 레코드와 페이지네이션 상태
//!
//! 모든 변경은 하나의 `tokio::sync::Mutex` 아래에서 일어납니다.
//! 선택과 제거는 한 번의 락 획득 안에서 수행되므로 두 작업이 같은 레코드를
//! 받는 일은 없습니다.
//!
//! 제거는 `swap_remove`로 O(1)이며 순서는 보존되지 않습니다.

use rand::Rng;
use tokio::sync::Mutex;

use super::plugin::{PluginRecord, RegistryInfo};

/// 다음에 처리할 레코드를 고르는 정책
pub trait PickPolicy: Send + Sync {
    /// `0..len` 범위의 인덱스를 반환합니다. `len`은 항상 1 이상입니다.
    fn pick_index(&self, len: usize) -> usize;
}

/// 균등 분포 무작위 선택 (레지스트리 정렬 순서의 편향 방지)
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPick;

impl PickPolicy for RandomPick {
    fn pick_index(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// 항상 마지막 레코드를 선택 (결정적, 테스트용)
#[derive(Debug, Clone, Copy, Default)]
pub struct LastPick;

impl PickPolicy for LastPick {
    fn pick_index(&self, len: usize) -> usize {
        len - 1
    }
}

/// 페이지네이션 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// 가장 최근에 완료된 페이지 번호
    pub page: u32,
    /// 전체 페이지 수 (정보 조회 전에는 0)
    pub pages: u32,
    /// 레지스트리가 보고한 전체 플러그인 수
    pub results: u64,
    /// 완료(성공 또는 실패)된 페이지 수
    pub settled: u32,
    /// 실패한 페이지 수
    pub failed: u32,
    /// 레지스트리 정보 수신 여부
    pub info_known: bool,
}

impl PaginationState {
    /// 모든 페이지 요청이 끝났는지 여부
    pub fn is_finished(&self) -> bool {
        self.info_known && self.settled >= self.pages
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: Vec<PluginRecord>,
    total_enqueued: u64,
    pagination: PaginationState,
}

/// 처리 대기 중인 플러그인 집합
pub struct PluginSet {
    inner: Mutex<Inner>,
    policy: Box<dyn PickPolicy>,
}

impl PluginSet {
    /// 주어진 선택 정책으로 빈 집합을 생성합니다.
    pub fn new(policy: Box<dyn PickPolicy>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    /// 레코드를 추가하고 추가된 수를 반환합니다.
    pub async fn merge(&self, records: Vec<PluginRecord>) -> usize {
        let added = records.len();
        let mut inner = self.inner.lock().await;
        inner.items.extend(records);
        inner.total_enqueued += added as u64;
        added
    }

    /// 인덱스로 레코드를 제거합니다 (swap-remove).
    ///
    /// 범위를 벗어나면 `None`을 반환합니다.
    pub async fn remove(&self, index: usize) -> Option<PluginRecord> {
        let mut inner = self.inner.lock().await;
        if index >= inner.items.len() {
            return None;
        }
        Some(inner.items.swap_remove(index))
    }

    /// 정책에 따라 레코드 하나를 선택하고 제거합니다.
    pub async fn pick(&self) -> Option<PluginRecord> {
        let mut inner = self.inner.lock().await;
        if inner.items.is_empty() {
            return None;
        }
        let len = inner.items.len();
        let index = self.policy.pick_index(len).min(len - 1);
        Some(inner.items.swap_remove(index))
    }

    /// 대기 중인 레코드 수
    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    /// 비어있는지 여부
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.items.is_empty()
    }

    /// 지금까지 추가된 전체 레코드 수
    pub async fn total_enqueued(&self) -> u64 {
        self.inner.lock().await.total_enqueued
    }

    /// 레지스트리 정보를 기록합니다.
    pub async fn set_info(&self, info: RegistryInfo) {
        let mut inner = self.inner.lock().await;
        inner.pagination.pages = info.pages;
        inner.pagination.results = info.results;
        inner.pagination.info_known = true;
    }

    /// 페이지 하나가 완료되었음을 기록합니다 (성공/실패 무관).
    pub async fn page_completed(&self, page: u32, succeeded: bool) {
        let mut inner = self.inner.lock().await;
        inner.pagination.settled += 1;
        if succeeded {
            inner.pagination.page = inner.pagination.page.max(page);
        } else {
            inner.pagination.failed += 1;
        }
    }

    /// 모든 페이지 요청이 끝났는지 여부
    pub async fn pagination_finished(&self) -> bool {
        self.inner.lock().await.pagination.is_finished()
    }

    /// 페이지네이션 상태
    pub async fn pagination(&self) -> PaginationState {
        self.inner.lock().await.pagination
    }

    /// 대기 수, 누적 추가 수, 페이지네이션 상태를 한 번에 읽습니다.
    pub async fn snapshot(&self) -> (usize, u64, PaginationState) {
        let inner = self.inner.lock().await;
        (inner.items.len(), inner.total_enqueued, inner.pagination)
    }
}

impl Default for PluginSet {
    fn default() -> Self {
        Self::new(Box::new(RandomPick))
    }
}

impl std::fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSet").finish_non_exhaustive()
    }
}
