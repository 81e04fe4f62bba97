//! 쿼리 시그니처 캐시.
//!
//! `(queryHash, operationName)` → 시그니처. 항목 수가 아니라 값의 직렬화
//! 크기 합계로 용량을 제한하고, 초과 시 LRU 순으로 제거한다.
//! 제거 경고는 60초에 한 번만 남긴다 (고유 연산이 계속 들어올 때 로그 폭주 방지).

use gqltrace_core::error::CoreError;
use gqltrace_core::ports::signature::QueryDocument;
use lru::LruCache;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 기본 용량 (3 MiB)
pub const DEFAULT_CAPACITY_BYTES: usize = 3 * 1024 * 1024;

/// 제거 경고 최소 간격
const EVICTION_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// 캐시 키: `queryHash` 또는 `queryHash:operationName`
pub fn cache_key(query_hash: &str, operation_name: Option<&str>) -> String {
    match operation_name.filter(|n| !n.is_empty()) {
        Some(name) => format!("{query_hash}:{name}"),
        None => query_hash.to_string(),
    }
}

/// 값의 직렬화 크기 (JSON 문자열 길이)
fn entry_size(value: &str) -> usize {
    serde_json::to_string(value)
        .map(|s| s.len())
        .unwrap_or(value.len() + 2)
}

struct CacheState {
    entries: LruCache<String, String>,
    total_bytes: usize,
    evictions_since_warn: u64,
    last_warn: Option<Instant>,
}

/// 크기 기반 LRU 시그니처 캐시
pub struct SignatureCache {
    state: Mutex<CacheState>,
    capacity_bytes: usize,
}

impl SignatureCache {
    /// 용량(바이트)을 지정해 생성
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                total_bytes: 0,
                evictions_since_warn: 0,
                last_warn: None,
            }),
            capacity_bytes,
        }
    }

    /// 캐시 조회 (적중 시 최근 사용으로 갱신)
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.lock().entries.get(key).cloned()
    }

    /// 값 저장, 용량 초과분은 LRU 순으로 제거
    pub fn insert(&self, key: String, value: String) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&self, key: String, value: String, now: Instant) {
        let size = entry_size(&value);
        if size > self.capacity_bytes {
            debug!("시그니처가 캐시 용량보다 큼 ({size} bytes), 캐시 생략");
            return;
        }

        let mut state = self.state.lock();
        if let Some(old) = state.entries.put(key, value) {
            state.total_bytes -= entry_size(&old);
        }
        state.total_bytes += size;

        let mut evicted = 0u64;
        while state.total_bytes > self.capacity_bytes {
            match state.entries.pop_lru() {
                Some((_, old)) => {
                    state.total_bytes -= entry_size(&old);
                    evicted += 1;
                }
                None => break,
            }
        }

        if evicted > 0 {
            state.evictions_since_warn += evicted;
            let due = state
                .last_warn
                .map_or(true, |last| now.duration_since(last) > EVICTION_WARN_INTERVAL);
            if due {
                warn!(
                    "시그니처 캐시 용량({} bytes) 초과로 마지막 경고 이후 {}개 항목 제거. 고유 연산이 많다면 용량을 늘리세요",
                    self.capacity_bytes, state.evictions_since_warn
                );
                state.evictions_since_warn = 0;
                state.last_warn = Some(now);
            }
        }
    }

    /// 시그니처 조회 또는 계산
    ///
    /// - 문서와 원문 모두 없으면 `CoreError::Signature`
    /// - 적중 시 캐시 값 반환 (`compute` 호출 안 함)
    /// - 미스 + 문서 없음: 원문을 그대로 반환하고 캐시하지 않음
    /// - 미스 + 문서 있음: `compute` 결과를 저장 후 반환
    pub fn get_or_compute<F>(
        &self,
        key: &str,
        document: Option<&QueryDocument>,
        source: Option<&str>,
        compute: F,
    ) -> Result<String, CoreError>
    where
        F: FnOnce(&QueryDocument) -> String,
    {
        let source = source.filter(|s| !s.is_empty());
        if document.is_none() && source.is_none() {
            return Err(CoreError::Signature(format!(
                "파싱된 문서와 쿼리 원문이 모두 없음 (key={key})"
            )));
        }

        if let Some(cached) = self.get(key) {
            return Ok(cached);
        }

        match document {
            None => Ok(source.unwrap_or_default().to_string()),
            Some(document) => {
                let signature = compute(document);
                self.insert(key.to_string(), signature.clone());
                Ok(signature)
            }
        }
    }

    /// 캐시 항목 수
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// 캐시가 비었는지
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 현재 사용 중인 크기 (바이트)
    pub fn total_bytes(&self) -> usize {
        self.state.lock().total_bytes
    }

    #[cfg(test)]
    fn pending_evictions(&self) -> u64 {
        self.state.lock().evictions_since_warn
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_BYTES)
    }
}
