//! 스키마별 리포트 버퍼.
//!
//! `schemaId`마다 살아 있는 리포트는 최대 하나. 추가(append)와
//! 분리-교체(detach)는 각각 하나의 임계 구역에서 끝나므로, 전송 중에 들어온
//! 트레이스는 새 리포트에 쌓이고 유실되거나 중복되지 않는다.

use gqltrace_core::models::report::{Report, ReportHeader};
use parking_lot::Mutex;
use std::collections::HashMap;

/// 스키마 하나의 누적 상태
struct SchemaBuffer {
    header: ReportHeader,
    report: Report,
    /// 직렬화된 트레이스 길이 + 키 길이의 합 (헤더/프레이밍 제외 추정치)
    size: usize,
}

impl SchemaBuffer {
    fn new(header: ReportHeader) -> Self {
        Self {
            report: Report::new(header.clone()),
            header,
            size: 0,
        }
    }
}

/// 버퍼 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// 버퍼가 만들어진 스키마 수
    pub schemas: usize,
    /// 전송 대기 중인 트레이스 수
    pub pending_traces: usize,
    /// 전송 대기 중인 추정 바이트
    pub pending_bytes: usize,
}

/// 스키마별 리포트 버퍼
#[derive(Default)]
pub struct ReportBuffer {
    schemas: Mutex<HashMap<String, SchemaBuffer>>,
}

impl ReportBuffer {
    /// 빈 버퍼 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 직렬화된 트레이스 추가, 추가 후 해당 스키마의 추정 크기 반환
    ///
    /// 처음 보는 `schema_id`면 `make_header`로 헤더를 만들어 버퍼를 생성한다.
    pub fn append<F>(&self, schema_id: &str, make_header: F, key: String, encoded_trace: Vec<u8>) -> usize
    where
        F: FnOnce() -> ReportHeader,
    {
        let added = encoded_trace.len() + key.len();
        let mut schemas = self.schemas.lock();
        let buffer = schemas
            .entry(schema_id.to_string())
            .or_insert_with(|| SchemaBuffer::new(make_header()));
        buffer.report.append(key, encoded_trace);
        buffer.size += added;
        buffer.size
    }

    /// 현재 리포트를 분리하고 같은 헤더의 빈 리포트로 교체
    ///
    /// I/O 전에 호출되는 유일한 동기화 지점. 모르는 스키마면 `None`.
    pub fn detach(&self, schema_id: &str) -> Option<Report> {
        let mut schemas = self.schemas.lock();
        let buffer = schemas.get_mut(schema_id)?;
        let fresh = Report::new(buffer.header.clone());
        buffer.size = 0;
        Some(std::mem::replace(&mut buffer.report, fresh))
    }

    /// 버퍼가 만들어진 모든 스키마 ID
    pub fn schema_ids(&self) -> Vec<String> {
        self.schemas.lock().keys().cloned().collect()
    }

    /// 버퍼 통계
    pub fn stats(&self) -> BufferStats {
        let schemas = self.schemas.lock();
        BufferStats {
            schemas: schemas.len(),
            pending_traces: schemas.values().map(|b| b.report.trace_count()).sum(),
            pending_bytes: schemas.values().map(|b| b.size).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn header(schema_id: &str) -> ReportHeader {
        ReportHeader {
            schema_hash: schema_id.to_string(),
            schema_tag: "current".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn append_tracks_size() {
        let buffer = ReportBuffer::new();
        let size = buffer.append("s1", || header("s1"), "# A\nq".to_string(), vec![0; 10]);
        assert_eq!(size, 10 + 5);
        let size = buffer.append("s1", || unreachable!(), "# A\nq".to_string(), vec![0; 3]);
        assert_eq!(size, 15 + 3 + 5);
        assert_eq!(
            buffer.stats(),
            BufferStats {
                schemas: 1,
                pending_traces: 2,
                pending_bytes: 23,
            }
        );
    }

    #[test]
    fn detach_resets_report_and_size_keeping_header() {
        let buffer = ReportBuffer::new();
        buffer.append("s1", || header("s1"), "# A\nq".to_string(), vec![1]);
        buffer.append("s1", || header("s1"), "# B\nq".to_string(), vec![2]);
        buffer.append("s1", || header("s1"), "# A\nq".to_string(), vec![3]);

        let report = buffer.detach("s1").unwrap();
        assert_eq!(report.trace_count(), 3);
        assert_eq!(report.traces_per_query["# A\nq"].trace, vec![vec![1], vec![3]]);
        assert_eq!(report.header, Some(header("s1")));

        assert_eq!(buffer.stats().pending_bytes, 0);
        let empty = buffer.detach("s1").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.header, Some(header("s1")));
    }

    #[test]
    fn detach_unknown_schema() {
        let buffer = ReportBuffer::new();
        assert!(buffer.detach("nope").is_none());
    }

    #[test]
    fn schemas_are_isolated() {
        let buffer = ReportBuffer::new();
        buffer.append("s1", || header("s1"), "# A\nq".to_string(), vec![1]);
        buffer.append("s2", || header("s2"), "# A\nq".to_string(), vec![2, 2]);

        let mut ids = buffer.schema_ids();
        ids.sort();
        assert_eq!(ids, vec!["s1", "s2"]);

        let r1 = buffer.detach("s1").unwrap();
        assert_eq!(r1.schema_id(), "s1");
        assert_eq!(buffer.stats().pending_traces, 1);
        let r2 = buffer.detach("s2").unwrap();
        assert_eq!(r2.header.as_ref().unwrap().schema_hash, "s2");
        assert_eq!(r2.trace_count(), 1);
    }

    #[test]
    fn concurrent_append_and_detach_lose_nothing() {
        let buffer = Arc::new(ReportBuffer::new());
        let mut handles = vec![];
        for t in 0..8u8 {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for i in 0..100u8 {
                    buffer.append("s1", || header("s1"), "# A\nq".to_string(), vec![t, i]);
                }
            }));
        }

        let mut detached = 0;
        for _ in 0..20 {
            detached += buffer.detach("s1").map(|r| r.trace_count()).unwrap_or(0);
        }
        for h in handles {
            h.join().unwrap();
        }
        detached += buffer.detach("s1").map(|r| r.trace_count()).unwrap_or(0);

        assert_eq!(detached, 800);
        assert_eq!(buffer.stats().pending_traces, 0);
    }
}
