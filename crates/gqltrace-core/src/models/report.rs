//! 리포트 모델.
//!
//! 스키마 변형 하나에 대해 플러시 사이에 쌓인 트레이스 묶음.
//! `traces_per_query`의 값은 이미 직렬화된 트레이스 바이트열이다.

use prost::Message;
use prost_types::Timestamp;
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::models::trace::Trace;

/// 통계 리포트 키 생성: `"# {operationName 또는 '-'}\n{signature}"`
pub fn stats_report_key(operation_name: Option<&str>, signature: &str) -> String {
    let name = operation_name.filter(|n| !n.is_empty()).unwrap_or("-");
    format!("# {name}\n{signature}")
}

/// 리포트 헤더 — 스키마 변형 식별 정보 + 호스트 메타데이터
#[derive(Clone, PartialEq, Eq, Message)]
pub struct ReportHeader {
    /// 호스트 이름
    #[prost(string, tag = "5")]
    pub hostname: String,
    /// 에이전트 버전 (예: "gqltrace-agent@0.1.0")
    #[prost(string, tag = "6")]
    pub agent_version: String,
    /// 런타임 버전
    #[prost(string, tag = "8")]
    pub runtime_version: String,
    /// 플랫폼 기술자 (OS, 커널, 아키텍처)
    #[prost(string, tag = "9")]
    pub uname: String,
    /// 스키마 변형 이름
    #[prost(string, tag = "10")]
    pub schema_tag: String,
    /// 정규화된 스키마의 콘텐츠 해시
    #[prost(string, tag = "11")]
    pub schema_hash: String,
}

/// 같은 키를 공유하는 직렬화된 트레이스 목록
///
/// 필드 1은 `repeated Trace`와 와이어 호환된다 (length-delimited).
#[derive(Clone, PartialEq, Message)]
pub struct TracesAndStats {
    /// 직렬화된 트레이스 (추가 순서 유지)
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub trace: Vec<Vec<u8>>,
}

/// 스키마 변형 하나의 리포트
#[derive(Clone, PartialEq, Message)]
pub struct Report {
    /// 리포트 헤더
    #[prost(message, optional, tag = "1")]
    pub header: Option<ReportHeader>,
    /// 전송 시각 (전송 직전에 채움)
    #[prost(message, optional, tag = "2")]
    pub end_time: Option<Timestamp>,
    /// statsReportKey → 트레이스 목록
    #[prost(btree_map = "string, message", tag = "5")]
    pub traces_per_query: BTreeMap<String, TracesAndStats>,
}

impl Report {
    /// 헤더를 가진 빈 리포트 생성
    pub fn new(header: ReportHeader) -> Self {
        Self {
            header: Some(header),
            end_time: None,
            traces_per_query: BTreeMap::new(),
        }
    }

    /// 키에 직렬화된 트레이스 추가
    pub fn append(&mut self, key: String, encoded_trace: Vec<u8>) {
        self.traces_per_query
            .entry(key)
            .or_default()
            .trace
            .push(encoded_trace);
    }

    /// 쿼리 키가 하나도 없는지
    pub fn is_empty(&self) -> bool {
        self.traces_per_query.is_empty()
    }

    /// 전체 트레이스 수
    pub fn trace_count(&self) -> usize {
        self.traces_per_query.values().map(|t| t.trace.len()).sum()
    }

    /// 스키마 ID (헤더가 없으면 빈 문자열)
    pub fn schema_id(&self) -> &str {
        self.header
            .as_ref()
            .map(|h| h.schema_hash.as_str())
            .unwrap_or("")
    }

    /// 구조 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        let header = self
            .header
            .as_ref()
            .ok_or_else(|| CoreError::Encoding("report.header 누락".to_string()))?;
        if header.schema_hash.is_empty() {
            return Err(CoreError::Encoding(
                "report.header.schema_hash가 비어 있음".to_string(),
            ));
        }
        for (key, traces) in &self.traces_per_query {
            if !key.starts_with("# ") || !key.contains('\n') {
                return Err(CoreError::Encoding(format!(
                    "잘못된 statsReportKey: {key:?}"
                )));
            }
            if traces.trace.iter().any(Vec::is_empty) {
                return Err(CoreError::Encoding(format!(
                    "빈 트레이스 페이로드: {key:?}"
                )));
            }
        }
        Ok(())
    }

    /// 검증 후 와이어 포맷으로 직렬화
    pub fn encode_validated(&self) -> Result<Vec<u8>, CoreError> {
        self.validate()?;
        Ok(self.encode_to_vec())
    }

    /// 디버그 출력용 JSON 표현
    ///
    /// 키마다 직렬화된 트레이스를 다시 디코딩해 본문을 보여준다.
    /// 디코딩할 수 없는 트레이스는 바이트 길이만 남긴다.
    pub fn to_debug_json(&self) -> serde_json::Value {
        let header = self.header.as_ref().map(|h| {
            serde_json::json!({
                "hostname": h.hostname,
                "agentVersion": h.agent_version,
                "runtimeVersion": h.runtime_version,
                "uname": h.uname,
                "schemaTag": h.schema_tag,
                "schemaHash": h.schema_hash,
            })
        });
        let traces: serde_json::Map<String, serde_json::Value> = self
            .traces_per_query
            .iter()
            .map(|(key, traces)| {
                let decoded: Vec<serde_json::Value> =
                    traces.trace.iter().map(|bytes| trace_debug_json(bytes)).collect();
                (key.clone(), serde_json::json!({ "trace": decoded }))
            })
            .collect();
        serde_json::json!({
            "header": header,
            "endTime": self.end_time.as_ref().map(|t| t.to_string()),
            "tracesPerQuery": traces,
        })
    }
}

/// 직렬화된 트레이스 하나의 디버그 표현
fn trace_debug_json(bytes: &[u8]) -> serde_json::Value {
    match Trace::decode(bytes) {
        Ok(trace) => serde_json::json!({
            "startTime": trace.start_time.as_ref().map(|t| t.to_string()),
            "endTime": trace.end_time.as_ref().map(|t| t.to_string()),
            "durationNs": trace.duration_ns,
            "clientName": trace.client_name,
            "clientVersion": trace.client_version,
            "http": trace.http.as_ref().map(|h| serde_json::json!({
                "method": h.method,
                "statusCode": h.status_code,
            })),
            "root": trace.root.as_ref().map(|root| format!("{root:?}")),
            "fullQueryCacheHit": trace.full_query_cache_hit,
        }),
        Err(e) => serde_json::json!({
            "undecodable": e.to_string(),
            "bytes": bytes.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> ReportHeader {
        ReportHeader {
            hostname: "host-1".to_string(),
            agent_version: "gqltrace-agent@0.1.0".to_string(),
            schema_tag: "current".to_string(),
            schema_hash: "s1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn key_uses_dash_for_missing_operation_name() {
        assert_eq!(stats_report_key(Some("GetUser"), "{getUser{id}}"), "# GetUser\n{getUser{id}}");
        assert_eq!(stats_report_key(None, "{a}"), "# -\n{a}");
        assert_eq!(stats_report_key(Some(""), "{a}"), "# -\n{a}");
    }

    #[test]
    fn append_groups_by_key_in_order() {
        let mut report = Report::new(header());
        report.append("# A\nq".to_string(), vec![1]);
        report.append("# B\nq".to_string(), vec![2]);
        report.append("# A\nq".to_string(), vec![3]);

        assert_eq!(report.trace_count(), 3);
        assert_eq!(report.traces_per_query["# A\nq"].trace, vec![vec![1], vec![3]]);
        assert_eq!(report.traces_per_query["# B\nq"].trace, vec![vec![2]]);
        assert_eq!(report.schema_id(), "s1");
    }

    #[test]
    fn validate_requires_header() {
        let report = Report::default();
        assert!(matches!(report.validate(), Err(CoreError::Encoding(_))));
    }

    #[test]
    fn validate_rejects_malformed_key() {
        let mut report = Report::new(header());
        report.append("no-prefix".to_string(), vec![1]);
        assert!(matches!(report.encode_validated(), Err(CoreError::Encoding(_))));
    }

    #[test]
    fn validate_rejects_empty_payload() {
        let mut report = Report::new(header());
        report.append("# A\nq".to_string(), Vec::new());
        assert!(report.validate().is_err());
    }

    #[test]
    fn encoded_report_decodes_back() {
        let mut report = Report::new(header());
        report.append("# A\nq".to_string(), vec![8, 1]);
        let bytes = report.encode_validated().unwrap();
        let decoded = Report::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn debug_json_shows_decoded_traces() {
        use crate::models::trace::trace::Http;
        use chrono::{TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut trace = Trace::new(start, start + chrono::Duration::milliseconds(7));
        trace.client_name = "web".to_string();
        trace.http = Some(Http {
            method: "POST".to_string(),
            status_code: 200,
        });

        let mut report = Report::new(header());
        report.append("# A\nq".to_string(), trace.encode_to_vec());
        report.append("# A\nq".to_string(), vec![0xff]);
        let json = report.to_debug_json();

        assert_eq!(json["header"]["schemaHash"], "s1");
        let traces = &json["tracesPerQuery"]["# A\nq"]["trace"];
        assert_eq!(traces.as_array().unwrap().len(), 2);
        assert_eq!(traces[0]["durationNs"], 7_000_000);
        assert_eq!(traces[0]["clientName"], "web");
        assert_eq!(traces[0]["http"]["statusCode"], 200);
        assert!(traces[0]["root"].is_null());
        assert_eq!(traces[1]["bytes"], 1);
        assert!(traces[1]["undecodable"].is_string());
    }
}
