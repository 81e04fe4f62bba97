//! 트레이스 기록 재생.
//!
//! 한 줄에 JSON 객체 하나(NDJSON). 예:
//! `{"schemaId":"s1","operationName":"GetUser","source":"{getUser{id}}","durationMs":12.5}`

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use gqltrace_agent::AddTraceRequest;
use gqltrace_core::models::trace::{trace::Http, Trace};
use gqltrace_core::ports::signature::QueryDocument;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// 트레이스 기록 한 줄
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    /// 실행 스키마 ID (없으면 `--schema`로 계산한 ID)
    #[serde(default)]
    pub schema_id: Option<String>,
    #[serde(default)]
    pub operation_name: Option<String>,
    /// 쿼리 해시 (없으면 쿼리 텍스트의 SHA-256)
    #[serde(default)]
    pub query_hash: Option<String>,
    /// 쿼리 원문
    #[serde(default)]
    pub source: Option<String>,
    /// 파싱/출력된 문서
    #[serde(default)]
    pub document: Option<String>,
    /// 시작 시각 (없으면 종료 시각 = 현재)
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub http_status: Option<u32>,
}

/// 한 줄 파싱
pub fn parse_record(line: &str) -> Result<TraceRecord> {
    Ok(serde_json::from_str(line)?)
}

fn sha256_hex(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl TraceRecord {
    /// 에이전트 요청으로 변환
    pub fn into_request(self, default_schema_id: Option<&str>) -> Result<AddTraceRequest> {
        let schema_id = self
            .schema_id
            .filter(|id| !id.is_empty())
            .or_else(|| default_schema_id.map(str::to_string))
            .ok_or_else(|| anyhow!("schemaId가 없고 --schema도 지정되지 않음"))?;

        let query_text = self.document.as_deref().or(self.source.as_deref());
        let query_hash = match (self.query_hash, query_text) {
            (Some(hash), _) if !hash.is_empty() => hash,
            (_, Some(text)) => sha256_hex(text),
            _ => return Err(anyhow!("queryHash와 쿼리 텍스트가 모두 없음")),
        };

        if !self.duration_ms.is_finite() || self.duration_ms < 0.0 {
            return Err(anyhow!("잘못된 durationMs: {}", self.duration_ms));
        }
        let duration = Duration::microseconds((self.duration_ms * 1_000.0).round() as i64);
        let (start, end) = match self.start_time {
            Some(start) => (start, start + duration),
            None => {
                let end = Utc::now();
                (end - duration, end)
            }
        };

        let mut trace = Trace::new(start, end);
        trace.client_name = self.client_name.unwrap_or_default();
        trace.client_version = self.client_version.unwrap_or_default();
        if self.http_method.is_some() || self.http_status.is_some() {
            trace.http = Some(Http {
                method: self.http_method.unwrap_or_default(),
                status_code: self.http_status.unwrap_or_default(),
            });
        }

        let mut request = AddTraceRequest::new(schema_id, query_hash, trace);
        if let Some(name) = self.operation_name.filter(|n| !n.is_empty()) {
            request = request.with_operation_name(name);
        }
        if let Some(document) = self.document {
            request = request.with_document(QueryDocument::new(document));
        }
        if let Some(source) = self.source {
            request = request.with_source(source);
        }
        Ok(request)
    }
}
