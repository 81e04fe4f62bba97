//! # gqltrace-core
//!
//! gqltrace 도메인 모델, 포트(trait) 정의, 에러 타입, 설정.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 트레이스/리포트 protobuf 메시지, 서버 정보
//! - [`ports`] — 전송/압축/스키마 리포팅/시그널/시그니처 포트 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 에이전트 설정 구조체

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::report::{stats_report_key, Report, ReportHeader};
    use crate::models::trace::Trace;

    #[test]
    fn trace_bytes_embed_in_report() {
        let now = chrono::Utc::now();
        let encoded = Trace::new(now, now).encode_validated().unwrap();

        let mut report = Report::new(ReportHeader {
            schema_hash: "abc".to_string(),
            ..Default::default()
        });
        report.append(stats_report_key(Some("Q"), "{a}"), encoded.clone());

        assert!(report.validate().is_ok());
        assert_eq!(report.traces_per_query["# Q\n{a}"].trace[0], encoded);
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AgentConfig::default_config();
        assert_eq!(config.report_interval_ms, 10_000);
        assert_eq!(config.minimum_retry_delay_ms, 100);
        assert_eq!(config.graph_variant, "current");
    }
}
