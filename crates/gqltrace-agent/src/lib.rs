//! # gqltrace-agent
//!
//! GraphQL 트레이스 리포팅 에이전트.
//! 스키마별 리포트 버퍼, 크기/주기 기반 플러시, 시그니처 캐시,
//! 종료 시그널 처리, 스키마 리포팅 핸드오프를 묶는다.
//!
//! 전송은 `gqltrace-core`의 `ReportSender` 포트를 통해 이루어지며,
//! 기본 구현은 `gqltrace-network`의 HTTP 전송기다.

pub mod agent;
pub mod config_loader;
pub mod header;
pub mod lifecycle;
pub mod report_buffer;
pub mod scheduler;
pub mod schema_reporting;
pub mod signature_cache;

pub use agent::{AddTraceRequest, AgentStats, ErrorHook, TraceAgent, TraceAgentBuilder};
