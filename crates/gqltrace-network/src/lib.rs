//! # gqltrace-network
//!
//! 트레이스 수집 엔드포인트 어댑터.
//! 리포트를 protobuf로 직렬화하고 gzip으로 압축해 전송하며,
//! 연결 실패와 5xx 응답에 한해 지수 백오프로 재시도한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use gqltrace_network::ingress_client::HttpReportSender;
//!
//! let sender = HttpReportSender::from_config(&config, api_key)?;
//! ```

pub mod compression;
pub mod ingress_client;
