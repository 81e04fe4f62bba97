//! gqltrace 도메인 모델.
//!
//! 트레이스/리포트는 prost protobuf 메시지, 서버 정보는 serde 구조체다.

pub mod report;
pub mod server_info;
pub mod trace;
