//! 리포트 전송 포트.
//!
//! 구현: `gqltrace-network` crate (reqwest + gzip + 재시도)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::report::Report;

/// 전송 성공 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// 최종 HTTP 상태 코드
    pub status: u16,
    /// 성공까지 걸린 시도 횟수
    pub attempts: u32,
}

/// 리포트 전송기
#[async_trait]
pub trait ReportSender: Send + Sync {
    /// 리포트 하나를 통째로 전송
    ///
    /// 인코딩 실패는 네트워크 시도 전에 `CoreError::Encoding`,
    /// 최종 전송 실패는 `CoreError::Transport`로 반환한다.
    async fn send(&self, report: &Report) -> Result<SendOutcome, CoreError>;
}
