//! gqltrace 핵심 에러 타입.
//!
//! 모든 crate가 이 타입을 공유한다. 트레이스 생산자에게 전파되는 에러
//! (`Encoding`, `Signature`)와 백그라운드 전송에서 에러 훅으로 넘어가는 에러
//! (`Transport`)를 구분한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 트레이스/리포트 구조 검증 실패 — 절대 전송하지 않는다
    #[error("인코딩 에러: {0}")]
    Encoding(String),

    /// 시그니처 계산 불가 (파싱된 문서와 원문 쿼리 모두 없음)
    #[error("시그니처 에러: {0}")]
    Signature(String),

    /// 재시도 소진 또는 재시도 불가 상태 코드로 인한 최종 전송 실패
    #[error("전송 에러{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Transport {
        /// HTTP 상태 코드 (연결 실패 시 없음)
        status: Option<u16>,
        /// 실패 사유
        message: String,
    },

    /// 네트워크 에러 (연결 실패, 타임아웃) — 재시도 대상
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 전송 계층에서 재시도할 수 있는 에러인지 판별
    ///
    /// 연결 실패/타임아웃과 5xx 응답만 재시도한다.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Network(_) => true,
            CoreError::Transport {
                status: Some(status),
                ..
            } => (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP 상태 코드 (있으면)
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}
