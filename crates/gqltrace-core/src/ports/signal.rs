//! 종료 시그널 포트.
//!
//! 프로세스 전역 핸들러 대신 명시적으로 등록/해제하는 시그널 소스.
//! 테스트는 채널 기반 구현으로 실제 OS 시그널 없이 종료를 흉내 낸다.

use async_trait::async_trait;

/// 종료 시그널 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl TerminationSignal {
    /// POSIX 시그널 번호
    pub fn signo(self) -> i32 {
        match self {
            TerminationSignal::Interrupt => 2,
            TerminationSignal::Terminate => 15,
        }
    }
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// 종료 시그널 소스
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// 다음 시그널 대기 — 소스가 닫히면 `None`
    async fn recv(&mut self) -> Option<TerminationSignal>;

    /// 마지막 리포트 전송 후 같은 시그널을 다시 발생시켜 정상 종료를 진행
    fn reraise(&self, signal: TerminationSignal);
}
