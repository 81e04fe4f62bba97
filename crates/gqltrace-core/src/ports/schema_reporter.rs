//! 스키마 리포팅 루프 포트.
//!
//! 루프 내부의 폴링/백오프는 구현체 책임이다. 에이전트는 시작/중단만 한다.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::models::server_info::ServerInfo;

/// 실행 중인 스키마 리포팅 루프
#[async_trait]
pub trait SchemaReporter: Send + Sync {
    /// 루프 실행 — `shutdown`이 `true`가 되면 반환해야 한다
    async fn run(&self, shutdown: watch::Receiver<bool>);
}

/// 스키마 리포팅 루프 생성기
pub trait SchemaReporterFactory: Send + Sync {
    /// 서버 정보, 실행 스키마 원문, 폴백 주기로 루프 생성
    fn create(
        &self,
        server_info: ServerInfo,
        executable_schema: String,
        fallback_interval: Duration,
    ) -> Arc<dyn SchemaReporter>;
}
