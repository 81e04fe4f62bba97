//! 트레이스 수집 엔드포인트 HTTP 클라이언트.
//!
//! `ReportSender` 포트 구현. 리포트 검증 → protobuf 직렬화 → gzip 압축 →
//! `POST {endpoint}/api/ingress/traces`, 연결 실패와 5xx만 지수 백오프로 재시도.

use async_trait::async_trait;
use gqltrace_core::config::AgentConfig;
use gqltrace_core::error::CoreError;
use gqltrace_core::models::report::Report;
use gqltrace_core::ports::compressor::Compressor;
use gqltrace_core::ports::report_sender::{ReportSender, SendOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::compression::GzipCompressor;

/// 수집 경로
pub const INGRESS_PATH: &str = "/api/ingress/traces";

/// 기본 최대 시도 횟수 (첫 시도 포함)
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// 기본 첫 재시도 대기 시간
const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// 요청 헤더에 싣는 에이전트 식별자
pub fn default_user_agent() -> String {
    format!("gqltrace-agent/{}", env!("CARGO_PKG_VERSION"))
}

/// 수집 엔드포인트 클라이언트 — `ReportSender` 포트 구현
pub struct HttpReportSender {
    client: reqwest::Client,
    url: String,
    api_key: String,
    user_agent: String,
    compressor: Arc<dyn Compressor>,
    max_attempts: u32,
    min_retry_delay: Duration,
}

impl HttpReportSender {
    /// 새 전송기 생성
    pub fn new(endpoint_url: &str, api_key: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}{}", endpoint_url.trim_end_matches('/'), INGRESS_PATH),
            api_key: api_key.to_string(),
            user_agent: default_user_agent(),
            compressor: Arc::new(GzipCompressor::new()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
        })
    }

    /// 에이전트 설정으로 생성 (엔드포인트, 타임아웃, 재시도 정책 반영)
    pub fn from_config(config: &AgentConfig, api_key: &str) -> Result<Self, CoreError> {
        Ok(Self::new(&config.endpoint_url, api_key, config.request_timeout())?
            .with_max_attempts(config.max_attempts)
            .with_minimum_retry_delay(config.minimum_retry_delay()))
    }

    /// 최대 시도 횟수 설정 (최소 1회)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// 첫 재시도 대기 시간 설정
    pub fn with_minimum_retry_delay(mut self, delay: Duration) -> Self {
        self.min_retry_delay = delay;
        self
    }

    /// 전송 URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 검증 + 직렬화 + 압축된 요청 본문 생성
    ///
    /// 압축은 blocking 스레드에서 수행해 런타임 워커를 막지 않는다.
    async fn encode_body(&self, report: &Report) -> Result<Vec<u8>, CoreError> {
        let serialized = report.encode_validated()?;
        let compressor = self.compressor.clone();
        tokio::task::spawn_blocking(move || compressor.compress(&serialized))
            .await
            .map_err(|e| CoreError::Internal(format!("압축 작업 실패: {e}")))?
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(resp: reqwest::Response) -> Result<u16, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        Err(CoreError::Transport {
            status: Some(status.as_u16()),
            message: if text.is_empty() {
                status.to_string()
            } else {
                text
            },
        })
    }

    /// 단일 POST 시도
    async fn post_once(&self, body: &[u8]) -> Result<u16, CoreError> {
        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header("x-api-key", &self.api_key)
            .header(
                reqwest::header::CONTENT_ENCODING,
                self.compressor.content_encoding(),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/protobuf")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("리포트 전송 요청 실패: {e}")))?;

        Self::check_response(resp).await
    }

    /// 재시도가 포함된 전송
    ///
    /// exponential backoff: min_delay → ×2 → ×4 ... (최대 `max_attempts`회 시도)
    async fn execute_with_retry(&self, body: &[u8]) -> Result<SendOutcome, CoreError> {
        let mut delay = self.min_retry_delay;

        for attempt in 1..=self.max_attempts {
            match self.post_once(body).await {
                Ok(status) => {
                    return Ok(SendOutcome {
                        status,
                        attempts: attempt,
                    })
                }
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempt == self.max_attempts {
                        return Err(into_terminal(e, attempt));
                    }

                    warn!(
                        "리포트 전송 실패 (시도 {attempt}/{}): {e}, {delay:?} 후 재시도",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }

        Err(CoreError::Internal("시도 횟수가 0".to_string()))
    }
}

/// 재시도 소진 에러를 최종 전송 에러로 변환
fn into_terminal(error: CoreError, attempts: u32) -> CoreError {
    match error {
        CoreError::Network(message) => CoreError::Transport {
            status: None,
            message: format!("{attempts}회 시도 후 포기: {message}"),
        },
        other => other,
    }
}

#[async_trait]
impl ReportSender for HttpReportSender {
    async fn send(&self, report: &Report) -> Result<SendOutcome, CoreError> {
        let body = self.encode_body(report).await?;
        debug!(
            "리포트 전송: schema={}, traces={}, 압축 후 {} bytes",
            report.schema_id(),
            report.trace_count(),
            body.len()
        );

        let outcome = self.execute_with_retry(&body).await?;
        debug!(
            "리포트 전송 성공: status={}, attempts={}",
            outcome.status, outcome.attempts
        );
        Ok(outcome)
    }
}
