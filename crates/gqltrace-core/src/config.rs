//! 에이전트 설정 구조체.
//!
//! API 키, 리포트 주기/크기 상한, 수집 엔드포인트, 재시도 정책, 동작 토글을
//! 정의한다. 파일/환경변수 로드는 `gqltrace-agent::config_loader`가 담당.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// API 키 환경변수 (설정에 키가 없을 때 사용)
pub const API_KEY_ENV: &str = "ENGINE_API_KEY";

/// 그래프 변형(스키마 태그) 환경변수
pub const GRAPH_VARIANT_ENV: &str = "ENGINE_SCHEMA_TAG";

/// 트레이스 리포팅 에이전트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// 수집 서비스 API 키 (없으면 `ENGINE_API_KEY` 사용)
    #[serde(default)]
    pub api_key: Option<String>,
    /// 스키마 변형 이름
    #[serde(default = "default_graph_variant")]
    pub graph_variant: String,
    /// 수집 엔드포인트 기본 URL
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// 주기적 플러시 간격 (밀리초)
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    /// 압축 전 리포트 크기 상한 (바이트) — 넘으면 즉시 플러시
    #[serde(default = "default_max_uncompressed_report_size")]
    pub max_uncompressed_report_size: usize,
    /// 전송 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 첫 재시도 대기 시간 (밀리초), 이후 2배씩 증가
    #[serde(default = "default_minimum_retry_delay_ms")]
    pub minimum_retry_delay_ms: u64,
    /// 요청 단위 HTTP 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 트레이스마다 즉시 전송 (타이머 비활성화)
    #[serde(default)]
    pub send_reports_immediately: bool,
    /// 전송 전 리포트 본문과 응답 상태를 로그로 출력
    #[serde(default)]
    pub debug_print_reports: bool,
    /// 종료 시그널 수신 시 마지막 리포트 전송
    #[serde(default = "default_true")]
    pub handle_signals: bool,
    /// 시그니처 캐시 용량 (직렬화 크기 합계, 바이트)
    #[serde(default = "default_signature_cache_max_bytes")]
    pub signature_cache_max_bytes: usize,
}

impl AgentConfig {
    /// 기본 설정 생성
    pub fn default_config() -> Self {
        Self {
            api_key: None,
            graph_variant: default_graph_variant(),
            endpoint_url: default_endpoint_url(),
            report_interval_ms: default_report_interval_ms(),
            max_uncompressed_report_size: default_max_uncompressed_report_size(),
            max_attempts: default_max_attempts(),
            minimum_retry_delay_ms: default_minimum_retry_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            send_reports_immediately: false,
            debug_print_reports: false,
            handle_signals: true,
            signature_cache_max_bytes: default_signature_cache_max_bytes(),
        }
    }

    /// 플러시 주기
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// 첫 재시도 대기 시간
    pub fn minimum_retry_delay(&self) -> Duration {
        Duration::from_millis(self.minimum_retry_delay_ms)
    }

    /// 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 비어 있지 않은 API 키 (공백만 있는 값은 없음으로 취급)
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// 환경변수 폴백 적용
    ///
    /// 설정에 API 키가 없으면 `ENGINE_API_KEY`, 변형 이름이 기본값이면
    /// `ENGINE_SCHEMA_TAG`를 사용한다. 조회 함수는 에이전트 빌더가 주입한다.
    pub fn with_env_fallbacks_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key().is_none() {
            if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
                self.api_key = Some(key);
            }
        }
        if self.graph_variant == default_graph_variant() {
            if let Some(tag) = lookup(GRAPH_VARIANT_ENV).filter(|t| !t.trim().is_empty()) {
                self.graph_variant = tag;
            }
        }
        self
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(CoreError::Config("endpoint_url이 비어 있음".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(CoreError::Config(
                "max_attempts는 1 이상이어야 함".to_string(),
            ));
        }
        if self.max_uncompressed_report_size == 0 {
            return Err(CoreError::Config(
                "max_uncompressed_report_size는 0보다 커야 함".to_string(),
            ));
        }
        if !self.send_reports_immediately && self.report_interval_ms == 0 {
            return Err(CoreError::Config(
                "report_interval_ms는 0보다 커야 함".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

fn default_true() -> bool {
    true
}

fn default_graph_variant() -> String {
    "current".to_string()
}

fn default_endpoint_url() -> String {
    "https://engine-report.apollodata.com".to_string()
}

fn default_report_interval_ms() -> u64 {
    10_000
}

fn default_max_uncompressed_report_size() -> usize {
    4 * 1024 * 1024
}

fn default_max_attempts() -> u32 {
    5
}

fn default_minimum_retry_delay_ms() -> u64 {
    100
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_signature_cache_max_bytes() -> usize {
    3 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::default_config();
        assert_eq!(config.report_interval(), Duration::from_secs(10));
        assert_eq!(config.max_uncompressed_report_size, 4 * 1024 * 1024);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.minimum_retry_delay(), Duration::from_millis(100));
        assert_eq!(config.signature_cache_max_bytes, 3 * 1024 * 1024);
        assert!(config.handle_signals);
        assert!(!config.send_reports_immediately);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"api_key":"service:abc","max_attempts":2}"#).unwrap();
        assert_eq!(config.api_key(), Some("service:abc"));
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.graph_variant, "current");
        assert_eq!(config.report_interval_ms, 10_000);
    }

    #[test]
    fn blank_api_key_is_absent() {
        let config = AgentConfig {
            api_key: Some("   ".to_string()),
            ..AgentConfig::default_config()
        };
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn env_fallbacks_fill_missing_values() {
        let config = AgentConfig::default_config().with_env_fallbacks_from(|name| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            GRAPH_VARIANT_ENV => Some("staging".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key(), Some("env-key"));
        assert_eq!(config.graph_variant, "staging");
    }

    #[test]
    fn env_fallbacks_do_not_override_explicit_values() {
        let config = AgentConfig {
            api_key: Some("explicit".to_string()),
            graph_variant: "prod".to_string(),
            ..AgentConfig::default_config()
        }
        .with_env_fallbacks_from(|_| Some("env".to_string()));
        assert_eq!(config.api_key(), Some("explicit"));
        assert_eq!(config.graph_variant, "prod");
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let config = AgentConfig {
            max_attempts: 0,
            ..AgentConfig::default_config()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn zero_interval_allowed_in_immediate_mode() {
        let config = AgentConfig {
            report_interval_ms: 0,
            send_reports_immediately: true,
            ..AgentConfig::default_config()
        };
        assert!(config.validate().is_ok());
    }
}
