//! 설정 로더.
//!
//! 우선순위: 기본값 < 설정 파일(TOML/JSON, 선택) < `GQLTRACE_*` 환경변수.
//! API 키/변형 이름 폴백(`ENGINE_API_KEY`, `ENGINE_SCHEMA_TAG`)은
//! 에이전트 빌드 시 적용된다.

use config::{Config, Environment, File};
use gqltrace_core::config::AgentConfig;
use gqltrace_core::error::CoreError;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// 환경변수 접두사
pub const ENV_PREFIX: &str = "GQLTRACE";

/// 파일 + 프로세스 환경변수로 설정 로드
pub fn load(path: Option<&Path>) -> Result<AgentConfig, CoreError> {
    load_with_env(path, None)
}

/// 파일 + 주어진 환경변수 맵으로 설정 로드 (`None`이면 프로세스 환경)
pub fn load_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<AgentConfig, CoreError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        debug!("설정 파일 로드: {}", path.display());
        builder = builder.add_source(File::from(path).required(true));
    }

    let mut environment = Environment::with_prefix(ENV_PREFIX).try_parsing(true);
    if let Some(env) = env {
        environment = environment.source(Some(env.into_iter().collect()));
    }
    builder = builder.add_source(environment);

    let config: AgentConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| CoreError::Config(format!("설정 로드 실패: {e}")))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_sources() {
        let config = load_with_env(None, Some(HashMap::new())).unwrap();
        assert_eq!(config.report_interval_ms, 10_000);
        assert_eq!(config.max_attempts, 5);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = toml_file(
            r#"
api_key = "service:file"
graph_variant = "staging"
report_interval_ms = 2000
debug_print_reports = true
"#,
        );
        let config = load_with_env(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(config.api_key(), Some("service:file"));
        assert_eq!(config.graph_variant, "staging");
        assert_eq!(config.report_interval_ms, 2000);
        assert!(config.debug_print_reports);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn env_overrides_file() {
        let file = toml_file("max_attempts = 3\n");
        let env = HashMap::from([
            ("GQLTRACE_MAX_ATTEMPTS".to_string(), "7".to_string()),
            ("GQLTRACE_SEND_REPORTS_IMMEDIATELY".to_string(), "true".to_string()),
        ]);
        let config = load_with_env(Some(file.path()), Some(env)).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert!(config.send_reports_immediately);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_with_env(
            Some(Path::new("/nonexistent/gqltrace.toml")),
            Some(HashMap::new()),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn invalid_values_rejected() {
        let file = toml_file("max_attempts = 0\n");
        let err = load_with_env(Some(file.path()), Some(HashMap::new())).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
