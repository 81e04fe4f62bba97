//! 리포트 헤더용 호스트 메타데이터.
//!
//! 에이전트 생성 시 한 번 수집하고, 스키마별 헤더를 만들 때 재사용한다.

use gqltrace_core::models::report::ReportHeader;
use sysinfo::System;

/// 에이전트 버전 문자열
pub fn agent_version() -> String {
    format!("gqltrace-agent@{}", env!("CARGO_PKG_VERSION"))
}

/// 런타임 버전 문자열
///
/// 빌드에 쓰인 컴파일러 버전은 알 수 없으므로 최소 지원 러스트 버전(MSRV)을
/// `rust >=1.77` 형식으로 표기한다. MSRV가 없으면 `rust`.
pub fn runtime_version() -> String {
    runtime_version_from(option_env!("CARGO_PKG_RUST_VERSION"))
}

fn runtime_version_from(msrv: Option<&str>) -> String {
    match msrv.filter(|v| !v.is_empty()) {
        Some(msrv) => format!("rust >={msrv}"),
        None => "rust".to_string(),
    }
}

/// 호스트 메타데이터 (프로세스 수명 동안 불변)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// 호스트 이름
    pub hostname: String,
    /// 에이전트 버전
    pub agent_version: String,
    /// 런타임 버전
    pub runtime_version: String,
    /// 플랫폼 기술자: "{os}, {os 이름}, {커널 버전}, {아키텍처}"
    pub uname: String,
}

impl HostInfo {
    /// 현재 호스트 정보 수집
    pub fn detect() -> Self {
        let hostname = System::host_name().unwrap_or_else(|| "unknown".to_string());
        let uname = format!(
            "{}, {}, {}, {}",
            std::env::consts::OS,
            System::name().unwrap_or_default(),
            System::kernel_version().unwrap_or_default(),
            std::env::consts::ARCH
        );
        Self {
            hostname,
            agent_version: agent_version(),
            runtime_version: runtime_version(),
            uname,
        }
    }

    /// 스키마 변형 하나의 리포트 헤더 생성
    pub fn header(&self, schema_id: &str, schema_variant: &str) -> ReportHeader {
        ReportHeader {
            hostname: self.hostname.clone(),
            agent_version: self.agent_version.clone(),
            runtime_version: self.runtime_version.clone(),
            uname: self.uname.clone(),
            schema_tag: schema_variant.to_string(),
            schema_hash: schema_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_fills_fields() {
        let host = HostInfo::detect();
        assert!(!host.hostname.is_empty());
        assert!(host.agent_version.starts_with("gqltrace-agent@"));
        assert!(host.uname.starts_with(std::env::consts::OS));
        assert!(host.uname.ends_with(std::env::consts::ARCH));
    }

    #[test]
    fn runtime_version_labels_minimum_supported() {
        assert_eq!(runtime_version_from(Some("1.77.1")), "rust >=1.77.1");
        assert_eq!(runtime_version_from(Some("")), "rust");
        assert_eq!(runtime_version_from(None), "rust");
        assert!(runtime_version().starts_with("rust"));
    }

    #[test]
    fn header_carries_schema_identity() {
        let host = HostInfo {
            hostname: "h".to_string(),
            agent_version: "a".to_string(),
            runtime_version: "r".to_string(),
            uname: "u".to_string(),
        };
        let header = host.header("schema-1", "staging");
        assert_eq!(header.schema_hash, "schema-1");
        assert_eq!(header.schema_tag, "staging");
        assert_eq!(header.hostname, "h");
    }
}
