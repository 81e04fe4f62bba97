//! 스키마 리포팅 서버 정보.
//!
//! 스키마 리포팅 루프에 한 번 계산해 넘기는 정적 메타데이터.

use serde::{Deserialize, Serialize};

/// 스키마 리포팅 루프가 레지스트리에 알리는 서버 식별 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// 프로세스 부팅 ID (프로세스 수명 동안 고정)
    pub boot_id: String,
    /// 그래프 변형 이름
    pub graph_variant: String,
    /// 실행 플랫폼 (`APOLLO_SERVER_PLATFORM` 또는 "local")
    pub platform: String,
    /// 런타임 버전
    pub runtime_version: String,
    /// 실행 스키마 ID
    pub executable_schema_id: String,
    /// 사용자 지정 서버 버전 (`APOLLO_SERVER_USER_VERSION`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_version: Option<String>,
    /// 서버 ID (`APOLLO_SERVER_ID` 또는 호스트 이름)
    pub server_id: String,
    /// 에이전트 라이브러리 버전
    pub library_version: String,
}
