//! 스키마 리포팅 루프 핸드오프.
//!
//! 에이전트는 서버 정보를 계산하고 외부 루프를 시작/중단할 뿐이다.
//! 동시에 활성화된 루프는 최대 하나.

use gqltrace_core::models::server_info::ServerInfo;
use gqltrace_core::ports::schema_reporter::SchemaReporterFactory;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::header::{agent_version, runtime_version, HostInfo};
use crate::lifecycle::wait_for_shutdown;

/// 루프가 주기를 알 수 없을 때 쓰는 폴백 주기
pub const FALLBACK_REPORTING_INTERVAL: Duration = Duration::from_secs(20);

/// 시작 지연 최대값 (동일 프로세스 무리의 동기화 방지)
pub const MAX_START_JITTER: Duration = Duration::from_secs(5);

/// 플랫폼 환경변수
const PLATFORM_ENV: &str = "APOLLO_SERVER_PLATFORM";
/// 서버 ID 환경변수
const SERVER_ID_ENV: &str = "APOLLO_SERVER_ID";
/// 사용자 버전 환경변수
const USER_VERSION_ENV: &str = "APOLLO_SERVER_USER_VERSION";

/// 스키마 ID 함수: 스키마 원문 → 콘텐츠 해시
pub type SchemaIdFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 기본 스키마 ID: 스키마 원문의 SHA-256 hex
pub fn default_schema_id(schema: &str) -> String {
    let digest = Sha256::digest(schema.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// 기본 스키마 ID 함수 값
pub fn default_schema_id_fn() -> SchemaIdFn {
    Arc::new(default_schema_id)
}

/// 서버 정보 계산
pub fn build_server_info<L>(
    boot_id: &str,
    graph_variant: &str,
    executable_schema_id: &str,
    host: &HostInfo,
    lookup: L,
) -> ServerInfo
where
    L: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
    ServerInfo {
        boot_id: boot_id.to_string(),
        graph_variant: graph_variant.to_string(),
        platform: non_empty(PLATFORM_ENV).unwrap_or_else(|| "local".to_string()),
        runtime_version: runtime_version(),
        executable_schema_id: executable_schema_id.to_string(),
        user_version: non_empty(USER_VERSION_ENV),
        server_id: non_empty(SERVER_ID_ENV).unwrap_or_else(|| host.hostname.clone()),
        library_version: agent_version(),
    }
}

/// 0 ~ `max` 사이 임의 지연
fn random_jitter(max: Duration) -> Duration {
    max.mul_f64(rand::random::<f64>())
}

struct ActiveLoop {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// 스키마 리포팅 핸드오프
pub struct SchemaReportingHandoff {
    factory: Arc<dyn SchemaReporterFactory>,
    max_jitter: Duration,
    active: Mutex<Option<ActiveLoop>>,
}

impl SchemaReportingHandoff {
    /// 루프 생성기로 핸드오프 생성
    pub fn new(factory: Arc<dyn SchemaReporterFactory>) -> Self {
        Self {
            factory,
            max_jitter: MAX_START_JITTER,
            active: Mutex::new(None),
        }
    }

    /// 시작 지연 최대값 교체
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// 루프 시작 (기존 루프는 먼저 중단)
    pub fn start(&self, server_info: ServerInfo, executable_schema: String) {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            debug!("기존 스키마 리포팅 루프 중단");
            let _ = previous.shutdown_tx.send(true);
        }

        let schema_id = server_info.executable_schema_id.clone();
        let reporter =
            self.factory
                .create(server_info, executable_schema, FALLBACK_REPORTING_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let jitter = random_jitter(self.max_jitter);
        info!(
            "스키마 리포팅 시작 예약: schema={schema_id}, {}ms 후",
            jitter.as_millis()
        );

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(jitter) => {}
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    debug!("스키마 리포팅이 시작 전에 중단됨");
                    return;
                }
            }
            reporter.run(shutdown_rx).await;
        });

        *active = Some(ActiveLoop {
            shutdown_tx,
            handle,
        });
    }

    /// 활성 루프 중단
    pub fn stop(&self) {
        if let Some(active) = self.active.lock().take() {
            info!("스키마 리포팅 중단");
            let _ = active.shutdown_tx.send(true);
        }
    }

    /// 활성 루프가 있는지
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .map(|a| !a.handle.is_finished())
            .unwrap_or(false)
    }
}
