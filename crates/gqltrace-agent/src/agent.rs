//! 트레이스 리포팅 에이전트.
//!
//! 트레이스 추가 → 스키마별 버퍼 누적 → 크기/주기 기반 플러시 → 전송.
//! 포트 구현(`ReportSender`, `SchemaReporterFactory`, `SignalSource`)과
//! 함수 값(시그니처, 스키마 ID, 에러 훅)은 빌더로 주입한다.

use chrono::Utc;
use futures::future::join_all;
use gqltrace_core::config::AgentConfig;
use gqltrace_core::error::CoreError;
use gqltrace_core::models::report::{stats_report_key, Report};
use gqltrace_core::models::server_info::ServerInfo;
use gqltrace_core::models::trace::{to_timestamp, Trace};
use gqltrace_core::ports::report_sender::ReportSender;
use gqltrace_core::ports::schema_reporter::SchemaReporterFactory;
use gqltrace_core::ports::signal::SignalSource;
use gqltrace_core::ports::signature::{default_signature_fn, QueryDocument, SignatureFn};
use gqltrace_network::ingress_client::HttpReportSender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::header::HostInfo;
use crate::lifecycle::{spawn_signal_watcher, OsSignalSource};
use crate::report_buffer::ReportBuffer;
use crate::scheduler::spawn_flush_timer;
use crate::schema_reporting::{
    build_server_info, default_schema_id_fn, SchemaIdFn, SchemaReportingHandoff,
};
use crate::signature_cache::{cache_key, SignatureCache};

/// 백그라운드 전송 실패를 받는 훅
pub type ErrorHook = Arc<dyn Fn(&CoreError) + Send + Sync>;

/// 환경변수 조회 함수
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// 기본 에러 훅 (에러 로그만 남긴다)
pub fn default_error_hook() -> ErrorHook {
    Arc::new(|e: &CoreError| error!("트레이스 리포트 전송 실패: {e}"))
}

/// 트레이스 추가 요청
#[derive(Debug, Clone)]
pub struct AddTraceRequest {
    /// 실행 스키마 ID
    pub schema_id: String,
    /// 완료된 트레이스
    pub trace: Trace,
    /// 쿼리 원문 해시
    pub query_hash: String,
    /// 연산 이름
    pub operation_name: Option<String>,
    /// 파싱된 문서
    pub document: Option<QueryDocument>,
    /// 쿼리 원문
    pub source: Option<String>,
}

impl AddTraceRequest {
    pub fn new(schema_id: impl Into<String>, query_hash: impl Into<String>, trace: Trace) -> Self {
        Self {
            schema_id: schema_id.into(),
            trace,
            query_hash: query_hash.into(),
            operation_name: None,
            document: None,
            source: None,
        }
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_document(mut self, document: QueryDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// 에이전트 통계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    /// 버퍼가 있는 스키마 수
    pub pending_schemas: usize,
    /// 전송 대기 트레이스 수
    pub pending_traces: usize,
    /// 전송 대기 추정 바이트
    pub pending_bytes: usize,
    /// 시그니처 캐시 항목 수
    pub signature_cache_entries: usize,
    /// 시그니처 캐시 사용 바이트
    pub signature_cache_bytes: usize,
    /// 중지 여부
    pub stopped: bool,
}

struct AgentInner {
    config: AgentConfig,
    sender: Arc<dyn ReportSender>,
    buffer: ReportBuffer,
    signatures: SignatureCache,
    signature_fn: SignatureFn,
    schema_id_fn: SchemaIdFn,
    error_hook: ErrorHook,
    host: HostInfo,
    server_info: ServerInfo,
    schema_reporting: Option<SchemaReportingHandoff>,
    shutdown_tx: watch::Sender<bool>,
    stopped: AtomicBool,
}

impl AgentInner {
    /// 스키마 하나의 리포트를 분리해 전송
    async fn flush_one(&self, schema_id: &str) -> Result<(), CoreError> {
        match self.buffer.detach(schema_id) {
            Some(report) => self.send_detached(schema_id, report).await,
            None => Ok(()),
        }
    }

    /// 이미 분리된 리포트 전송 (빈 리포트는 건너뜀)
    async fn send_detached(&self, schema_id: &str, mut report: Report) -> Result<(), CoreError> {
        if report.is_empty() {
            return Ok(());
        }

        report.end_time = Some(to_timestamp(Utc::now()));
        let traces = report.trace_count();
        if self.config.debug_print_reports {
            info!("리포트 전송 (schema={schema_id}):\n{:#}", report.to_debug_json());
        }

        let outcome = self.sender.send(&report).await?;
        if self.config.debug_print_reports {
            info!("리포트 응답 상태: {} (schema={schema_id})", outcome.status);
        }
        debug!(
            "리포트 전송 완료: schema={schema_id}, traces={traces}, attempts={}",
            outcome.attempts
        );
        Ok(())
    }

    /// 모든 스키마를 동시에 플러시, 첫 에러 반환 (나머지는 훅으로)
    async fn send_all_reports(&self) -> Result<(), CoreError> {
        let schema_ids = self.buffer.schema_ids();
        let results = join_all(schema_ids.iter().map(|id| self.flush_one(id))).await;

        let mut first = None;
        for result in results {
            if let Err(e) = result {
                if first.is_none() {
                    first = Some(e);
                } else {
                    (self.error_hook)(&e);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// 모든 스키마 플러시, 에러는 전부 훅으로
    async fn send_all_reports_and_report_errors(&self) {
        let schema_ids = self.buffer.schema_ids();
        let results = join_all(schema_ids.iter().map(|id| self.flush_one(id))).await;
        for e in results.into_iter().filter_map(Result::err) {
            (self.error_hook)(&e);
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown_tx.send_replace(true);
        if let Some(handoff) = &self.schema_reporting {
            handoff.stop();
        }
        info!("트레이스 에이전트 중지");
    }
}

/// 에이전트 빌더
pub struct TraceAgentBuilder {
    config: AgentConfig,
    sender: Option<Arc<dyn ReportSender>>,
    signature_fn: SignatureFn,
    schema_id_fn: SchemaIdFn,
    error_hook: ErrorHook,
    schema_reporter_factory: Option<Arc<dyn SchemaReporterFactory>>,
    signal_source: Option<Box<dyn SignalSource>>,
    env_lookup: EnvLookup,
    host: Option<HostInfo>,
}

impl TraceAgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            sender: None,
            signature_fn: default_signature_fn(),
            schema_id_fn: default_schema_id_fn(),
            error_hook: default_error_hook(),
            schema_reporter_factory: None,
            signal_source: None,
            env_lookup: Arc::new(|name: &str| std::env::var(name).ok()),
            host: None,
        }
    }

    /// 리포트 전송기 교체 (기본: HTTP 전송기)
    pub fn sender(mut self, sender: Arc<dyn ReportSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn signature_fn(mut self, f: SignatureFn) -> Self {
        self.signature_fn = f;
        self
    }

    pub fn schema_id_fn(mut self, f: SchemaIdFn) -> Self {
        self.schema_id_fn = f;
        self
    }

    pub fn error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = hook;
        self
    }

    pub fn schema_reporter_factory(mut self, factory: Arc<dyn SchemaReporterFactory>) -> Self {
        self.schema_reporter_factory = Some(factory);
        self
    }

    /// 시그널 소스 지정 (없으면 `handle_signals`일 때 OS 시그널 사용)
    pub fn signal_source(mut self, source: Box<dyn SignalSource>) -> Self {
        self.signal_source = Some(source);
        self
    }

    /// 환경변수 조회 함수 교체
    pub fn env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env_lookup = lookup;
        self
    }

    /// 호스트 정보 고정 (기본: 자동 수집)
    pub fn host_info(mut self, host: HostInfo) -> Self {
        self.host = Some(host);
        self
    }

    /// 에이전트 생성 및 백그라운드 태스크 시작
    ///
    /// tokio 런타임 안에서 호출해야 한다.
    pub fn build(self) -> Result<TraceAgent, CoreError> {
        tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Internal(format!("tokio 런타임 밖에서 에이전트 생성: {e}")))?;

        let lookup = self.env_lookup;
        let config = self.config.with_env_fallbacks_from(|name| lookup(name));
        config.validate()?;
        let api_key = config
            .api_key()
            .ok_or_else(|| {
                CoreError::Config(format!(
                    "API 키가 없음. 설정의 api_key 또는 {} 환경변수 필요",
                    gqltrace_core::config::API_KEY_ENV
                ))
            })?
            .to_string();

        let sender = match self.sender {
            Some(sender) => sender,
            None => Arc::new(HttpReportSender::from_config(&config, &api_key)?),
        };

        let host = self.host.unwrap_or_else(HostInfo::detect);
        let boot_id = uuid::Uuid::new_v4().to_string();
        let server_info =
            build_server_info(&boot_id, &config.graph_variant, "", &host, |name| lookup(name));
        let (shutdown_tx, _) = watch::channel(false);

        let inner = Arc::new(AgentInner {
            signatures: SignatureCache::new(config.signature_cache_max_bytes),
            sender,
            buffer: ReportBuffer::new(),
            signature_fn: self.signature_fn,
            schema_id_fn: self.schema_id_fn,
            error_hook: self.error_hook,
            host,
            server_info,
            schema_reporting: self
                .schema_reporter_factory
                .map(SchemaReportingHandoff::new),
            shutdown_tx,
            stopped: AtomicBool::new(false),
            config,
        });

        if !inner.config.send_reports_immediately {
            let weak: Weak<AgentInner> = Arc::downgrade(&inner);
            spawn_flush_timer(
                inner.config.report_interval(),
                inner.shutdown_tx.subscribe(),
                move || {
                    let inner = weak.upgrade()?;
                    Some(async move { inner.send_all_reports_and_report_errors().await })
                },
            );
        }

        if inner.config.handle_signals {
            let source = match self.signal_source {
                Some(source) => source,
                None => Box::new(OsSignalSource::new()?),
            };
            let weak = Arc::downgrade(&inner);
            spawn_signal_watcher(source, inner.shutdown_tx.subscribe(), move |_signal| async move {
                if let Some(inner) = weak.upgrade() {
                    inner.stop();
                    inner.send_all_reports_and_report_errors().await;
                }
            });
        }

        info!(
            "트레이스 에이전트 시작: variant={}, immediate={}, interval={}ms",
            inner.config.graph_variant,
            inner.config.send_reports_immediately,
            inner.config.report_interval_ms
        );
        Ok(TraceAgent { inner })
    }
}

/// 트레이스 리포팅 에이전트 (복제 시 같은 상태 공유)
#[derive(Clone)]
pub struct TraceAgent {
    inner: Arc<AgentInner>,
}

impl TraceAgent {
    pub fn builder(config: AgentConfig) -> TraceAgentBuilder {
        TraceAgentBuilder::new(config)
    }

    /// 트레이스 추가
    ///
    /// 인코딩/시그니처 에러는 호출자에게 전파된다. 즉시 전송 모드에서는 전송
    /// 에러도 전파된다. 크기 상한에 닿으면 리포트는 반환 전에 분리되고 전송만
    /// 백그라운드로 실행되어 실패가 에러 훅으로 간다. 중지 후에는 아무것도
    /// 하지 않는다.
    pub async fn add_trace(&self, request: AddTraceRequest) -> Result<(), CoreError> {
        let inner = &self.inner;
        if self.is_stopped() {
            debug!("중지된 에이전트, 트레이스 무시");
            return Ok(());
        }

        let AddTraceRequest {
            schema_id,
            trace,
            query_hash,
            operation_name,
            document,
            source,
        } = request;
        let operation_name = operation_name.as_deref();

        let encoded = trace.encode_validated()?;
        let signature = inner.signatures.get_or_compute(
            &cache_key(&query_hash, operation_name),
            document.as_ref(),
            source.as_deref(),
            |doc| (inner.signature_fn)(doc, operation_name),
        )?;
        let key = stats_report_key(operation_name, &signature);

        let size = inner.buffer.append(
            &schema_id,
            || inner.host.header(&schema_id, &inner.config.graph_variant),
            key,
            encoded,
        );

        if inner.config.send_reports_immediately {
            return inner.flush_one(&schema_id).await;
        }

        if size >= inner.config.max_uncompressed_report_size {
            debug!(
                "리포트 크기 상한 도달 ({size} bytes), schema={schema_id} 플러시"
            );
            // 분리는 여기서 끝내고 전송만 백그라운드로
            if let Some(report) = inner.buffer.detach(&schema_id) {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    if let Err(e) = inner.send_detached(&schema_id, report).await {
                        (inner.error_hook)(&e);
                    }
                });
            }
        }
        Ok(())
    }

    /// 스키마 하나를 즉시 전송 (에러 전파)
    pub async fn send_report(&self, schema_id: &str) -> Result<(), CoreError> {
        self.inner.flush_one(schema_id).await
    }

    /// 모든 스키마를 동시에 전송, 첫 에러 반환
    pub async fn send_all_reports(&self) -> Result<(), CoreError> {
        self.inner.send_all_reports().await
    }

    /// 모든 스키마를 전송, 에러는 에러 훅으로
    pub async fn send_all_reports_and_report_errors(&self) {
        self.inner.send_all_reports_and_report_errors().await
    }

    /// 에이전트 중지
    ///
    /// 시그널 감시 해제, 타이머 취소, 스키마 리포팅 중단. 플러시하지 않는다.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// 스키마 원문의 ID 계산 (주입된 스키마 ID 함수)
    pub fn schema_id_for(&self, executable_schema: &str) -> String {
        (self.inner.schema_id_fn)(executable_schema)
    }

    /// 스키마 리포팅 루프 시작 (기존 루프는 중단)
    pub fn start_schema_reporting(
        &self,
        executable_schema_id: &str,
        executable_schema: String,
    ) -> Result<(), CoreError> {
        let handoff = self.inner.schema_reporting.as_ref().ok_or_else(|| {
            CoreError::Config("스키마 리포터가 설정되지 않음".to_string())
        })?;
        if self.is_stopped() {
            warn!("중지된 에이전트, 스키마 리포팅 시작 생략");
            return Ok(());
        }

        let server_info = ServerInfo {
            executable_schema_id: executable_schema_id.to_string(),
            ..self.inner.server_info.clone()
        };
        handoff.start(server_info, executable_schema);
        Ok(())
    }

    /// 스키마 리포팅 루프가 실행 중인지
    pub fn is_schema_reporting_active(&self) -> bool {
        self.inner
            .schema_reporting
            .as_ref()
            .map(SchemaReportingHandoff::is_active)
            .unwrap_or(false)
    }

    /// 에이전트 통계
    pub fn stats(&self) -> AgentStats {
        let buffer = self.inner.buffer.stats();
        AgentStats {
            pending_schemas: buffer.schemas,
            pending_traces: buffer.pending_traces,
            pending_bytes: buffer.pending_bytes,
            signature_cache_entries: self.inner.signatures.len(),
            signature_cache_bytes: self.inner.signatures.total_bytes(),
            stopped: self.is_stopped(),
        }
    }
}
