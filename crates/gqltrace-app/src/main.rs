//! # gqltrace-app
//!
//! gqltrace 바이너리 진입점.
//! 설정 로드, 로깅 초기화, 에이전트 생성 후 트레이스 기록을 재생한다.

mod replay;

use anyhow::{anyhow, Result};
use clap::Parser;
use gqltrace_agent::{config_loader, TraceAgent};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// GraphQL 트레이스 리포터
///
/// NDJSON 트레이스 기록을 읽어 수집 서비스로 전송
#[derive(Parser, Debug)]
#[command(name = "gqltrace")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (TOML/JSON)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 트레이스 기록 파일 (기본: 표준 입력)
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// 실행 스키마 파일. schemaId가 없는 기록에 이 스키마의 ID를 사용
    #[arg(long, short = 's')]
    schema: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 트레이스마다 즉시 전송
    #[arg(long)]
    immediate: bool,

    /// 전송 전 리포트 내용 출력
    #[arg(long)]
    debug_print: bool,

    /// 종료 시그널 처리 비활성화
    #[arg(long)]
    no_signals: bool,
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "gqltrace={0},gqltrace_app={0},gqltrace_agent={0},gqltrace_network={0},gqltrace_core={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let mut config = config_loader::load(args.config.as_deref())?;
    if args.immediate {
        config.send_reports_immediately = true;
    }
    if args.debug_print {
        config.debug_print_reports = true;
    }
    if args.no_signals {
        config.handle_signals = false;
    }

    let agent = TraceAgent::builder(config).build()?;

    let default_schema_id = match &args.schema {
        Some(path) => {
            let schema = tokio::fs::read_to_string(path).await?;
            let id = agent.schema_id_for(&schema);
            info!("실행 스키마 ID: {id}");
            Some(id)
        }
        None => None,
    };

    let mut lines = open_input(args.input.as_ref()).await?.lines();
    let mut line_no = 0usize;
    let mut added = 0usize;
    let mut skipped = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        if agent.is_stopped() {
            warn!("에이전트가 중지됨, 남은 기록 재생 중단");
            break;
        }

        let request = match replay::parse_record(&line)
            .and_then(|record| record.into_request(default_schema_id.as_deref()))
        {
            Ok(request) => request,
            Err(e) => {
                warn!("{line_no}번째 줄 건너뜀: {e}");
                skipped += 1;
                continue;
            }
        };

        match agent.add_trace(request).await {
            Ok(()) => added += 1,
            Err(e) => {
                warn!("{line_no}번째 줄 트레이스 추가 실패: {e}");
                skipped += 1;
            }
        }
    }

    let stats = agent.stats();
    info!(
        "재생 완료: 추가 {added}건, 건너뜀 {skipped}건, 전송 대기 {}건",
        stats.pending_traces
    );

    let result = agent.send_all_reports().await;
    agent.stop();
    if let Err(e) = result {
        error!("마지막 리포트 전송 실패: {e}");
        return Err(anyhow!(e));
    }

    info!("gqltrace 종료");
    Ok(())
}
