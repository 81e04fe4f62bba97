//! 라이프사이클 관리.
//!
//! 종료 시그널 소스 구현과 시그널 감시 태스크.
//! 시그널 수신 시: 에이전트 중지 → 마지막 리포트 전송 대기 → 같은 시그널 재발생.

use async_trait::async_trait;
use gqltrace_core::error::CoreError;
use gqltrace_core::ports::signal::{SignalSource, TerminationSignal};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// OS 시그널 소스 (SIGINT, SIGTERM / 비 unix는 Ctrl+C)
///
/// tokio는 한 번 설치한 핸들러를 되돌리지 못하므로, 재발생은
/// 관례적 종료 코드(128 + 시그널 번호)로 프로세스를 끝내는 것으로 대신한다.
pub struct OsSignalSource {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl OsSignalSource {
    /// 시그널 핸들러 등록 (tokio 런타임 안에서 호출)
    pub fn new() -> Result<Self, CoreError> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }
}

#[async_trait]
impl SignalSource for OsSignalSource {
    async fn recv(&mut self) -> Option<TerminationSignal> {
        #[cfg(unix)]
        {
            tokio::select! {
                s = self.sigint.recv() => s.map(|_| TerminationSignal::Interrupt),
                s = self.sigterm.recv() => s.map(|_| TerminationSignal::Terminate),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .ok()
                .map(|_| TerminationSignal::Interrupt)
        }
    }

    fn reraise(&self, signal: TerminationSignal) {
        info!("{signal} 재발생, 프로세스 종료");
        std::process::exit(128 + signal.signo());
    }
}

/// 채널 기반 시그널 소스. 실제 OS 시그널 없이 종료를 흉내 낼 때 사용
pub struct ChannelSignalSource {
    rx: mpsc::UnboundedReceiver<TerminationSignal>,
    reraised: Arc<Mutex<Vec<TerminationSignal>>>,
}

/// [`ChannelSignalSource`]에 시그널을 보내는 쪽
#[derive(Clone)]
pub struct SignalTrigger {
    tx: mpsc::UnboundedSender<TerminationSignal>,
    reraised: Arc<Mutex<Vec<TerminationSignal>>>,
}

impl SignalTrigger {
    /// 시그널 발생 (수신 측이 사라졌으면 `false`)
    pub fn send(&self, signal: TerminationSignal) -> bool {
        self.tx.send(signal).is_ok()
    }

    /// 지금까지 재발생된 시그널
    pub fn reraised(&self) -> Vec<TerminationSignal> {
        self.reraised.lock().clone()
    }
}

/// 채널 시그널 소스 생성
pub fn channel_signal_source() -> (SignalTrigger, ChannelSignalSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let reraised = Arc::new(Mutex::new(Vec::new()));
    (
        SignalTrigger {
            tx,
            reraised: reraised.clone(),
        },
        ChannelSignalSource { rx, reraised },
    )
}

#[async_trait]
impl SignalSource for ChannelSignalSource {
    async fn recv(&mut self) -> Option<TerminationSignal> {
        self.rx.recv().await
    }

    fn reraise(&self, signal: TerminationSignal) {
        self.reraised.lock().push(signal);
    }
}

/// 종료 채널이 `true`가 되거나 송신 측이 사라질 때까지 대기
pub(crate) async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

/// 시그널 감시 태스크 시작
///
/// 시그널을 받으면 `on_signal`을 끝까지 기다린 뒤 소스에 재발생을 맡긴다.
/// 종료 채널이 먼저 닫히면(= `stop()`) 시그널 처리 없이 등록을 해제한다.
/// 처리가 시작된 뒤의 `stop()`은 진행 중인 처리를 끊지 않는다.
pub fn spawn_signal_watcher<F, Fut>(
    mut source: Box<dyn SignalSource>,
    mut shutdown_rx: watch::Receiver<bool>,
    on_signal: F,
) -> JoinHandle<()>
where
    F: FnOnce(TerminationSignal) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let received = tokio::select! {
            signal = source.recv() => signal,
            _ = wait_for_shutdown(&mut shutdown_rx) => None,
        };

        match received {
            Some(signal) => {
                info!("{signal} 수신, 마지막 리포트 전송");
                on_signal(signal).await;
                source.reraise(signal);
            }
            None => debug!("시그널 감시 해제"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn signal_runs_handler_then_reraises() {
        let (trigger, source) = channel_signal_source();
        let (_tx, rx) = watch::channel(false);
        let handled = Arc::new(AtomicBool::new(false));
        let h = handled.clone();

        let handle = spawn_signal_watcher(Box::new(source), rx, move |signal| async move {
            assert_eq!(signal, TerminationSignal::Terminate);
            h.store(true, Ordering::SeqCst);
        });

        assert!(trigger.send(TerminationSignal::Terminate));
        handle.await.unwrap();

        assert!(handled.load(Ordering::SeqCst));
        assert_eq!(trigger.reraised(), vec![TerminationSignal::Terminate]);
    }

    #[tokio::test]
    async fn shutdown_deregisters_without_handling() {
        let (trigger, source) = channel_signal_source();
        let (tx, rx) = watch::channel(false);

        let handle = spawn_signal_watcher(Box::new(source), rx, |_| async {
            panic!("중지 후에는 호출되지 않음");
        });

        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(!trigger.send(TerminationSignal::Interrupt));
        assert!(trigger.reraised().is_empty());
    }

    #[test]
    fn signal_numbers() {
        assert_eq!(TerminationSignal::Interrupt.signo(), 2);
        assert_eq!(TerminationSignal::Terminate.signo(), 15);
        assert_eq!(TerminationSignal::Interrupt.to_string(), "SIGINT");
    }
}
