//! 주기적 플러시 타이머.
//!
//! 주기마다 틱 작업을 별도 태스크로 띄우므로 느린 전송이 다음 틱을 밀지 않는다.
//! 종료 채널이 `true`가 되면 루프를 빠져나온다. 이미 진행 중인 전송은 취소하지 않는다.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// 플러시 타이머 루프 시작
///
/// `tick`은 매 주기마다 호출되며, 반환한 future는 `tokio::spawn`으로 실행된다.
/// `tick`이 `None`을 반환하면 루프를 종료한다.
pub fn spawn_flush_timer<F, Fut>(
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Option<Fut> + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        // 첫 틱은 한 주기 뒤에
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("플러시 타이머 시작: {}ms 주기", period.as_millis());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tick() {
                        Some(work) => {
                            debug!("주기 플러시 실행");
                            tokio::spawn(work);
                        }
                        None => break,
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("플러시 타이머 종료");
    })
}
