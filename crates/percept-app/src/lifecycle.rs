//! 추론 서비스 수명 관리.
//!
//! 서버 태스크를 띄운 뒤 정지 신호와 서버 자체 종료 중 먼저 오는 쪽을 기다린다.
//! 정지 신호가 먼저면 watch 채널로 graceful shutdown을 알리고 서버 정리를 기다린다.

use std::future::Future;
use std::io;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

/// 서비스가 멈춘 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 정지 신호 수신 후 정상 종료
    Signal,
    /// 신호 없이 서버가 먼저 끝남
    ServerExited,
}

/// 서비스 하나의 수명 관리자
pub struct ServiceLifecycle {
    service: &'static str,
    shutdown_tx: watch::Sender<bool>,
}

impl ServiceLifecycle {
    pub fn new(service: &'static str) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            service,
            shutdown_tx,
        }
    }

    /// 서버에 넘길 종료 수신기
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// 종료 알림
    pub fn stop(&self) {
        info!(service = self.service, "서비스 종료 신호 발송");
        let _ = self.shutdown_tx.send(true);
    }

    /// 서버를 실행하고 `stop_signal` 또는 서버 종료까지 대기
    pub async fn run<S, T>(&self, server: S, stop_signal: T) -> Result<StopReason>
    where
        S: Future<Output = io::Result<()>> + Send + 'static,
        T: Future<Output = io::Result<()>>,
    {
        let mut server_task = tokio::spawn(server);

        tokio::select! {
            result = &mut server_task => {
                // 신호 전에 끝났다면 바인드 실패 등
                result
                    .context("서비스 태스크 비정상 종료")?
                    .with_context(|| format!("{} 서비스 실행 실패", self.service))?;
                warn!(service = self.service, "서비스가 신호 없이 종료됨");
                return Ok(StopReason::ServerExited);
            }
            signal = stop_signal => {
                signal.context("시그널 핸들러 등록 실패")?;
            }
        }

        self.stop();
        server_task
            .await
            .context("서비스 태스크 비정상 종료")?
            .with_context(|| format!("{} 서비스 종료 실패", self.service))?;
        info!(service = self.service, "서비스 종료 완료");
        Ok(StopReason::Signal)
    }
}

/// OS 종료 시그널 대기 (SIGINT, SIGTERM)
pub async fn os_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => info!("SIGINT 수신"),
            _ = sigterm.recv() => info!("SIGTERM 수신"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C 수신");
    }

    Ok(())
}
