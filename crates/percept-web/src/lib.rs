//! # percept-web
//!
//! 추론 마이크로서비스 (Axum).
//!
//! ## 서비스
//! - 검출 (`POST /detect`, 기본 포트 8001): YOLO UI 요소 검출
//! - 임베딩 (`POST /embed`, 8002): DINO 시각 임베딩
//! - 세그멘테이션 (`POST /segment`, 8003): SAM 마스크 + 클릭 좌표
//!
//! 각 서비스는 모델 제공자를 `State`로 공유하며, 모델을 로드할 수 없으면
//! mock 응답으로 폴백한다.

pub mod error;
pub mod handlers;
pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub use handlers::detect::DetectState;
pub use handlers::embed::EmbedState;
pub use handlers::segment::SegmentState;

/// 포트 바인드 최대 시도 횟수
const MAX_PORT_ATTEMPTS: u16 = 10;

/// 추론 서비스 서버
pub struct InferenceServer {
    /// 서비스 이름 (로그용)
    name: &'static str,
    host: String,
    port: u16,
    router: Router,
}

impl InferenceServer {
    /// 새 서버 생성
    pub fn new(name: &'static str, host: impl Into<String>, port: u16, router: Router) -> Self {
        Self {
            name,
            host: host.into(),
            port,
            router,
        }
    }

    /// 서버 실행
    ///
    /// 설정 포트에서 시작하여, 포트가 이미 사용 중이면 다음 포트를 시도합니다.
    /// 최대 10개 포트를 시도한 후 실패하면 에러를 반환합니다.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = self
            .router
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let base_port = self.port;
        let mut last_error = None;

        for attempt in 0..MAX_PORT_ATTEMPTS {
            let port = base_port.saturating_add(attempt);

            // 포트 오버플로우 체크
            if port < base_port && attempt > 0 {
                break;
            }

            let addr: SocketAddr = match format!("{}:{}", self.host, port).parse() {
                Ok(a) => a,
                Err(e) => {
                    error!("잘못된 주소 {}:{} — {}", self.host, port, e);
                    continue;
                }
            };

            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        warn!("포트 {} 사용 불가, 대체 포트 {} 사용", base_port, port);
                    }
                    info!(service = self.name, "추론 서비스 시작: http://{}", addr);

                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            loop {
                                if *shutdown_rx.borrow() {
                                    info!("서비스 종료 신호 수신");
                                    break;
                                }
                                if shutdown_rx.changed().await.is_err() {
                                    break;
                                }
                            }
                        })
                        .await?;

                    info!(service = self.name, "추론 서비스 종료");
                    return Ok(());
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::AddrInUse {
                        warn!("포트 {} 이미 사용 중, 다음 포트 시도...", port);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "포트 {}-{} 모두 사용 불가",
                    base_port,
                    base_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
                ),
            )
        }))
    }

    /// 서버 URL
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use percept_vision::provider::ModelProvider;

    fn embed_router() -> Router {
        routes::embed_routes(EmbedState {
            provider: Arc::new(ModelProvider::unavailable("dino", "none")),
            model_name: "dino".to_string(),
            dimensions: 8,
        })
    }

    #[test]
    fn server_url() {
        let server = InferenceServer::new("embed", "0.0.0.0", 8002, embed_router());
        assert_eq!(server.url(), "http://0.0.0.0:8002");
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let (tx, rx) = watch::channel(false);
        let server = InferenceServer::new("embed", "127.0.0.1", 38_402, embed_router());
        let handle = tokio::spawn(server.run(rx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn port_overflow_protection() {
        let base_port: u16 = 65530;
        for attempt in 0..MAX_PORT_ATTEMPTS {
            let port = base_port.saturating_add(attempt);
            assert!(port >= base_port || port == u16::MAX);
        }
    }
}
