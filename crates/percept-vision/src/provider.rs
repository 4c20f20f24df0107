//! 지연 로딩 모델 제공자.
//!
//! 서비스 시작 시 한 번 생성되어 axum `State`로 주입된다. 첫 요청에서
//! 블로킹 스레드로 모델을 로드하고 결과(성공/실패)를 고정한다.
//! 동시에 들어온 첫 요청들은 한 번의 로드를 공유한다.
//!
//! 상태: `Unloaded` → `Loaded` | `Unavailable(reason)`.
//! `Unavailable`이면 서비스는 mock 응답으로 폴백한다.

use std::fmt;
use std::sync::Arc;

use percept_core::error::CoreError;
use tokio::sync::OnceCell;
use tracing::{info, warn};

type Loader<B> = Arc<dyn Fn() -> Result<Arc<B>, CoreError> + Send + Sync>;

/// 제공자 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    /// 아직 로드 시도 전
    Unloaded,
    /// 실제 모델 사용 가능
    Loaded,
    /// 로드 불가 (mock 모드)
    Unavailable(String),
}

impl ProviderState {
    /// 실제 모델이 로드되었는지
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// 모델 제공자
pub struct ModelProvider<B: ?Sized + Send + Sync + 'static> {
    name: String,
    loader: Option<Loader<B>>,
    cell: OnceCell<Result<Arc<B>, String>>,
}

impl<B: ?Sized + Send + Sync + 'static> ModelProvider<B> {
    /// 지연 로더로 생성
    pub fn lazy<F>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<B>, CoreError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            loader: Some(Arc::new(loader)),
            cell: OnceCell::new(),
        }
    }

    /// 이미 로드된 백엔드로 생성
    pub fn loaded(name: impl Into<String>, backend: Arc<B>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            cell: OnceCell::new_with(Some(Ok(backend))),
        }
    }

    /// 처음부터 mock 모드
    pub fn unavailable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
            cell: OnceCell::new_with(Some(Err(reason.into()))),
        }
    }

    /// 제공자 이름 (로그/헬스체크용)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 백엔드 조회. 처음 호출 시 로드하며, 로드 불가면 `None`.
    pub async fn get(&self) -> Option<Arc<B>> {
        let result = self
            .cell
            .get_or_init(|| async {
                let Some(loader) = self.loader.clone() else {
                    return Err("로더 없음".to_string());
                };
                let outcome = match tokio::task::spawn_blocking(move || loader()).await {
                    Ok(Ok(backend)) => Ok(backend),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(e) => Err(format!("로드 태스크 실패: {e}")),
                };
                match &outcome {
                    Ok(_) => info!(provider = %self.name, "모델 로드 완료"),
                    Err(reason) => warn!(provider = %self.name, reason = %reason, "모델 로드 실패, mock 모드로 전환"),
                }
                outcome
            })
            .await;
        result.as_ref().ok().cloned()
    }

    /// 현재 상태 (로드를 유발하지 않음)
    pub fn state(&self) -> ProviderState {
        match self.cell.get() {
            None => ProviderState::Unloaded,
            Some(Ok(_)) => ProviderState::Loaded,
            Some(Err(reason)) => ProviderState::Unavailable(reason.clone()),
        }
    }

    /// 로드를 시도한 뒤 상태 반환
    pub async fn ensure_loaded(&self) -> ProviderState {
        self.get().await;
        self.state()
    }
}

impl<B: ?Sized + Send + Sync + 'static> fmt::Debug for ModelProvider<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProvider")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
