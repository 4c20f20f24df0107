//! 시각 임베딩 핸들러.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use percept_core::ports::inference::ImageEmbedder;
use percept_vision::mock::mock_embedding;
use percept_vision::provider::ModelProvider;
use percept_vision::synth::ThreadSampler;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{load_image, HealthResponse, RootResponse};
use crate::error::ApiError;

/// 임베딩 서비스 상태
#[derive(Clone)]
pub struct EmbedState {
    pub provider: Arc<ModelProvider<dyn ImageEmbedder>>,
    /// 설정상 모델 이름 (`/info`)
    pub model_name: String,
    /// mock 임베딩 차원
    pub dimensions: usize,
}

/// 임베딩 요청
#[derive(Debug, Default, Deserialize)]
pub struct EmbedRequest {
    pub image_path: Option<String>,
}

/// 임베딩 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
    pub dimensions: usize,
}

/// 모델 정보 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedInfo {
    pub model: String,
    pub dimensions: usize,
}

/// 이미지 임베딩 계산
///
/// POST /embed
pub async fn embed(
    State(state): State<EmbedState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let Some(image_path) = request.image_path.as_deref() else {
        return Err(ApiError::BadRequest("image_path 필드가 필요합니다".to_string()));
    };
    let image = load_image(Some(image_path), None).await?;

    let embedding = match state.provider.get().await {
        Some(embedder) => embedder.embed(&image.bytes).await?,
        None => {
            warn!(provider = %state.provider.name(), "임베딩 모델 없음, mock 응답");
            mock_embedding(state.dimensions, &mut ThreadSampler)
        }
    };

    Ok(Json(EmbedResponse {
        dimensions: embedding.len(),
        embedding,
    }))
}

/// 헬스체크
///
/// GET /health
pub async fn health(State(state): State<EmbedState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.provider.state().is_loaded()))
}

/// 모델 정보 (로드를 시도한다)
///
/// GET /info
pub async fn info(State(state): State<EmbedState>) -> Json<EmbedInfo> {
    let model = match state.provider.get().await {
        Some(embedder) => EmbedInfo {
            model: state.model_name.clone(),
            dimensions: embedder.dimensions(),
        },
        None => EmbedInfo {
            model: "mock".to_string(),
            dimensions: state.dimensions,
        },
    };
    Json(model)
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse::running("DINO Embedding"))
}
