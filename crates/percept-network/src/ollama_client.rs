//! Ollama VLM 클라이언트.
//!
//! `POST /api/chat`에 스크린샷(base64)과 라벨링 프롬프트를 보내고
//! `message.content` 원문을 돌려준다. 스트리밍은 끄고 온도는 낮게 고정한다.
//! 응답 파싱은 호출자(`percept-vision::response_parser`) 책임이다.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, info, warn};

use percept_core::config::VlmConfig;
use percept_core::error::CoreError;
use percept_core::ports::vlm_client::VlmClient;

// ============================================================
// 응답 구조체
// ============================================================

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

// ============================================================
// OllamaVlmClient
// ============================================================

/// Ollama 채팅 API 클라이언트
#[derive(Debug, Clone)]
pub struct OllamaVlmClient {
    /// HTTP 클라이언트 (타임아웃 포함)
    http_client: reqwest::Client,
    /// 서버 기본 URL (예: `http://localhost:11434`)
    base_url: String,
    /// 사용 모델
    model: String,
    /// 모델 미설치 시 대체 모델
    fallback_model: Option<String>,
    /// 샘플링 온도
    temperature: f32,
}

impl OllamaVlmClient {
    /// 새 클라이언트 생성
    pub fn new(config: &VlmConfig) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        debug!(
            endpoint = %config.endpoint,
            model = %config.model,
            timeout = config.timeout_secs,
            "OllamaVlmClient 초기화"
        );

        Ok(Self {
            http_client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            temperature: config.temperature,
        })
    }

    /// 설치된 모델 이름 목록 (`GET /api/tags`)
    pub async fn list_models(&self) -> Result<Vec<String>, CoreError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http_client.get(&url).send().await.map_err(|e| {
            CoreError::Network(format!("Ollama 연결 실패 ({}): {} (ollama serve 실행 여부 확인)", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Vlm(format!("모델 목록 조회 실패 ({})", status)));
        }
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Vlm(format!("모델 목록 파싱 실패: {}", e)))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// 서버 연결을 확인하고 사용할 모델을 결정한다.
    ///
    /// 설정 모델이 없고 대체 모델 계열이 설치되어 있으면 대체 모델로 전환.
    /// 둘 다 없으면 경고만 남기고 설정 모델을 유지한다 (`ollama pull` 안내).
    pub async fn resolve_model(&mut self) -> Result<String, CoreError> {
        let available = self.list_models().await?;
        info!(
            count = available.len(),
            models = ?available.iter().take(5).collect::<Vec<_>>(),
            "Ollama 연결됨"
        );

        match choose_model(&available, &self.model, self.fallback_model.as_deref()) {
            Some(chosen) if chosen != self.model => {
                warn!(model = %self.model, fallback = %chosen, "모델 미설치, 대체 모델 사용");
                self.model = chosen;
            }
            Some(_) => {}
            None => warn!(model = %self.model, "모델 미설치: ollama pull {}", self.model),
        }
        Ok(self.model.clone())
    }

    /// 채팅 요청 본문
    fn build_request(&self, prompt: &str, image_b64: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": prompt,
                "images": [image_b64]
            }],
            "stream": false,
            "options": {
                "temperature": self.temperature
            }
        })
    }

    /// 채팅 응답에서 `message.content` 추출 (없으면 빈 문자열)
    fn parse_chat_response(body: &str) -> Result<String, CoreError> {
        let response: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| CoreError::Vlm(format!("VLM 응답 JSON 파싱 실패: {}", e)))?;

        Ok(response
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

/// 설치 목록에서 사용할 모델 선택.
///
/// 이름 부분 일치로 비교하며, 대체 모델은 `:` 앞 계열명(`llava`)으로 찾는다.
fn choose_model(available: &[String], primary: &str, fallback: Option<&str>) -> Option<String> {
    if available.iter().any(|m| m.contains(primary)) {
        return Some(primary.to_string());
    }
    let fallback = fallback?;
    let family = fallback.split(':').next().unwrap_or(fallback);
    available
        .iter()
        .any(|m| m.contains(family))
        .then(|| fallback.to_string())
}

#[async_trait]
impl VlmClient for OllamaVlmClient {
    async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, CoreError> {
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %self.model, image_bytes = image.len(), "VLM 호출");

        let response = self
            .http_client
            .post(&url)
            .json(&self.build_request(prompt, &image_b64))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Network(format!("VLM 요청 타임아웃: {}", e))
                } else {
                    CoreError::Network(format!("VLM 호출 실패: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("VLM 응답 읽기 실패: {}", e)))?;

        if !status.is_success() {
            warn!(status = %status, "VLM 오류 응답");
            return Err(CoreError::Vlm(format!(
                "VLM 오류 ({}): {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let content = Self::parse_chat_response(&body)?;
        debug!(chars = content.len(), "VLM 응답 수신");
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================
// 테스트
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(url: &str) -> VlmConfig {
        VlmConfig {
            endpoint: url.to_string(),
            timeout_secs: 5,
            ..VlmConfig::default()
        }
    }

    #[test]
    fn request_body_shape() {
        let client = OllamaVlmClient::new(&VlmConfig::default()).unwrap();
        let body = client.build_request("label this", "aGVsbG8=");
        assert_eq!(body["model"], "openbmb/minicpm-v2.6:latest");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["images"][0], "aGVsbG8=");
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn parse_chat_response_variants() {
        let body = r#"{"message": {"role": "assistant", "content": "[{\"class\": \"Pot\"}]"}}"#;
        assert_eq!(
            OllamaVlmClient::parse_chat_response(body).unwrap(),
            r#"[{"class": "Pot"}]"#
        );
        assert_eq!(OllamaVlmClient::parse_chat_response("{}").unwrap(), "");
        assert!(OllamaVlmClient::parse_chat_response("not json").is_err());
    }

    #[test]
    fn choose_model_prefers_primary_then_family() {
        let available = vec!["llava:13b".to_string(), "mistral:7b".to_string()];
        assert_eq!(
            choose_model(&available, "llava:13b", Some("llava:7b")).as_deref(),
            Some("llava:13b")
        );
        assert_eq!(
            choose_model(&available, "minicpm-v", Some("llava:7b")).as_deref(),
            Some("llava:7b")
        );
        assert_eq!(choose_model(&available, "minicpm-v", None), None);
        assert_eq!(choose_model(&[], "minicpm-v", Some("llava:7b")), None);
    }

    #[tokio::test]
    async fn complete_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "openbmb/minicpm-v2.6:latest",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":{"role":"assistant","content":"[]"},"done":true}"#)
            .create_async()
            .await;

        let client = OllamaVlmClient::new(&config_for(&server.url())).unwrap();
        let content = client.complete(&[1, 2, 3], "find buttons").await.unwrap();
        assert_eq!(content, "[]");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn complete_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("model crashed")
            .create_async()
            .await;

        let client = OllamaVlmClient::new(&config_for(&server.url())).unwrap();
        let err = client.complete(&[0], "p").await.unwrap_err();
        assert!(matches!(err, CoreError::Vlm(msg) if msg.contains("model crashed")));
    }

    #[tokio::test]
    async fn complete_unreachable_is_network_error() {
        // 사용하지 않는 포트
        let client = OllamaVlmClient::new(&config_for("http://127.0.0.1:9")).unwrap();
        let err = client.complete(&[0], "p").await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }

    #[tokio::test]
    async fn resolve_model_switches_to_fallback() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"models":[{"name":"llava:7b","size":1},{"name":"qwen2:7b"}]}"#)
            .create_async()
            .await;

        let mut client = OllamaVlmClient::new(&config_for(&server.url())).unwrap();
        let model = client.resolve_model().await.unwrap();
        assert_eq!(model, "llava:7b");
        assert_eq!(client.model(), "llava:7b");
        mock.assert_async().await;
    }
}
