//! VLM(Vision-Language Model) 클라이언트 포트.
//!
//! 스크린샷 + 프롬프트를 보내 원문 응답 텍스트를 받는다.
//! 응답 파싱/정규화는 `percept-vision` 책임이다.

use async_trait::async_trait;

use crate::error::CoreError;

/// VLM 클라이언트
///
/// 구현체: `OllamaVlmClient` (`percept-network`)
#[async_trait]
pub trait VlmClient: Send + Sync {
    /// 이미지와 프롬프트로 VLM 호출, 응답 본문 텍스트 반환
    ///
    /// - `image`: 원본 이미지 바이트 (PNG/JPEG)
    /// - `prompt`: 라벨링 프롬프트
    async fn complete(&self, image: &[u8], prompt: &str) -> Result<String, CoreError>;

    /// 사용 중인 모델 이름
    fn model(&self) -> &str;
}
