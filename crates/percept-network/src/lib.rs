//! # percept-network
//!
//! 외부 HTTP 서비스 어댑터.
//! 현재는 Ollama 채팅 API로 스크린샷 라벨링을 요청하는 VLM 클라이언트를 제공한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use percept_network::ollama_client::OllamaVlmClient;
//!
//! let client = OllamaVlmClient::new(&config.vlm)?;
//! let model = client.resolve_model().await?;
//! ```

pub mod ollama_client;
