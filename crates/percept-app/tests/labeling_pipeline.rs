//! 라벨링 파이프라인 통합 테스트.
//!
//! mock Ollama 서버 → VLM 클라이언트 → 자동 라벨러 → 라벨 검증 → 디스크립터.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use percept_core::config::VlmConfig;
use percept_core::models::profile::LabelingProfile;
use percept_network::ollama_client::OllamaVlmClient;
use percept_vision::auto_labeler::AutoLabeler;
use percept_vision::dataset::{census, DatasetDescriptor};
use percept_vision::label_store::LabelStore;
use percept_vision::validator::LabelValidator;

fn chat_reply(content: &str) -> String {
    serde_json::json!({
        "model": "llava:7b",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
    .to_string()
}

fn vlm_config(endpoint: String) -> VlmConfig {
    VlmConfig {
        endpoint,
        model: "llava:7b".to_string(),
        fallback_model: None,
        timeout_secs: 5,
        request_delay_ms: 0,
        ..VlmConfig::default()
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    image::RgbImage::new(width, height).save(path).unwrap();
}

#[tokio::test]
async fn ollama_labels_flow_into_valid_dataset() {
    let mut server = mockito::Server::new_async().await;
    let chat = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_reply(
            "Here are the elements:\n```json\n[\
             {\"class\": \"Fold Button\", \"x\": 0.14, \"y\": 0.82, \"w\": 0.14, \"h\": 0.05},\
             {\"class\": \"Pot\", \"x\": \"0.5\", \"y\": 0.42, \"w\": 0.18, \"h\": 0.06},\
             {\"class\": \"player avatar\", \"x\": 0.5, \"y\": 0.1, \"w\": 0.1, \"h\": 0.1}\
             ]\n```",
        ))
        .expect(2)
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    let images = root.path().join("images");
    let labels = root.path().join("labels");
    fs::create_dir_all(&images).unwrap();
    for name in ["hand_001.png", "hand_002.png"] {
        write_png(&images.join(name), 43, 93);
    }

    let client = OllamaVlmClient::new(&vlm_config(server.url())).unwrap();
    let profile = LabelingProfile::legacy();
    let vocabulary = profile.vocabulary.clone();
    let labeler = AutoLabeler::new(
        Arc::new(client),
        profile,
        LabelStore::open(&labels).unwrap(),
    );

    let summary = labeler.run(&images).await.unwrap();
    chat.assert_async().await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.labeled, 2);
    assert_eq!(summary.detections, 4);

    let text = fs::read_to_string(labels.join("hand_001.txt")).unwrap();
    assert_eq!(
        text,
        "0 0.140000 0.820000 0.140000 0.050000\n8 0.500000 0.420000 0.180000 0.060000"
    );

    let report = LabelValidator::new(vocabulary.clone())
        .validate_dir(&labels)
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.files, 2);
    assert_eq!(report.valid, 4);

    let descriptor = root.path().join("data.yaml");
    DatasetDescriptor::for_images_dir(&images, vocabulary)
        .write(&descriptor)
        .unwrap();
    let yaml = fs::read_to_string(&descriptor).unwrap();
    assert!(yaml.contains("nc: 11"));
    assert!(yaml.contains("  0: \"btn_fold\""));

    let census = census(&images, &labels).unwrap();
    assert_eq!(census.labeled, 2);
    assert!(!census.is_sparse());
}

#[tokio::test]
async fn server_errors_become_empty_label_files() {
    let mut server = mockito::Server::new_async().await;
    let _chat = server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("model crashed")
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    write_png(&root.path().join("table.png"), 10, 10);
    let labels = root.path().join("labels");

    let client = OllamaVlmClient::new(&vlm_config(server.url())).unwrap();
    let labeler = AutoLabeler::new(
        Arc::new(client),
        LabelingProfile::rive(),
        LabelStore::open(&labels).unwrap(),
    );

    let summary = labeler.run(root.path()).await.unwrap();
    assert_eq!(summary.empty, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(fs::read_to_string(labels.join("table.txt")).unwrap(), "");

    // 재실행 시 빈 파일도 기존 라벨로 취급
    let again = labeler.run(root.path()).await.unwrap();
    assert_eq!(again.skipped, 1);
}

#[tokio::test]
async fn pixel_profile_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _chat = server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(chat_reply(
            r#"[{"class": "button", "bbox": [100, 200, 50, 40], "confidence": 0.9},
                {"class": "avatar", "bbox": [10, 10, 20, 20]}]"#,
        ))
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    write_png(&root.path().join("lobby.png"), 200, 400);
    let labels = root.path().join("labels");

    let client = OllamaVlmClient::new(&vlm_config(server.url())).unwrap();
    let labeler = AutoLabeler::new(
        Arc::new(client),
        LabelingProfile::widget(),
        LabelStore::open(&labels).unwrap(),
    );

    let summary = labeler.run(root.path()).await.unwrap();
    assert_eq!(summary.detections, 1);
    let text = fs::read_to_string(labels.join("lobby.txt")).unwrap();
    assert_eq!(text, "0 0.500000 0.500000 0.250000 0.100000");
}
