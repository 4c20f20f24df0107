//! 데이터셋 도구 통합 테스트.
//!
//! 템플릿 라벨링 → 검증 → 스테이징, 합성 카드 데이터셋 → 검증.

use std::fs;

use percept_core::config::SynthConfig;
use percept_core::models::vocabulary::{ClassVocabulary, VocabularyPreset};
use percept_vision::dataset::{census, list_images, stage_labels};
use percept_vision::label_store::LabelStore;
use percept_vision::synth::{load_cards, CardSynthesizer, ThreadSampler, DESCRIPTOR_FILE};
use percept_vision::template::{TemplateLabeler, TemplateLayout};
use percept_vision::validator::LabelValidator;

#[test]
fn template_labels_validate_and_stage() {
    let root = tempfile::tempdir().unwrap();
    let images = root.path().join("images");
    let labels = root.path().join("labels");
    fs::create_dir_all(&images).unwrap();
    for name in [
        "game_preflop_01.png",
        "game_flop_02.png",
        "game_turn_03.png",
        "game_river_04.png",
        "deal_again_05.png",
    ] {
        fs::write(images.join(name), b"").unwrap();
    }

    let layout = TemplateLayout::rive();
    let vocabulary = ClassVocabulary::preset(layout.vocabulary);
    let labeler = TemplateLabeler::new(layout, LabelStore::open(&labels).unwrap()).unwrap();
    let summary = labeler.run(&images).unwrap();
    assert_eq!(summary.written, 5);
    assert_eq!(summary.defaulted, 0);
    assert_eq!(summary.per_state.get("action"), Some(&1));

    let store = LabelStore::open(&labels).unwrap();
    let flop = store.read("game_flop_02").unwrap();
    let river = store.read("game_river_04").unwrap();
    assert_eq!(river.len(), flop.len() + 2);

    let report = LabelValidator::new(vocabulary).validate_dir(&labels).unwrap();
    assert!(report.is_clean(), "{:?}", report.issues);
    assert_eq!(report.files, 5);

    assert_eq!(stage_labels(&labels, &images).unwrap(), 5);
    assert!(!images.join("classes.txt").exists());
    // 이미 스테이징된 파일은 다시 복사하지 않음
    assert_eq!(stage_labels(&labels, &images).unwrap(), 0);

    let census = census(&images, &labels).unwrap();
    assert_eq!(census.images, 5);
    assert_eq!(census.labeled, 5);
}

#[test]
fn synthetic_cards_produce_valid_dataset() {
    let root = tempfile::tempdir().unwrap();
    let cards_dir = root.path().join("cards");
    fs::create_dir_all(&cards_dir).unwrap();
    for name in ["ace_of_spades", "10_of_hearts", "card_back"] {
        image::RgbaImage::from_pixel(40, 56, image::Rgba([250, 250, 250, 255]))
            .save(cards_dir.join(format!("{name}.png")))
            .unwrap();
    }

    let vocabulary = ClassVocabulary::preset(VocabularyPreset::Cards);
    let cards = load_cards(&cards_dir, &vocabulary).unwrap();
    assert_eq!(cards.len(), 3);

    let settings = SynthConfig {
        cards_dir,
        output_dir: root.path().join("out"),
        num_images: 4,
        canvas_width: 320,
        canvas_height: 480,
        ..SynthConfig::default()
    };
    let out = settings.output_dir.clone();
    let summary = CardSynthesizer::new(settings, cards, ThreadSampler)
        .generate(&out)
        .unwrap();

    assert_eq!(summary.images, 4);
    assert_eq!(list_images(&out.join("images")).unwrap().len(), 4);
    assert_eq!(summary.descriptor, out.join(DESCRIPTOR_FILE));
    let yaml = fs::read_to_string(&summary.descriptor).unwrap();
    assert!(yaml.contains("nc: 53"));

    let report = LabelValidator::new(vocabulary)
        .validate_dir(&out.join("labels"))
        .unwrap();
    assert!(report.is_clean(), "{:?}", report.issues);
    assert_eq!(report.valid, summary.cards_placed);
}
