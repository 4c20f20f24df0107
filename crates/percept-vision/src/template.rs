//! 템플릿 위치 라벨링.
//!
//! UI 요소 위치가 고정된 화면은 VLM 없이 파일명만으로 화면 상태를 판별하고
//! 미리 정의된 위치를 라벨로 쓴다. 레이아웃은 JSON으로 불러올 수 있으며
//! `legacy`, `rive` 두 가지를 내장한다.

use std::collections::BTreeMap;
use std::path::Path;

use percept_core::error::CoreError;
use percept_core::models::detection::NormalizedLabel;
use percept_core::models::rules::{RuleTable, SubstringMatch};
use percept_core::models::vocabulary::{ClassVocabulary, VocabularyPreset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::list_images;
use crate::label_store::{image_stem, LabelStore, WriteOutcome};

/// 고정 위치 요소 (비율 좌표)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// 정규 클래스명
    pub class: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Placement {
    fn new(class: &str, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            class: class.to_string(),
            x,
            y,
            w,
            h,
        }
    }
}

/// 화면 상태별 요소 목록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenState {
    pub name: String,
    pub elements: Vec<Placement>,
}

/// 파일명 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    /// 화면 상태 이름
    pub state: &'a str,
    /// 규칙에 맞지 않아 기본 상태로 떨어졌는지
    pub defaulted: bool,
}

/// 템플릿 레이아웃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLayout {
    pub name: String,
    /// 라벨 ID를 매길 어휘
    pub vocabulary: VocabularyPreset,
    /// 소문자 파일명 → 상태 이름 (순서 = 우선순위)
    pub state_rules: RuleTable<String>,
    /// 규칙 미일치 시 상태
    pub default_state: String,
    pub states: Vec<ScreenState>,
}

impl TemplateLayout {
    /// 내장 레이아웃 (`legacy`, `rive`)
    pub fn builtin(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_lowercase().as_str() {
            "legacy" => Ok(Self::legacy()),
            "rive" => Ok(Self::rive()),
            other => Err(CoreError::not_found("TemplateLayout", other)),
        }
    }

    /// JSON 파일에서 레이아웃 로드 후 검증
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        let layout: Self = serde_json::from_str(&text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// 레거시 11-클래스 화면 (430x932 기준, 하단 4버튼)
    pub fn legacy() -> Self {
        let pot = Placement::new("pot_amount", 0.5, 0.720, 0.20, 0.080);
        let holes = [0.42, 0.58].map(|x| Placement::new("hole_card", x, 0.830, 0.12, 0.13));
        let board: Vec<Placement> = [0.26, 0.38, 0.50, 0.62, 0.74]
            .iter()
            .map(|&x| Placement::new("board_card", x, 0.610, 0.10, 0.11))
            .collect();

        let mut action = vec![
            Placement::new("btn_fold", 0.128, 0.970, 0.22, 0.045),
            Placement::new("btn_check_call", 0.372, 0.970, 0.22, 0.045),
            Placement::new("btn_raise", 0.616, 0.970, 0.22, 0.045),
            Placement::new("btn_all_in", 0.860, 0.970, 0.22, 0.045),
            Placement::new("bet_slider", 0.5, 0.920, 0.85, 0.035),
            pot.clone(),
        ];
        action.extend(holes.iter().cloned());
        action.extend(board[..4].iter().cloned());

        let mut deal_again = vec![
            Placement::new("btn_deal_again", 0.5, 0.970, 0.90, 0.050),
            Placement::new("winner_banner", 0.5, 0.560, 0.80, 0.045),
            pot,
        ];
        deal_again.extend(holes.iter().cloned());
        deal_again.extend(board.iter().cloned());

        let mut rules = RuleTable::default();
        rules.push(SubstringMatch::any(&["deal_again"]), "deal_again".to_string());
        rules.push(SubstringMatch::any(&["action"]), "action".to_string());

        Self {
            name: "legacy".to_string(),
            vocabulary: VocabularyPreset::Legacy,
            state_rules: rules,
            default_state: "action".to_string(),
            states: vec![
                ScreenState {
                    name: "action".to_string(),
                    elements: action,
                },
                ScreenState {
                    name: "deal_again".to_string(),
                    elements: deal_again,
                },
            ],
        }
    }

    /// Rive 9-클래스 화면 (440x956 탭 좌표 기준)
    ///
    /// check/call은 같은 위치이므로 액션 화면은 `btn_call`로 표기한다.
    pub fn rive() -> Self {
        let pot = Placement::new("pot_amount", 0.5, 0.42, 0.18, 0.06);
        let holes = [0.42, 0.58].map(|x| Placement::new("hole_card", x, 0.73, 0.10, 0.10));
        let board: Vec<Placement> = [0.26, 0.38, 0.50, 0.62, 0.74]
            .iter()
            .map(|&x| Placement::new("board_card", x, 0.50, 0.08, 0.09))
            .collect();

        let mut action = vec![
            Placement::new("btn_fold", 0.1364, 0.8159, 0.14, 0.055),
            Placement::new("btn_call", 0.1364, 0.7113, 0.14, 0.055),
            Placement::new("btn_raise", 0.4318, 0.7113, 0.18, 0.055),
            Placement::new("bet_slider", 0.5, 0.85, 0.80, 0.03),
            pot.clone(),
        ];
        action.extend(holes.iter().cloned());

        let mut deal_again = vec![Placement::new("btn_deal", 0.5, 0.5753, 0.40, 0.055), pot];
        deal_again.extend(holes.iter().cloned());

        let with_board = |n: usize| {
            let mut elements = action.clone();
            elements.extend(board[..n].iter().cloned());
            elements
        };
        let states = vec![
            ScreenState {
                name: "flop".to_string(),
                elements: with_board(3),
            },
            ScreenState {
                name: "turn".to_string(),
                elements: with_board(4),
            },
            ScreenState {
                name: "river".to_string(),
                elements: with_board(5),
            },
            ScreenState {
                name: "deal_again".to_string(),
                elements: deal_again,
            },
            ScreenState {
                name: "action".to_string(),
                elements: action.clone(),
            },
        ];

        let mut rules = RuleTable::default();
        rules.push(
            SubstringMatch::all_and_any(&["deal"], &["again", "end"]),
            "deal_again".to_string(),
        );
        // "preflop"은 "flop"을 포함하므로 먼저 처리
        rules.push(SubstringMatch::any(&["pre_flop", "preflop"]), "action".to_string());
        rules.push(SubstringMatch::any(&["river"]), "river".to_string());
        rules.push(SubstringMatch::any(&["turn"]), "turn".to_string());
        rules.push(SubstringMatch::any(&["flop"]), "flop".to_string());
        rules.push(
            SubstringMatch::any(&["dealt", "start", "action"]),
            "action".to_string(),
        );

        Self {
            name: "rive".to_string(),
            vocabulary: VocabularyPreset::Rive,
            state_rules: rules,
            default_state: "action".to_string(),
            states,
        }
    }

    /// 레이아웃 일관성 검사: 상태 참조, 클래스명, 좌표 범위
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.state(&self.default_state).is_none() {
            return Err(CoreError::validation(
                "default_state",
                format!("정의되지 않은 상태: {}", self.default_state),
            ));
        }
        if let Some(target) = self.state_rules.results().find(|t| self.state(t).is_none()) {
            return Err(CoreError::validation(
                "state_rules",
                format!("규칙이 정의되지 않은 상태를 가리킴: {target}"),
            ));
        }
        let vocabulary = ClassVocabulary::preset(self.vocabulary);
        for state in &self.states {
            for p in &state.elements {
                let label = NormalizedLabel {
                    class_id: vocabulary.id_of(&p.class).ok_or_else(|| {
                        CoreError::validation(
                            "class",
                            format!("{} 상태의 클래스 '{}'가 어휘에 없음", state.name, p.class),
                        )
                    })?,
                    center_x: p.x,
                    center_y: p.y,
                    width: p.w,
                    height: p.h,
                };
                if !label.has_valid_geometry() {
                    return Err(CoreError::validation(
                        "placement",
                        format!("{} 상태의 '{}' 좌표 범위 오류", state.name, p.class),
                    ));
                }
            }
        }
        Ok(())
    }

    /// 상태 이름으로 조회
    pub fn state(&self, name: &str) -> Option<&ScreenState> {
        self.states.iter().find(|s| s.name == name)
    }

    /// 파일명으로 화면 상태 판별 (대소문자 무시)
    pub fn classify(&self, file_name: &str) -> Classification<'_> {
        let lowered = file_name.to_lowercase();
        match self.state_rules.first_match(&lowered) {
            Some(state) => Classification {
                state: state.as_str(),
                defaulted: false,
            },
            None => Classification {
                state: self.default_state.as_str(),
                defaulted: true,
            },
        }
    }

    /// 상태의 라벨 목록 (요소 순서 유지)
    pub fn labels_for_state(&self, state: &str) -> Result<Vec<NormalizedLabel>, CoreError> {
        let screen = self
            .state(state)
            .ok_or_else(|| CoreError::not_found("ScreenState", state))?;
        let vocabulary = ClassVocabulary::preset(self.vocabulary);
        screen
            .elements
            .iter()
            .map(|p| {
                let class_id = vocabulary
                    .id_of(&p.class)
                    .ok_or_else(|| CoreError::not_found("Class", p.class.as_str()))?;
                Ok(NormalizedLabel {
                    class_id,
                    center_x: p.x,
                    center_y: p.y,
                    width: p.w,
                    height: p.h,
                })
            })
            .collect()
    }
}

/// 템플릿 라벨링 실행 요약
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateSummary {
    /// 처리 대상 이미지 수
    pub total: usize,
    /// 기록한 라벨 파일 수
    pub written: usize,
    /// 기존 파일로 건너뛴 수
    pub skipped: usize,
    /// 상태별 이미지 수
    pub per_state: BTreeMap<String, usize>,
    /// 기본 상태로 떨어진 이미지 수
    pub defaulted: usize,
    /// 기록 실패 수
    pub failed: usize,
}

/// 템플릿 라벨러
pub struct TemplateLabeler {
    layout: TemplateLayout,
    store: LabelStore,
}

impl TemplateLabeler {
    /// 레이아웃 검증 후 생성
    pub fn new(layout: TemplateLayout, store: LabelStore) -> Result<Self, CoreError> {
        layout.validate()?;
        Ok(Self { layout, store })
    }

    /// 디렉토리의 모든 이미지 라벨링 후 `classes.txt` 기록
    pub fn run(&self, images_dir: &Path) -> Result<TemplateSummary, CoreError> {
        let images = list_images(images_dir)?;
        if images.is_empty() {
            warn!(dir = %images_dir.display(), "라벨링할 이미지 없음");
        }

        let mut summary = TemplateSummary {
            total: images.len(),
            ..Default::default()
        };

        for image in &images {
            let (Some(stem), Some(file_name)) = (
                image_stem(image),
                image.file_name().and_then(|n| n.to_str()),
            ) else {
                continue;
            };

            let class = self.layout.classify(file_name);
            *summary.per_state.entry(class.state.to_string()).or_insert(0) += 1;
            if class.defaulted {
                summary.defaulted += 1;
            }

            let labels = match self.layout.labels_for_state(class.state) {
                Ok(labels) => labels,
                Err(e) => {
                    warn!(stem = %stem, state = class.state, error = %e, "상태 라벨 조회 실패");
                    summary.failed += 1;
                    continue;
                }
            };
            match self.store.write(&stem, &labels) {
                Ok(WriteOutcome::Written(n)) => {
                    debug!(stem = %stem, state = class.state, labels = n, "템플릿 라벨 기록");
                    summary.written += 1;
                }
                Ok(WriteOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!(stem = %stem, error = %e, "라벨 기록 실패");
                    summary.failed += 1;
                }
            }
        }

        self.store
            .write_manifest(&ClassVocabulary::preset(self.layout.vocabulary))?;

        info!(
            layout = %self.layout.name,
            total = summary.total,
            written = summary.written,
            skipped = summary.skipped,
            defaulted = summary.defaulted,
            failed = summary.failed,
            "템플릿 라벨링 완료"
        );
        Ok(summary)
    }
}
