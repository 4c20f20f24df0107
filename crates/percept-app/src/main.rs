//! # percept-app
//!
//! Percept CLI 바이너리 진입점.
//! 설정 로드, 로깅 초기화, 파이프라인 명령과 추론 서비스 디스패치.

mod commands;
mod lifecycle;
mod services;
mod trainer;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use percept_core::config::AppConfig;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::services::ServiceKind;

/// Percept: UI 인식 데이터셋/추론 도구
///
/// 스크린샷 캡처, VLM/템플릿 라벨링, 라벨 검증, YOLO 학습, 추론 서비스
#[derive(Parser, Debug)]
#[command(name = "percept")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 percept.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// 데이터셋 경로 오버라이드 (라벨링 계열 명령 공통)
#[derive(clap::Args, Debug, Default)]
struct DatasetPaths {
    /// 라벨링 프로파일 / 어휘 (legacy, rive, widget)
    #[arg(long, short = 'p')]
    profile: Option<String>,

    /// 이미지 디렉토리
    #[arg(long)]
    images_dir: Option<PathBuf>,

    /// 라벨 디렉토리
    #[arg(long)]
    labels_dir: Option<PathBuf>,

    /// 데이터셋 디스크립터 (YAML)
    #[arg(long)]
    descriptor: Option<PathBuf>,
}

impl DatasetPaths {
    fn apply(&self, config: &mut AppConfig) {
        let labeling = &mut config.labeling;
        if let Some(profile) = &self.profile {
            labeling.profile = profile.clone();
        }
        if let Some(dir) = &self.images_dir {
            labeling.images_dir = dir.clone();
        }
        if let Some(dir) = &self.labels_dir {
            labeling.labels_dir = dir.clone();
        }
        if let Some(path) = &self.descriptor {
            labeling.dataset_descriptor = path.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 시뮬레이터 스크린샷 캡처
    Capture {
        /// 캡처 스크립트 (JSON). 없으면 내장 로그인→게임 스크립트
        #[arg(long)]
        script: Option<PathBuf>,

        /// 스크린샷 출력 디렉토리
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,
    },

    /// VLM 자동 라벨링
    Label {
        #[command(flatten)]
        paths: DatasetPaths,

        /// VLM 모델 이름
        #[arg(long, short = 'm')]
        model: Option<String>,

        /// 기존 라벨 덮어쓰기
        #[arg(long)]
        overwrite: bool,
    },

    /// 파일명 기반 템플릿 라벨링
    TemplateLabel {
        #[command(flatten)]
        paths: DatasetPaths,

        /// 레이아웃 파일 (JSON). 없으면 프로파일 이름의 내장 레이아웃
        #[arg(long)]
        layout: Option<PathBuf>,

        /// 기존 라벨 덮어쓰기
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// 라벨 형식 검증
    Validate {
        #[command(flatten)]
        paths: DatasetPaths,
    },

    /// 데이터셋 디스크립터/classes.txt 생성 및 현황
    Dataset {
        #[command(flatten)]
        paths: DatasetPaths,

        /// 라벨을 이미지 디렉토리로 복사
        #[arg(long)]
        stage: bool,
    },

    /// YOLO 학습 (외부 yolo CLI)
    Train {
        #[command(flatten)]
        paths: DatasetPaths,

        /// 학습 대신 주어진 가중치로 검증 실행
        #[arg(long)]
        validate_model: Option<PathBuf>,

        /// 라벨 검증 실패 무시
        #[arg(long, short = 'f')]
        force: bool,

        /// 에폭 수
        #[arg(long)]
        epochs: Option<u32>,

        /// 배치 크기
        #[arg(long)]
        batch: Option<u32>,
    },

    /// 합성 카드 데이터셋 생성
    Synth {
        /// 카드 이미지 디렉토리
        #[arg(long)]
        cards_dir: Option<PathBuf>,

        /// 출력 디렉토리
        #[arg(long, short = 'o')]
        output_dir: Option<PathBuf>,

        /// 생성 이미지 수
        #[arg(long, short = 'n')]
        num_images: Option<usize>,
    },

    /// 추론 서비스 실행
    Serve {
        #[arg(value_enum)]
        service: ServiceKind,

        /// 포트 (기본: 서비스별 설정값)
        #[arg(long)]
        port: Option<u16>,

        /// 바인드 호스트
        #[arg(long)]
        host: Option<String>,
    },

    /// 적용된 설정 출력 (JSON)
    Config,
}

/// 설정 로드 + 명령별 오버라이드
fn effective_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref()).context("설정 로드 실패")?;

    match &args.command {
        Command::Capture { output_dir, .. } => {
            if let Some(dir) = output_dir {
                config.capture.output_dir = dir.clone();
            }
        }
        Command::Label { paths, model, .. } => {
            paths.apply(&mut config);
            if let Some(model) = model {
                config.vlm.model = model.clone();
            }
        }
        Command::TemplateLabel { paths, .. }
        | Command::Validate { paths }
        | Command::Dataset { paths, .. } => paths.apply(&mut config),
        Command::Train {
            paths,
            epochs,
            batch,
            ..
        } => {
            paths.apply(&mut config);
            if let Some(epochs) = epochs {
                config.training.epochs = *epochs;
            }
            if let Some(batch) = batch {
                config.training.batch = *batch;
            }
        }
        Command::Synth {
            cards_dir,
            output_dir,
            num_images,
        } => {
            if let Some(dir) = cards_dir {
                config.synth.cards_dir = dir.clone();
            }
            if let Some(dir) = output_dir {
                config.synth.output_dir = dir.clone();
            }
            if let Some(n) = num_images {
                config.synth.num_images = *n;
            }
        }
        Command::Serve {
            service,
            port,
            host,
        } => {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                match service {
                    ServiceKind::Detect => config.detector.port = *port,
                    ServiceKind::Embed => config.embedding.port = *port,
                    ServiceKind::Segment => config.segmentation.port = *port,
                }
            }
        }
        Command::Config => {}
    }

    config.validate().context("설정 검증 실패")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "percept={},percept_app={},percept_core={},percept_vision={},percept_network={},percept_web={},tower_http={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = effective_config(&args)?;
    debug!(command = ?args.command, "명령 실행");

    match &args.command {
        Command::Capture { script, .. } => {
            commands::capture(&config, script.as_deref()).await?;
        }
        Command::Label { overwrite, .. } => {
            let summary = commands::label(&config, *overwrite).await?;
            if summary.labeled == 0 && summary.total > summary.skipped {
                info!("새로 라벨링된 이미지 없음");
            }
        }
        Command::TemplateLabel { layout, force, .. } => {
            commands::template_label(&config, layout.as_deref(), *force)?;
        }
        Command::Validate { .. } => {
            let report = commands::validate(&config)?;
            if !report.is_clean() {
                bail!("잘못된 라벨 {}줄", report.invalid);
            }
        }
        Command::Dataset { stage, .. } => {
            commands::dataset(&config, *stage)?;
        }
        Command::Train {
            validate_model,
            force,
            ..
        } => {
            commands::train(&config, *force, validate_model.as_deref()).await?;
        }
        Command::Synth { .. } => {
            commands::synth(&config)?;
        }
        Command::Serve { service, .. } => {
            services::serve(*service, &config).await?;
        }
        Command::Config => {
            if let Some(path) = AppConfig::default_path() {
                info!(path = %path.display(), "기본 설정 파일 위치");
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
