//! 시뮬레이터 스크린샷 캡처.
//!
//! `xcrun simctl io <device> screenshot`으로 캡처하고 `osascript`로
//! 탭/키 입력을 보낸다. 캡처 절차는 JSON으로 기술하는 [`CaptureScript`]이며
//! 탭 좌표는 화면 대비 비율로 적는다.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use percept_core::config::CaptureConfig;
use percept_core::error::CoreError;
use percept_core::ports::simulator::SimulatorDriver;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

/// macOS 가상 키코드: Return
const RETURN_KEY_CODE: u8 = 36;

// ============================================================
// xcrun + osascript 드라이버
// ============================================================

/// iOS Simulator 드라이버
pub struct XcrunSimulator {
    device_id: String,
    output_dir: PathBuf,
    window_offset: (i32, i32),
    action_delay: Duration,
    counter: AtomicUsize,
}

impl XcrunSimulator {
    /// 설정에서 생성 (출력 디렉토리 생성 포함)
    pub fn from_config(config: &CaptureConfig) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(Self {
            device_id: config.device_id.clone(),
            output_dir: config.output_dir.clone(),
            window_offset: (config.window_offset_x, config.window_offset_y),
            action_delay: Duration::from_millis(config.action_delay_ms),
            counter: AtomicUsize::new(0),
        })
    }

    /// 다음 스크린샷 경로 (`{name}_{n:03}.png`, n은 1부터)
    fn next_path(&self, name: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.output_dir.join(format!("{name}_{n:03}.png"))
    }

    async fn osascript(&self, script: &str) -> Result<(), CoreError> {
        run("osascript", &["-e", script]).await
    }
}

#[async_trait]
impl SimulatorDriver for XcrunSimulator {
    async fn screenshot(&self, name: &str) -> Result<PathBuf, CoreError> {
        let path = self.next_path(name);
        let path_str = path.to_string_lossy().into_owned();
        run(
            "xcrun",
            &["simctl", "io", &self.device_id, "screenshot", &path_str],
        )
        .await?;
        info!(path = %path.display(), "스크린샷 캡처");
        Ok(path)
    }

    async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError> {
        let (wx, wy) = (x + self.window_offset.0, y + self.window_offset.1);
        self.osascript(&tap_script(wx, wy)).await?;
        tokio::time::sleep(self.action_delay).await;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), CoreError> {
        let script = format!(
            "tell application \"System Events\"\n    keystroke \"{}\"\nend tell",
            escape_applescript(text)
        );
        self.osascript(&script).await?;
        tokio::time::sleep(self.action_delay).await;
        Ok(())
    }

    async fn press_return(&self) -> Result<(), CoreError> {
        let script = format!(
            "tell application \"System Events\"\n    key code {RETURN_KEY_CODE}\nend tell"
        );
        self.osascript(&script).await?;
        tokio::time::sleep(self.action_delay).await;
        Ok(())
    }
}

/// 시뮬레이터 창 좌표 클릭 스크립트
fn tap_script(x: i32, y: i32) -> String {
    format!(
        "tell application \"Simulator\" to activate\ndelay 0.3\n\
         tell application \"System Events\"\n    tell process \"Simulator\"\n        click at {{{x}, {y}}}\n    end tell\nend tell"
    )
}

/// AppleScript 문자열 리터럴 이스케이프
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// 외부 명령 실행, 실패 시 stderr 포함 에러
async fn run(program: &str, args: &[&str]) -> Result<(), CoreError> {
    debug!(program, ?args, "외부 명령 실행");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| CoreError::process(program, e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoreError::process(
            program,
            format!("{} — {}", output.status, stderr.trim()),
        ));
    }
    Ok(())
}

// ============================================================
// 캡처 스크립트
// ============================================================

/// 캡처 단계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CaptureStep {
    /// 스크린샷 (`{name}_{n:03}.png`)
    Screenshot { name: String },
    /// 화면 비율 좌표 탭 (0~1)
    Tap { x: f64, y: f64 },
    /// 텍스트 입력
    Type { text: String },
    /// Return 키
    Return,
    /// 대기
    Wait { ms: u64 },
    /// 하위 단계 반복
    Repeat { times: usize, steps: Vec<CaptureStep> },
}

/// 캡처 스크립트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureScript {
    pub steps: Vec<CaptureStep>,
}

impl CaptureScript {
    /// JSON 파일에서 로드
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// 로그인 → 로비 → 게임 화면 기본 절차
    pub fn login_to_game() -> Self {
        use CaptureStep::*;
        let shot = |name: &str| Screenshot {
            name: name.to_string(),
        };
        Self {
            steps: vec![
                shot("01_login_screen"),
                Tap { x: 0.5, y: 0.54 },
                Wait { ms: 500 },
                Type {
                    text: "demo".to_string(),
                },
                shot("02_login_username"),
                Tap { x: 0.5, y: 0.64 },
                Wait { ms: 500 },
                Type {
                    text: "pw".to_string(),
                },
                shot("03_login_password"),
                Tap { x: 0.5, y: 0.72 },
                Wait { ms: 2000 },
                shot("04_lobby"),
                Wait { ms: 1000 },
                shot("05_lobby_games"),
                Repeat {
                    times: 3,
                    steps: vec![shot("07_lobby_state"), Wait { ms: 500 }],
                },
                Repeat {
                    times: 5,
                    steps: vec![shot("08_game_state"), Wait { ms: 1000 }],
                },
            ],
        }
    }

    /// 반복 단계를 펼친 실행 순서
    pub fn flatten(&self) -> Vec<&CaptureStep> {
        let mut out = Vec::new();
        flatten_into(&self.steps, &mut out);
        out
    }
}

fn flatten_into<'a>(steps: &'a [CaptureStep], out: &mut Vec<&'a CaptureStep>) {
    for step in steps {
        match step {
            CaptureStep::Repeat { times, steps } => {
                for _ in 0..*times {
                    flatten_into(steps, out);
                }
            }
            other => out.push(other),
        }
    }
}

/// 캡처 실행기
pub struct CaptureRunner {
    driver: Arc<dyn SimulatorDriver>,
    screen: (u32, u32),
}

impl CaptureRunner {
    /// `screen`: 시뮬레이터 화면 크기 (포인트)
    pub fn new(driver: Arc<dyn SimulatorDriver>, screen: (u32, u32)) -> Self {
        Self { driver, screen }
    }

    /// 스크립트 실행, 저장된 스크린샷 경로 반환. 첫 실패에서 중단.
    pub async fn run(&self, script: &CaptureScript) -> Result<Vec<PathBuf>, CoreError> {
        let mut shots = Vec::new();
        for step in script.flatten() {
            match step {
                CaptureStep::Screenshot { name } => shots.push(self.driver.screenshot(name).await?),
                CaptureStep::Tap { x, y } => {
                    let (px, py) = self.to_points(*x, *y);
                    self.driver.tap(px, py).await?;
                }
                CaptureStep::Type { text } => self.driver.type_text(text).await?,
                CaptureStep::Return => self.driver.press_return().await?,
                CaptureStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
                CaptureStep::Repeat { .. } => {}
            }
        }
        info!(screenshots = shots.len(), "캡처 스크립트 완료");
        Ok(shots)
    }

    /// 화면 비율 → 포인트 (내림)
    fn to_points(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (f64::from(self.screen.0) * x.clamp(0.0, 1.0)) as i32,
            (f64::from(self.screen.1) * y.clamp(0.0, 1.0)) as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SimulatorDriver for RecordingDriver {
        async fn screenshot(&self, name: &str) -> Result<PathBuf, CoreError> {
            self.events.lock().unwrap().push(format!("shot:{name}"));
            Ok(PathBuf::from(format!("{name}.png")))
        }

        async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError> {
            self.events.lock().unwrap().push(format!("tap:{x},{y}"));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> Result<(), CoreError> {
            self.events.lock().unwrap().push(format!("type:{text}"));
            Ok(())
        }

        async fn press_return(&self) -> Result<(), CoreError> {
            self.events.lock().unwrap().push("return".to_string());
            Ok(())
        }
    }

    #[test]
    fn flatten_expands_repeats() {
        let script = CaptureScript::login_to_game();
        let shots = script
            .flatten()
            .into_iter()
            .filter(|s| matches!(s, CaptureStep::Screenshot { .. }))
            .count();
        assert_eq!(shots, 5 + 3 + 5);
    }

    #[test]
    fn script_json_roundtrip() {
        let json = r#"{"steps":[
            {"action":"tap","x":0.5,"y":0.54},
            {"action":"type","text":"demo"},
            {"action":"return"},
            {"action":"repeat","times":2,"steps":[{"action":"screenshot","name":"game"}]}
        ]}"#;
        let script: CaptureScript = serde_json::from_str(json).unwrap();
        assert_eq!(script.steps.len(), 4);
        assert_eq!(script.flatten().len(), 5);
    }

    #[tokio::test]
    async fn runner_converts_fractions_to_points() {
        let driver = Arc::new(RecordingDriver::default());
        let runner = CaptureRunner::new(driver.clone(), (430, 932));
        let script = CaptureScript {
            steps: vec![
                CaptureStep::Tap { x: 0.5, y: 0.54 },
                CaptureStep::Type {
                    text: "demo".to_string(),
                },
                CaptureStep::Return,
                CaptureStep::Screenshot {
                    name: "login".to_string(),
                },
            ],
        };
        let shots = runner.run(&script).await.unwrap();
        assert_eq!(shots, vec![PathBuf::from("login.png")]);
        assert_eq!(
            *driver.events.lock().unwrap(),
            vec!["tap:215,503", "type:demo", "return", "shot:login"]
        );
    }

    #[test]
    fn screenshot_names_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaptureConfig {
            output_dir: dir.path().to_path_buf(),
            ..CaptureConfig::default()
        };
        let sim = XcrunSimulator::from_config(&config).unwrap();
        assert!(sim.next_path("01_login").ends_with("01_login_001.png"));
        assert!(sim.next_path("04_lobby").ends_with("04_lobby_002.png"));
    }

    #[test]
    fn applescript_escaping() {
        assert_eq!(escape_applescript(r#"a"b\c"#), r#"a\"b\\c"#);
        assert!(tap_script(265, 583).contains("click at {265, 583}"));
    }
}
