use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub counter: CounterConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CounterConfig {
    /// 腕上げ判定マージン（画像高さに対する比率）
    #[serde(default = "default_arm_raise_margin")]
    pub arm_raise_margin: f32,
    /// キャリブレーション時に足首/腰比へ掛ける安全係数
    #[serde(default = "default_calibration_margin")]
    pub calibration_margin: f32,
    /// キャリブレーション前の脚係数
    #[serde(default = "default_leg_factor")]
    pub default_leg_factor: f32,
}

fn default_arm_raise_margin() -> f32 { crate::tracker::classify::DEFAULT_ARM_RAISE_MARGIN }
fn default_calibration_margin() -> f32 { crate::tracker::calibrate::DEFAULT_CALIBRATION_MARGIN }
fn default_leg_factor() -> f32 { crate::tracker::calibrate::DEFAULT_LEG_FACTOR }

impl CounterConfig {
    /// 係数は有限かつ正、腕上げマージンは有限かつ 0 以上
    pub fn validate(&self) -> Result<()> {
        if !self.default_leg_factor.is_finite() || self.default_leg_factor <= 0.0 {
            bail!("counter.default_leg_factor must be positive, got {}", self.default_leg_factor);
        }
        if !self.calibration_margin.is_finite() || self.calibration_margin <= 0.0 {
            bail!("counter.calibration_margin must be positive, got {}", self.calibration_margin);
        }
        if !self.arm_raise_margin.is_finite() || self.arm_raise_margin < 0.0 {
            bail!("counter.arm_raise_margin must be non-negative, got {}", self.arm_raise_margin);
        }
        Ok(())
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            arm_raise_margin: default_arm_raise_margin(),
            calibration_margin: default_calibration_margin(),
            default_leg_factor: default_leg_factor(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    #[default]
    Single,
    Dual,
}

/// 映像ソース。数値ならカメラ番号、それ以外は動画ファイルのパス。
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SourceSpec {
    Camera(i32),
    File(PathBuf),
}

impl SourceSpec {
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<i32>() {
            Ok(index) => SourceSpec::Camera(index),
            Err(_) => SourceSpec::File(PathBuf::from(s)),
        }
    }
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec::Camera(0)
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Camera(index) => write!(f, "camera {}", index),
            SourceSpec::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default)]
    pub mode: TrackingMode,
    #[serde(default)]
    pub source: SourceSpec,
    /// 判定不能フレームがこの数だけ続いたらログに出す
    #[serde(default = "default_missing_warn_frames")]
    pub missing_warn_frames: u32,
    #[serde(default)]
    pub verbose: bool,
}

fn default_missing_warn_frames() -> u32 { 30 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::default(),
            source: SourceSpec::default(),
            missing_warn_frames: default_missing_warn_frames(),
            verbose: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default = "default_input_size")]
    pub input_size: i32,
    /// これ未満の visibility の点は欠損扱い
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
}

fn default_model_path() -> String { "models/pose_landmark_full.onnx".to_string() }
fn default_input_name() -> String { "input_1".to_string() }
fn default_output_name() -> String { "Identity".to_string() }
fn default_input_size() -> i32 { 256 }
fn default_visibility_threshold() -> f32 { 0.5 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_name: default_input_name(),
            output_name: default_output_name(),
            input_size: default_input_size(),
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// 処理済みフレームを JPEG で配信する
    #[serde(default = "default_stream_frames")]
    pub stream_frames: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
}

fn default_listen_addr() -> String { "127.0.0.1:9100".to_string() }
fn default_stream_frames() -> bool { true }
fn default_jpeg_quality() -> i32 { 80 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            stream_frames: default_stream_frames(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .counter
            .validate()
            .with_context(|| format!("invalid {}", path.display()))?;
        Ok(config)
    }

    /// ファイルがなければ既定値。壊れていればエラーを表示して既定値。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[config] {e:#}, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.counter, CounterConfig::default());
        assert_eq!(config.counter.arm_raise_margin, 0.10);
        assert_eq!(config.counter.default_leg_factor, 1.5);
        assert_eq!(config.session.mode, TrackingMode::Single);
        assert_eq!(config.session.source, SourceSpec::Camera(0));
        assert_eq!(config.server.jpeg_quality, 80);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [counter]
            calibration_margin = 1.8

            [session]
            mode = "dual"
            source = "uploads/session.mp4"
            "#,
        )
        .unwrap();
        assert_eq!(config.counter.calibration_margin, 1.8);
        assert_eq!(config.counter.arm_raise_margin, 0.10);
        assert_eq!(config.session.mode, TrackingMode::Dual);
        assert_eq!(config.session.source, SourceSpec::File(PathBuf::from("uploads/session.mp4")));
        assert_eq!(config.session.missing_warn_frames, 30);
    }

    #[test]
    fn test_camera_source_from_integer() {
        let config: Config = toml::from_str("[session]\nsource = 2\n").unwrap();
        assert_eq!(config.session.source, SourceSpec::Camera(2));
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(SourceSpec::parse("1"), SourceSpec::Camera(1));
        assert_eq!(SourceSpec::parse("clip.mp4"), SourceSpec::File(PathBuf::from("clip.mp4")));
    }

    fn counter(toml_str: &str) -> CounterConfig {
        toml::from_str::<Config>(toml_str).unwrap().counter
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(CounterConfig::default().validate().is_ok());
        assert!(counter("[counter]\narm_raise_margin = 0.0\n").validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_leg_factor() {
        assert!(counter("[counter]\ndefault_leg_factor = 0.0\n").validate().is_err());
        assert!(counter("[counter]\ndefault_leg_factor = -1.0\n").validate().is_err());
        assert!(counter("[counter]\ndefault_leg_factor = nan\n").validate().is_err());
        assert!(counter("[counter]\ndefault_leg_factor = inf\n").validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_calibration_margin() {
        assert!(counter("[counter]\ncalibration_margin = 0.0\n").validate().is_err());
        assert!(counter("[counter]\ncalibration_margin = -1.5\n").validate().is_err());
        assert!(counter("[counter]\ncalibration_margin = nan\n").validate().is_err());
    }

    #[test]
    fn test_rejects_bad_arm_raise_margin() {
        assert!(counter("[counter]\narm_raise_margin = -0.1\n").validate().is_err());
        assert!(counter("[counter]\narm_raise_margin = nan\n").validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_counter_section() {
        let path = std::env::temp_dir().join(format!("jack_counter_invalid_{}.toml", std::process::id()));
        fs::write(&path, "[counter]\ndefault_leg_factor = 0.0\ncalibration_margin = -1.5\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("default_leg_factor"));

        // 壊れた設定は既定値に置き換わる
        let config = Config::load_or_default(&path);
        assert_eq!(config.counter, CounterConfig::default());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("definitely/not/here.toml");
        assert_eq!(config.detector.input_size, 256);
    }
}
