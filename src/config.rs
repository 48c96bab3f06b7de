use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::{DeviceConfiguration, TrackerConfiguration};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// カメラ起動設定 (FPS, 解像度, 深度モード, 同期モード)
    #[serde(flatten)]
    pub camera: DeviceConfiguration,
    /// キャプチャ待ちの上限（ミリ秒）。停止フラグはこの間隔で確認される。
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
}

fn default_capture_timeout_ms() -> u64 { 500 }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            camera: DeviceConfiguration::default(),
            capture_timeout_ms: default_capture_timeout_ms(),
        }
    }
}

impl DeviceConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    #[serde(flatten)]
    pub engine: TrackerConfiguration,
    /// キャプチャ投入の待ち時間（ミリ秒）。0 = 待たない
    #[serde(default)]
    pub enqueue_timeout_ms: u64,
    /// 結果取得の待ち時間（ミリ秒）。0 = ノンブロッキング
    #[serde(default)]
    pub pop_timeout_ms: u64,
}

impl TrackerConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    /// 保存先ディレクトリ
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// ファイル名の接頭辞
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// 拡張子
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_file_prefix() -> String { "bt-dump".to_string() }
fn default_extension() -> String { "btd".to_string() }

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            extension: default_extension(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    /// 最新結果の確認間隔（ミリ秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 状態表示の間隔（ミリ秒）
    #[serde(default = "default_print_interval_ms")]
    pub print_interval_ms: u64,
    /// 標準入力の 'q' で停止する
    #[serde(default = "default_true")]
    pub console_input: bool,
    /// 指定秒数で自動停止（未指定 = 無制限）
    #[serde(default)]
    pub max_duration_secs: Option<f64>,
}

fn default_poll_interval_ms() -> u64 { 33 }
fn default_print_interval_ms() -> u64 { 1000 }
fn default_true() -> bool { true }

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            print_interval_ms: default_print_interval_ms(),
            console_input: default_true(),
            max_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_serial_number")]
    pub serial_number: String,
    /// フレームレートに合わせて待つ
    #[serde(default = "default_true")]
    pub realtime: bool,
    /// 結果ごとのボディ数（循環）
    #[serde(default = "default_body_counts")]
    pub body_counts: Vec<usize>,
    /// 結果が出るまでのキャプチャ数
    #[serde(default = "default_tracker_latency")]
    pub tracker_latency: usize,
    /// トラッカーが同時に抱えられるキャプチャ数（処理待ち + 取り出し待ち）
    #[serde(default = "default_tracker_queue_size")]
    pub tracker_queue_size: usize,
    /// 結果取得 N 回につき 1 キャプチャを処理する（1 = カメラと同速）
    #[serde(default = "default_tracker_period")]
    pub tracker_period: u64,
    /// N回に1回キャプチャをタイムアウトさせる
    #[serde(default)]
    pub timeout_every: Option<u64>,
    /// N回のキャプチャ後にセンサーを故障させる
    #[serde(default)]
    pub fail_after: Option<u64>,
}

fn default_serial_number() -> String { "000123456789".to_string() }
fn default_body_counts() -> Vec<usize> { vec![1] }
fn default_tracker_latency() -> usize { 2 }
fn default_tracker_queue_size() -> usize { 3 }
fn default_tracker_period() -> u64 { 1 }

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            serial_number: default_serial_number(),
            realtime: default_true(),
            body_counts: default_body_counts(),
            tracker_latency: default_tracker_latency(),
            tracker_queue_size: default_tracker_queue_size(),
            tracker_period: default_tracker_period(),
            timeout_every: None,
            fail_after: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// ログファイルの保存先
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// false ならログファイルを作らず標準エラーのみ
    #[serde(default = "default_true")]
    pub file: bool,
}

fn default_log_dir() -> PathBuf { PathBuf::from("logs") }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file: default_true(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読み込めない場合はデフォルト設定を使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    eprintln!("Config error ({:#}), using defaults", e);
                } else {
                    eprintln!("{} not found, using defaults", path.display());
                }
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DepthMode, Fps, ProcessingMode};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.device.camera, DeviceConfiguration::default());
        assert_eq!(config.device.capture_timeout_ms, 500);
        assert_eq!(config.tracker.pop_timeout(), Duration::ZERO);
        assert_eq!(config.recording.file_prefix, "bt-dump");
        assert_eq!(config.recording.extension, "btd");
        assert_eq!(config.synthetic.body_counts, vec![1]);
        assert_eq!(config.synthetic.tracker_period, 1);
        assert!(config.viewer.max_duration_secs.is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(include_str!("../bt_dump.toml")).unwrap();
        assert_eq!(config.device.camera.depth_mode, DepthMode::NfovUnbinned);
        assert_eq!(config.synthetic.body_counts, vec![1, 1, 2, 2, 0]);
        assert_eq!(config.log.dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_sections_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            [device]
            camera_fps = "FPS15"
            depth_mode = "WFOV_2x2Binned"
            capture_timeout_ms = 100

            [tracker]
            processing_mode = "Cpu"

            [recording]
            output_dir = "recordings"

            [synthetic]
            realtime = false
            body_counts = [0, 1, 2]
            fail_after = 10

            [viewer]
            max_duration_secs = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.device.camera.camera_fps, Fps::Fps15);
        assert_eq!(config.device.camera.depth_mode, DepthMode::Wfov2x2Binned);
        assert_eq!(config.device.capture_timeout(), Duration::from_millis(100));
        assert_eq!(config.tracker.engine.processing_mode, ProcessingMode::Cpu);
        assert_eq!(config.recording.output_dir, PathBuf::from("recordings"));
        assert_eq!(config.recording.file_prefix, "bt-dump");
        assert!(!config.synthetic.realtime);
        assert_eq!(config.synthetic.body_counts, vec![0, 1, 2]);
        assert_eq!(config.synthetic.fail_after, Some(10));
        assert_eq!(config.viewer.max_duration_secs, Some(2.5));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[device]\ndepth_mode = \"NFOV\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/bt_dump.toml");
        assert_eq!(config.recording.file_prefix, "bt-dump");
        assert_eq!(config.device.capture_timeout_ms, 500);
    }
}
