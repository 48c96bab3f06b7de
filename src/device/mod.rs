pub mod config;
pub mod synthetic;
pub mod version;

use std::time::Duration;

use anyhow::Result;

use crate::body::TrackedFrame;
use crate::calibration::DeviceCalibration;

pub use config::{
    ColorResolution, DepthMode, DeviceConfiguration, Fps, ProcessingMode, SensorOrientation,
    TrackerConfiguration, WiredSyncMode,
};
pub use synthetic::{SyntheticSensor, SyntheticTracker};
pub use version::{FirmwareBuild, FirmwareSignature, FirmwareVersion, HardwareVersion};

/// センサーからの同期済みサンプル1つ
#[derive(Debug, Clone)]
pub struct Capture {
    /// デバイスタイムスタンプ (100ns 単位)
    pub device_timestamp: i64,
    pub width: u32,
    pub height: u32,
    /// 深度画像 (mm, 行優先)
    pub depth: Vec<u16>,
}

/// 深度センサー
///
/// 記録側はこのトレイトと [`BodyTracker`] 越しにしかハードウェアを触らない。
/// 実機がなくても [`synthetic`] の実装でパイプライン全体が動く。
pub trait DepthSensor {
    fn serial_number(&self) -> &str;

    fn version(&self) -> HardwareVersion;

    fn start_cameras(&mut self, config: &DeviceConfiguration) -> Result<()>;

    fn current_color_resolution(&self) -> ColorResolution;

    fn current_depth_mode(&self) -> DepthMode;

    /// 起動中のカメラモードに対応するキャリブレーション
    fn calibration(&self) -> Result<DeviceCalibration>;

    /// 次のキャプチャを最大 `timeout` 待つ。
    ///
    /// `Ok(None)` はタイムアウト。エラーは致命的な故障。
    fn get_capture(&mut self, timeout: Duration) -> Result<Option<Capture>>;
}

/// ボディトラッカー
pub trait BodyTracker {
    /// キャプチャをトラッキング待ちに積む。
    ///
    /// `timeout` の間キューが埋まったままなら `Ok(false)`。
    fn enqueue_capture(&mut self, capture: Capture, timeout: Duration) -> Result<bool>;

    /// 処理済みの最も古い結果を取り出す（最大 `timeout` 待つ）
    fn pop_result(&mut self, timeout: Duration) -> Result<Option<TrackedFrame>>;
}
