use serde::{Deserialize, Serialize};

// 名前はセンサー SDK の列挙名と同じ。記録ヘッダーにもこの名前で書く
// （`device-color-resolution: Off`）

named_enum! {
    pub enum Fps {
        Fps5 => "FPS5",
        Fps15 => "FPS15",
        Fps30 => "FPS30",
    }
}

impl Fps {
    pub fn frames_per_second(self) -> u32 {
        match self {
            Fps::Fps5 => 5,
            Fps::Fps15 => 15,
            Fps::Fps30 => 30,
        }
    }
}

named_enum! {
    pub enum ColorResolution {
        Off => "Off",
        R720p => "R720p",
        R1080p => "R1080p",
        R1440p => "R1440p",
        R1536p => "R1536p",
        R2160p => "R2160p",
        R3072p => "R3072p",
    }
}

named_enum! {
    pub enum DepthMode {
        Off => "Off",
        Nfov2x2Binned => "NFOV_2x2Binned",
        NfovUnbinned => "NFOV_Unbinned",
        Wfov2x2Binned => "WFOV_2x2Binned",
        WfovUnbinned => "WFOV_Unbinned",
        PassiveIr => "PassiveIR",
    }
}

impl DepthMode {
    /// 深度画像の解像度 (width, height)
    pub fn resolution(self) -> (u32, u32) {
        match self {
            DepthMode::Off => (0, 0),
            DepthMode::Nfov2x2Binned => (320, 288),
            DepthMode::NfovUnbinned => (640, 576),
            DepthMode::Wfov2x2Binned => (512, 512),
            DepthMode::WfovUnbinned | DepthMode::PassiveIr => (1024, 1024),
        }
    }
}

named_enum! {
    pub enum WiredSyncMode {
        Standalone => "Standalone",
        Master => "Master",
        Subordinate => "Subordinate",
    }
}

named_enum! {
    pub enum ProcessingMode {
        Gpu => "Gpu",
        Cpu => "Cpu",
        Cuda => "Cuda",
        DirectMl => "DirectML",
        TensorRt => "TensorRT",
    }
}

named_enum! {
    pub enum SensorOrientation {
        Default => "Default",
        Clockwise90 => "Clockwise90",
        CounterClockwise90 => "CounterClockwise90",
        Flip180 => "Flip180",
    }
}

/// カメラ起動時の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    #[serde(default = "default_fps")]
    pub camera_fps: Fps,
    #[serde(default = "default_color_resolution")]
    pub color_resolution: ColorResolution,
    #[serde(default = "default_depth_mode")]
    pub depth_mode: DepthMode,
    #[serde(default = "default_wired_sync_mode")]
    pub wired_sync_mode: WiredSyncMode,
}

fn default_fps() -> Fps { Fps::Fps30 }
fn default_color_resolution() -> ColorResolution { ColorResolution::Off }
fn default_depth_mode() -> DepthMode { DepthMode::NfovUnbinned }
fn default_wired_sync_mode() -> WiredSyncMode { WiredSyncMode::Standalone }

impl Default for DeviceConfiguration {
    fn default() -> Self {
        Self {
            camera_fps: default_fps(),
            color_resolution: default_color_resolution(),
            depth_mode: default_depth_mode(),
            wired_sync_mode: default_wired_sync_mode(),
        }
    }
}

/// ボディトラッカー生成時の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfiguration {
    #[serde(default = "default_processing_mode")]
    pub processing_mode: ProcessingMode,
    #[serde(default = "default_sensor_orientation")]
    pub sensor_orientation: SensorOrientation,
}

fn default_processing_mode() -> ProcessingMode { ProcessingMode::Gpu }
fn default_sensor_orientation() -> SensorOrientation { SensorOrientation::Default }

impl Default for TrackerConfiguration {
    fn default() -> Self {
        Self {
            processing_mode: default_processing_mode(),
            sensor_orientation: default_sensor_orientation(),
        }
    }
}
