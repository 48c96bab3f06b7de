use std::collections::VecDeque;
use std::f32::consts::PI;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};

use super::{
    BodyTracker, Capture, ColorResolution, DepthMode, DepthSensor, DeviceConfiguration,
    FirmwareBuild, FirmwareSignature, FirmwareVersion, Fps, HardwareVersion, TrackerConfiguration,
};
use crate::body::{ConfidenceLevel, JointId, JointPose, TrackedBody, TrackedFrame, TICKS_PER_SECOND};
use crate::calibration::{
    CalibrationModelType, CameraCalibration, DeviceCalibration, Extrinsics, Intrinsics,
};
use crate::config::SyntheticConfig;

/// 深度画像の固定値（2m先の壁）
const WALL_DEPTH_MM: u16 = 2000;

/// 実機なしで動く決定的なセンサー
///
/// 設定したフレームレートで深度キャプチャを出し、キャリブレーションは固定値。
pub struct SyntheticSensor {
    serial_number: String,
    running: Option<DeviceConfiguration>,
    realtime: bool,
    timeout_every: Option<u64>,
    fail_after: Option<u64>,
    attempts: u64,
    next_timestamp: i64,
    last_capture: Option<Instant>,
}

impl SyntheticSensor {
    pub fn open(config: &SyntheticConfig) -> Result<Self> {
        if config.serial_number.is_empty() {
            bail!("synthetic sensor needs a serial number");
        }
        Ok(Self {
            serial_number: config.serial_number.clone(),
            running: None,
            realtime: config.realtime,
            timeout_every: config.timeout_every.filter(|&n| n > 0),
            fail_after: config.fail_after,
            attempts: 0,
            next_timestamp: 0,
            last_capture: None,
        })
    }

    fn running(&self) -> Result<&DeviceConfiguration> {
        self.running
            .as_ref()
            .ok_or_else(|| anyhow!("cameras are not started"))
    }

    /// 実時間に合わせて待つ。タイムアウト内に次フレームが来ない場合は false。
    fn pace(&mut self, period: Duration, timeout: Duration) -> bool {
        if let Some(last) = self.last_capture {
            let wait = (last + period).saturating_duration_since(Instant::now());
            if wait > timeout {
                std::thread::sleep(timeout);
                return false;
            }
            std::thread::sleep(wait);
        }
        self.last_capture = Some(Instant::now());
        true
    }
}

impl DepthSensor for SyntheticSensor {
    fn serial_number(&self) -> &str {
        &self.serial_number
    }

    fn version(&self) -> HardwareVersion {
        HardwareVersion {
            rgb: FirmwareVersion::new(1, 6, 110),
            depth: FirmwareVersion::new(1, 6, 79),
            audio: FirmwareVersion::new(1, 6, 14),
            depth_sensor: FirmwareVersion::new(6109, 7, 0),
            firmware_build: FirmwareBuild::Release,
            firmware_signature: FirmwareSignature::Msft,
        }
    }

    fn start_cameras(&mut self, config: &DeviceConfiguration) -> Result<()> {
        if self.running.is_some() {
            bail!("cameras already started");
        }
        if config.depth_mode == DepthMode::Off && config.color_resolution == ColorResolution::Off {
            bail!("at least one camera must be enabled");
        }
        if config.camera_fps == Fps::Fps30 && config.depth_mode == DepthMode::WfovUnbinned {
            bail!("{} does not support {}", config.depth_mode, config.camera_fps);
        }
        self.running = Some(*config);
        Ok(())
    }

    fn current_color_resolution(&self) -> ColorResolution {
        self.running
            .map(|c| c.color_resolution)
            .unwrap_or(ColorResolution::Off)
    }

    fn current_depth_mode(&self) -> DepthMode {
        self.running.map(|c| c.depth_mode).unwrap_or(DepthMode::Off)
    }

    fn calibration(&self) -> Result<DeviceCalibration> {
        let running = self.running()?;
        let (width, height) = running.depth_mode.resolution();
        Ok(DeviceCalibration {
            depth_camera: depth_calibration(width as f32, height as f32),
            color_camera: color_calibration(),
            depth_mode: running.depth_mode,
            color_resolution: running.color_resolution,
        })
    }

    fn get_capture(&mut self, timeout: Duration) -> Result<Option<Capture>> {
        let running = *self.running()?;
        self.attempts += 1;

        if let Some(limit) = self.fail_after {
            if self.attempts > limit {
                bail!("synthetic sensor stopped responding after {} captures", limit);
            }
        }
        if let Some(every) = self.timeout_every {
            if self.attempts % every == 0 {
                return Ok(None);
            }
        }

        let fps = running.camera_fps.frames_per_second();
        if self.realtime && !self.pace(Duration::from_secs(1) / fps, timeout) {
            return Ok(None);
        }

        let (width, height) = running.depth_mode.resolution();
        let capture = Capture {
            device_timestamp: self.next_timestamp,
            width,
            height,
            depth: vec![WALL_DEPTH_MM; (width * height) as usize],
        };
        self.next_timestamp += TICKS_PER_SECOND / fps as i64;
        Ok(Some(capture))
    }
}

fn depth_calibration(width: f32, height: f32) -> CameraCalibration {
    // Brown-Conrady 順: cx, cy, fx, fy, k1..k6, codx, cody, p2, p1, metric_radius
    let focal = width * 0.788;
    CameraCalibration {
        extrinsics: Extrinsics::identity(),
        intrinsics: Intrinsics {
            model_type: CalibrationModelType::BrownConrady,
            parameters: vec![
                width / 2.0 - 0.8125, height / 2.0 + 2.375, focal, focal, 0.4937, 0.1346, 0.0054, 0.8325,
                0.2153, 0.0284, 0.0, 0.0, -2.4e-5, 1.1e-4, 1.74,
            ],
        },
    }
}

fn color_calibration() -> CameraCalibration {
    CameraCalibration {
        extrinsics: Extrinsics {
            rotation: [
                0.99998, 0.0053, -0.0012, -0.0052, 0.9952, 0.0977, 0.0017, -0.0977, 0.9952,
            ],
            translation: [-32.1076, -1.9842, 3.8516],
        },
        intrinsics: Intrinsics {
            model_type: CalibrationModelType::BrownConrady,
            parameters: vec![
                956.1832, 549.2017, 913.7441, 913.5563, 0.5172, -2.6457, 1.5731, 0.3962, -2.4750,
                1.5017, 0.0, 0.0, 4.6e-4, -2.1e-4, 1.7,
            ],
        },
    }
}

/// 遅延とスループットを持つ疑似トラッカー
///
/// キャプチャは投入順に処理され、`latency` 個の後続が来るまで結果にならない。
/// 処理は `pop_result` 呼び出し `period` 回につき 1 キャプチャ。処理待ちと
/// 取り出し待ちの合計が `queue_size` に達すると投入を拒否する。
pub struct SyntheticTracker {
    pending: VecDeque<i64>,
    ready: VecDeque<TrackedFrame>,
    queue_size: usize,
    latency: usize,
    period: u64,
    polls: u64,
    body_counts: Vec<usize>,
    produced: usize,
}

impl SyntheticTracker {
    pub fn create(
        calibration: &DeviceCalibration,
        config: &TrackerConfiguration,
        synthetic: &SyntheticConfig,
    ) -> Result<Self> {
        if matches!(calibration.depth_mode, DepthMode::Off | DepthMode::PassiveIr) {
            bail!(
                "body tracking needs a depth mode, got {} ({} mode)",
                calibration.depth_mode,
                config.processing_mode
            );
        }
        if synthetic.tracker_queue_size <= synthetic.tracker_latency {
            bail!(
                "tracker queue size ({}) must exceed tracker latency ({})",
                synthetic.tracker_queue_size,
                synthetic.tracker_latency
            );
        }
        if synthetic.tracker_period == 0 {
            bail!("tracker period must be at least 1");
        }
        Ok(Self {
            pending: VecDeque::new(),
            ready: VecDeque::new(),
            queue_size: synthetic.tracker_queue_size,
            latency: synthetic.tracker_latency,
            period: synthetic.tracker_period,
            polls: 0,
            body_counts: synthetic.body_counts.clone(),
            produced: 0,
        })
    }

    /// 処理待ち + 取り出し待ちのキャプチャ数
    pub fn in_flight(&self) -> usize {
        self.pending.len() + self.ready.len()
    }

    fn track(&mut self, device_timestamp: i64) -> TrackedFrame {
        let count = if self.body_counts.is_empty() {
            0
        } else {
            self.body_counts[self.produced % self.body_counts.len()]
        };
        self.produced += 1;

        let t = device_timestamp as f32 / TICKS_PER_SECOND as f32;
        let bodies = (0..count)
            .map(|b| TrackedBody::new(b as u32 + 1, synthetic_skeleton(b, t)))
            .collect();
        TrackedFrame::new(device_timestamp, bodies)
    }
}

impl BodyTracker for SyntheticTracker {
    fn enqueue_capture(&mut self, capture: Capture, _timeout: Duration) -> Result<bool> {
        if self.in_flight() >= self.queue_size {
            return Ok(false);
        }
        self.pending.push_back(capture.device_timestamp);
        Ok(true)
    }

    fn pop_result(&mut self, _timeout: Duration) -> Result<Option<TrackedFrame>> {
        self.polls += 1;
        if self.polls % self.period == 0 && self.pending.len() > self.latency {
            if let Some(ts) = self.pending.pop_front() {
                let frame = self.track(ts);
                self.ready.push_back(frame);
            }
        }
        Ok(self.ready.pop_front())
    }
}

/// 人 `body` の時刻 `t` における姿勢。ゆっくり左右に揺れながらY軸回りに回転する。
fn synthetic_skeleton(body: usize, t: f32) -> Vec<JointPose> {
    let sway = 50.0 * (t * PI * 0.5).sin();
    let base_x = body as f32 * 600.0 - 300.0 + sway;
    let depth = 2000.0 + body as f32 * 300.0;

    JointId::iter()
        .map(|joint| {
            let j = joint as usize as f32;
            let confidence = match joint {
                JointId::HandTipLeft
                | JointId::ThumbLeft
                | JointId::HandTipRight
                | JointId::ThumbRight => ConfidenceLevel::Low,
                _ => ConfidenceLevel::Medium,
            };
            let half = (t * 0.5 + j * 0.1) / 2.0;
            JointPose::new(
                confidence,
                [base_x + j * 10.0, -800.0 + j * 40.0, depth],
                [0.0, half.sin(), 0.0, half.cos()],
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::JOINT_COUNT;

    fn test_config() -> SyntheticConfig {
        SyntheticConfig {
            realtime: false,
            ..SyntheticConfig::default()
        }
    }

    fn started_sensor(config: &SyntheticConfig) -> SyntheticSensor {
        let mut sensor = SyntheticSensor::open(config).unwrap();
        sensor.start_cameras(&DeviceConfiguration::default()).unwrap();
        sensor
    }

    #[test]
    fn test_capture_before_start_fails() {
        let mut sensor = SyntheticSensor::open(&test_config()).unwrap();
        assert!(sensor.get_capture(Duration::from_millis(10)).is_err());
        assert!(sensor.calibration().is_err());
    }

    #[test]
    fn test_start_rejects_invalid_modes() {
        let mut sensor = SyntheticSensor::open(&test_config()).unwrap();
        let off = DeviceConfiguration {
            depth_mode: DepthMode::Off,
            ..DeviceConfiguration::default()
        };
        assert!(sensor.start_cameras(&off).is_err());

        let wfov = DeviceConfiguration {
            depth_mode: DepthMode::WfovUnbinned,
            ..DeviceConfiguration::default()
        };
        assert!(sensor.start_cameras(&wfov).is_err());
    }

    #[test]
    fn test_capture_timestamps_advance() {
        let mut sensor = started_sensor(&test_config());
        let a = sensor.get_capture(Duration::from_millis(10)).unwrap().unwrap();
        let b = sensor.get_capture(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(a.device_timestamp, 0);
        assert_eq!(b.device_timestamp, TICKS_PER_SECOND / 30);
        assert_eq!((a.width, a.height), (640, 576));
        assert_eq!(a.depth.len(), 640 * 576);
    }

    #[test]
    fn test_timeout_injection() {
        let config = SyntheticConfig {
            timeout_every: Some(2),
            ..test_config()
        };
        let mut sensor = started_sensor(&config);
        let timeout = Duration::from_millis(1);
        assert!(sensor.get_capture(timeout).unwrap().is_some());
        assert!(sensor.get_capture(timeout).unwrap().is_none());
        assert!(sensor.get_capture(timeout).unwrap().is_some());
    }

    #[test]
    fn test_failure_injection() {
        let config = SyntheticConfig {
            fail_after: Some(1),
            ..test_config()
        };
        let mut sensor = started_sensor(&config);
        let timeout = Duration::from_millis(1);
        assert!(sensor.get_capture(timeout).is_ok());
        assert!(sensor.get_capture(timeout).is_err());
    }

    #[test]
    fn test_calibration_follows_depth_mode() {
        let sensor = started_sensor(&test_config());
        let cal = sensor.calibration().unwrap();
        assert_eq!(cal.depth_mode, DepthMode::NfovUnbinned);
        assert_eq!(cal.depth_camera.intrinsics.parameters.len(), 15);
        assert_eq!(cal.depth_camera.extrinsics, Extrinsics::identity());
    }

    #[test]
    fn test_tracker_latency_and_body_pattern() {
        let config = SyntheticConfig {
            body_counts: vec![0, 1, 2],
            tracker_latency: 1,
            tracker_queue_size: 3,
            ..test_config()
        };
        let mut sensor = started_sensor(&config);
        let cal = sensor.calibration().unwrap();
        let mut tracker =
            SyntheticTracker::create(&cal, &TrackerConfiguration::default(), &config).unwrap();
        let timeout = Duration::ZERO;

        let first = sensor.get_capture(timeout).unwrap().unwrap();
        assert!(tracker.enqueue_capture(first, timeout).unwrap());
        assert!(tracker.pop_result(timeout).unwrap().is_none());

        let mut counts = Vec::new();
        for _ in 0..3 {
            let capture = sensor.get_capture(timeout).unwrap().unwrap();
            assert!(tracker.enqueue_capture(capture, timeout).unwrap());
            let frame = tracker.pop_result(timeout).unwrap().unwrap();
            counts.push(frame.body_count());
        }
        assert_eq!(counts, vec![0, 1, 2]);
    }

    fn blank_capture(device_timestamp: i64) -> Capture {
        Capture {
            device_timestamp,
            width: 0,
            height: 0,
            depth: Vec::new(),
        }
    }

    #[test]
    fn test_tracker_rejects_when_full() {
        let config = SyntheticConfig {
            tracker_latency: 1,
            tracker_queue_size: 3,
            ..test_config()
        };
        let cal = started_sensor(&config).calibration().unwrap();
        let mut tracker =
            SyntheticTracker::create(&cal, &TrackerConfiguration::default(), &config).unwrap();
        let timeout = Duration::ZERO;

        // 結果を取り出さないとキューが埋まる
        for ts in 0..3 {
            assert!(tracker.enqueue_capture(blank_capture(ts), timeout).unwrap());
        }
        assert!(!tracker.enqueue_capture(blank_capture(3), timeout).unwrap());
        assert_eq!(tracker.in_flight(), 3);

        // 1つ取り出すと空きができる
        assert_eq!(tracker.pop_result(timeout).unwrap().unwrap().device_timestamp, 0);
        assert_eq!(tracker.in_flight(), 2);
        assert!(tracker.enqueue_capture(blank_capture(4), timeout).unwrap());
    }

    #[test]
    fn test_slow_tracker_processes_every_period() {
        let config = SyntheticConfig {
            tracker_latency: 0,
            tracker_queue_size: 2,
            tracker_period: 2,
            ..test_config()
        };
        let cal = started_sensor(&config).calibration().unwrap();
        let mut tracker =
            SyntheticTracker::create(&cal, &TrackerConfiguration::default(), &config).unwrap();
        let timeout = Duration::ZERO;

        assert!(tracker.enqueue_capture(blank_capture(0), timeout).unwrap());
        assert!(tracker.pop_result(timeout).unwrap().is_none());
        assert!(tracker.enqueue_capture(blank_capture(1), timeout).unwrap());
        assert_eq!(tracker.pop_result(timeout).unwrap().unwrap().device_timestamp, 0);
        assert!(tracker.enqueue_capture(blank_capture(2), timeout).unwrap());
        assert!(tracker.pop_result(timeout).unwrap().is_none());
        // カメラに追いつけず、キューが埋まる
        assert!(!tracker.enqueue_capture(blank_capture(3), timeout).unwrap());
        assert_eq!(tracker.pop_result(timeout).unwrap().unwrap().device_timestamp, 1);
    }

    #[test]
    fn test_tracker_rejects_zero_period() {
        let config = SyntheticConfig {
            tracker_period: 0,
            ..test_config()
        };
        let cal = started_sensor(&config).calibration().unwrap();
        assert!(SyntheticTracker::create(&cal, &TrackerConfiguration::default(), &config).is_err());
    }

    #[test]
    fn test_tracker_rejects_bad_queue() {
        let config = SyntheticConfig {
            tracker_latency: 3,
            tracker_queue_size: 3,
            ..test_config()
        };
        let cal = started_sensor(&test_config()).calibration().unwrap();
        assert!(SyntheticTracker::create(&cal, &TrackerConfiguration::default(), &config).is_err());
    }

    #[test]
    fn test_skeleton_shape() {
        let joints = synthetic_skeleton(1, 0.75);
        assert_eq!(joints.len(), JOINT_COUNT);
        for joint in &joints {
            let q = joint.orientation;
            let norm = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert_eq!(joints[JointId::ThumbLeft as usize].confidence, ConfidenceLevel::Low);
        assert_eq!(joints[JointId::Pelvis as usize].confidence, ConfidenceLevel::Medium);
    }
}
