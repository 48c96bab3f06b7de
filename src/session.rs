use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, TimeZone};

use crate::body::JOINT_COUNT;
use crate::calibration::DeviceCalibration;
use crate::config::{Config, RecordingConfig};
use crate::device::{BodyTracker, DepthSensor, TrackerConfiguration};
use crate::driver::{CaptureTrackDriver, DriverSettings, SessionStats};
use crate::error::SessionError;
use crate::handoff::LatestResultHandoff;
use crate::log;
use crate::logging::Logger;
use crate::recording::{RecordingHeader, RecordingWriter, WriterState, FORMAT_VERSION};

#[derive(Debug)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub header: RecordingHeader,
    pub stats: SessionStats,
}

/// `<prefix>-<yyyy-mm-dd_HH-MM-SS>.<extension>`
pub fn recording_file_name<Tz>(prefix: &str, extension: &str, started: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}-{}.{}",
        prefix,
        started.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}

/// 出力ディレクトリを作成し、記録ファイルのパスを返す
pub fn recording_path<Tz>(config: &RecordingConfig, started: &DateTime<Tz>) -> anyhow::Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    Ok(config.output_dir.join(recording_file_name(
        &config.file_prefix,
        &config.extension,
        started,
    )))
}

/// カメラを起動し、ヘッダーに書く情報を読み出す。
///
/// 問い合わせはヘッダー順: バージョンとシリアル、起動中のカメラモード、
/// キャリブレーション。
pub fn start_device<S: DepthSensor>(
    sensor: &mut S,
    config: &Config,
) -> anyhow::Result<(RecordingHeader, DeviceCalibration)> {
    let device_version = sensor.version();
    let serial_number = sensor.serial_number().to_string();

    sensor
        .start_cameras(&config.device.camera)
        .with_context(|| format!("failed to start cameras on {}", serial_number))?;
    let color_resolution = sensor.current_color_resolution();
    let depth_mode = sensor.current_depth_mode();

    let calibration = sensor
        .calibration()
        .context("failed to read device calibration")?;

    let header = RecordingHeader {
        version: FORMAT_VERSION,
        device_version,
        serial_number,
        color_resolution,
        depth_mode,
        depth_calibration: calibration.depth_camera.clone(),
        color_calibration: calibration.color_camera.clone(),
        joint_count: JOINT_COUNT,
    };
    Ok((header, calibration))
}

/// 記録セッションを1回分実行する。`active` が下りるか、いずれかの段階が失敗するまで。
///
/// `create_tracker` はカメラ起動後にキャリブレーションを渡して呼ぶ。記録
/// ファイルはセットアップが成功してから作り、最初のキャプチャ要求の前に
/// ヘッダーを書く。書き込み失敗で終わった場合は末尾の書きかけレコードを切り詰める。
pub fn run_session<S, T, F>(
    config: &Config,
    mut sensor: S,
    create_tracker: F,
    handoff: Arc<LatestResultHandoff>,
    active: &AtomicBool,
    logger: &Logger,
) -> Result<SessionSummary, SessionError>
where
    S: DepthSensor,
    T: BodyTracker,
    F: FnOnce(&DeviceCalibration, &TrackerConfiguration) -> anyhow::Result<T>,
{
    let started = chrono::Local::now();

    let (header, calibration) = start_device(&mut sensor, config).map_err(SessionError::Setup)?;
    log!(
        logger,
        "Device {} (rgb {}, depth {}, depth sensor {})",
        header.serial_number,
        header.device_version.rgb,
        header.device_version.depth,
        header.device_version.depth_sensor
    );
    log!(
        logger,
        "Cameras: depth {}, color {}, {}",
        header.depth_mode,
        header.color_resolution,
        config.device.camera.camera_fps
    );

    let tracker = create_tracker(&calibration, &config.tracker.engine)
        .context("failed to create body tracker")
        .map_err(SessionError::Setup)?;
    log!(
        logger,
        "Tracker: {} ({})",
        config.tracker.engine.processing_mode,
        config.tracker.engine.sensor_orientation
    );

    let path = recording_path(&config.recording, &started).map_err(SessionError::Setup)?;
    let mut writer = RecordingWriter::open(&path)?;
    writer.write_header(&header)?;
    log!(logger, "Recording to {}", path.display());

    let mut driver = CaptureTrackDriver::new(
        sensor,
        tracker,
        writer,
        handoff,
        DriverSettings::from_config(config),
        logger.clone(),
    );
    let result = driver.run(active);
    let stats = driver.stats();

    let (_, _, mut writer) = driver.into_parts();
    if writer.state() == WriterState::Failed {
        match writer.discard_partial_record() {
            Ok(()) => log!(
                logger,
                "Truncated {} to the last complete record ({} bytes)",
                path.display(),
                writer.bytes_written()
            ),
            Err(e) => log!(logger, "Could not truncate {}: {}", path.display(), e),
        }
    }
    drop(writer);
    let elapsed = (chrono::Local::now() - started).num_milliseconds() as f64 / 1000.0;

    log!(
        logger,
        "Session {} after {:.1}s: {} frames ({} bytes), {} captures, {} timeouts, {} queue-full",
        if result.is_ok() { "finished" } else { "aborted" },
        elapsed,
        stats.frames_written,
        stats.bytes_written,
        stats.captures,
        stats.capture_timeouts,
        stats.enqueue_rejected
    );

    result.map(|stats| SessionSummary {
        path,
        header,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DepthMode, SyntheticSensor, SyntheticTracker};
    use std::sync::atomic::Ordering;

    #[test]
    fn test_recording_file_name() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 17, 5, 42).unwrap();
        assert_eq!(
            recording_file_name("bt-dump", "btd", &at),
            "bt-dump-2024-03-09_17-05-42.btd"
        );
    }

    #[test]
    fn test_recording_path_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecordingConfig {
            output_dir: dir.path().join("sessions/a"),
            ..RecordingConfig::default()
        };
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = recording_path(&config, &at).unwrap();
        assert!(dir.path().join("sessions/a").is_dir());
        assert_eq!(path.file_name().unwrap(), "bt-dump-2024-01-02_03-04-05.btd");
    }

    #[test]
    fn test_start_device_fills_header() {
        let mut config = Config::default();
        config.synthetic.realtime = false;
        let mut sensor = SyntheticSensor::open(&config.synthetic).unwrap();
        let (header, calibration) = start_device(&mut sensor, &config).unwrap();

        assert_eq!(header.serial_number, config.synthetic.serial_number);
        assert_eq!(header.depth_mode, DepthMode::NfovUnbinned);
        assert_eq!(header.depth_calibration, calibration.depth_camera);
        assert_eq!(header.joint_count, JOINT_COUNT);
        assert_eq!(header.version, FORMAT_VERSION);
    }

    #[test]
    fn test_setup_failure_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.recording.output_dir = dir.path().to_path_buf();
        config.synthetic.realtime = false;
        config.device.camera.depth_mode = DepthMode::PassiveIr;

        let sensor = SyntheticSensor::open(&config.synthetic).unwrap();
        let synthetic = config.synthetic.clone();
        let active = AtomicBool::new(true);
        let err = run_session(
            &config,
            sensor,
            |cal, engine| SyntheticTracker::create(cal, engine, &synthetic),
            Arc::new(LatestResultHandoff::new()),
            &active,
            &Logger::stderr(),
        )
        .unwrap_err();

        assert_eq!(err.stage(), "setup");
        assert!(err.to_string().contains("failed to create body tracker"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stopped_session_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.recording.output_dir = dir.path().to_path_buf();
        config.synthetic.realtime = false;

        let sensor = SyntheticSensor::open(&config.synthetic).unwrap();
        let synthetic = config.synthetic.clone();
        let active = AtomicBool::new(false);
        let summary = run_session(
            &config,
            sensor,
            |cal, engine| SyntheticTracker::create(cal, engine, &synthetic),
            Arc::new(LatestResultHandoff::new()),
            &active,
            &Logger::stderr(),
        )
        .unwrap();

        assert!(!active.load(Ordering::Acquire));
        assert_eq!(summary.stats.frames_written, 0);
        let bytes = fs::read(&summary.path).unwrap();
        assert_eq!(bytes.len(), summary.header.encoded_len());
        assert!(bytes.ends_with(b"joint-count: 32\ndata:\n"));
    }
}
