use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::device::{BodyTracker, DepthSensor};
use crate::error::SessionError;
use crate::handoff::LatestResultHandoff;
use crate::log;
use crate::logging::Logger;
use crate::recording::RecordingWriter;

#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub capture_timeout: Duration,
    pub enqueue_timeout: Duration,
    pub pop_timeout: Duration,
    /// 状態ログの間隔。None なら出さない
    pub status_interval: Option<Duration>,
}

impl DriverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capture_timeout: config.device.capture_timeout(),
            enqueue_timeout: config.tracker.enqueue_timeout(),
            pop_timeout: config.tracker.pop_timeout(),
            status_interval: Some(Duration::from_secs(1)),
        }
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// セッション中の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub captures: u64,
    pub capture_timeouts: u64,
    /// キューが埋まっていてトラッカーに断られたキャプチャ数
    pub enqueue_rejected: u64,
    pub frames_written: u64,
    pub frames_published: u64,
    pub bytes_written: u64,
}

/// ループ1回分の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 時間内にキャプチャが来なかった
    CaptureTimeout,
    /// キャプチャは投入したが、結果はまだ出ていない
    Pending,
    /// 結果を記録して公開した
    Recorded { generation: u64 },
}

/// キャプチャ → トラッキング → 記録 のループ
///
/// センサー待ち、トラッカーへの投入と取り出し、ファイルへの追記はすべて
/// このスレッドで行う。他スレッドと共有するのはハンドオフと、ループごとに
/// 確認する `active` フラグだけ。
pub struct CaptureTrackDriver<S, T, W: Write> {
    sensor: S,
    tracker: T,
    writer: RecordingWriter<W>,
    handoff: Arc<LatestResultHandoff>,
    settings: DriverSettings,
    logger: Logger,
    stats: SessionStats,
}

impl<S: DepthSensor, T: BodyTracker, W: Write> CaptureTrackDriver<S, T, W> {
    /// `writer` はヘッダー書き込み済みであること
    pub fn new(
        sensor: S,
        tracker: T,
        writer: RecordingWriter<W>,
        handoff: Arc<LatestResultHandoff>,
        settings: DriverSettings,
        logger: Logger,
    ) -> Self {
        let stats = SessionStats {
            bytes_written: writer.bytes_written(),
            ..SessionStats::default()
        };
        Self {
            sensor,
            tracker,
            writer,
            handoff,
            settings,
            logger,
            stats,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// `active` が下りるか、いずれかの段階が失敗するまで回す。
    ///
    /// 書き込みに失敗した場合、ライターは `Failed` になり以降は書かない。
    /// 末尾の書きかけレコードはファイル側で切り詰める
    /// （[`RecordingWriter::discard_partial_record`]）。
    pub fn run(&mut self, active: &AtomicBool) -> Result<SessionStats, SessionError> {
        let mut status_timer = Instant::now();
        let mut last = self.stats;

        while active.load(Ordering::Acquire) {
            self.step()?;

            if let Some(interval) = self.settings.status_interval {
                let elapsed = status_timer.elapsed();
                if elapsed >= interval {
                    self.log_status(&last, elapsed);
                    last = self.stats;
                    status_timer = Instant::now();
                }
            }
        }
        Ok(self.stats)
    }

    /// 1回分: キャプチャ取得、投入、結果確認、結果があれば記録
    pub fn step(&mut self) -> Result<StepOutcome, SessionError> {
        let capture = match self
            .sensor
            .get_capture(self.settings.capture_timeout)
            .map_err(SessionError::Sensor)?
        {
            Some(capture) => capture,
            None => {
                self.stats.capture_timeouts += 1;
                return Ok(StepOutcome::CaptureTimeout);
            }
        };
        self.stats.captures += 1;

        let accepted = self
            .tracker
            .enqueue_capture(capture, self.settings.enqueue_timeout)
            .map_err(SessionError::Tracker)?;
        if !accepted {
            self.stats.enqueue_rejected += 1;
        }

        let Some(frame) = self
            .tracker
            .pop_result(self.settings.pop_timeout)
            .map_err(SessionError::Tracker)?
        else {
            return Ok(StepOutcome::Pending);
        };

        // ディスクに書いてから公開する。ビューアとは Arc で共有し、コピーしない
        let frame = Arc::new(frame);
        self.writer.write_frame(&frame)?;
        self.stats.frames_written = self.writer.frames_written();
        self.stats.bytes_written = self.writer.bytes_written();

        let generation = self.handoff.publish(frame);
        self.stats.frames_published += 1;
        Ok(StepOutcome::Recorded { generation })
    }

    pub fn into_parts(self) -> (S, T, RecordingWriter<W>) {
        (self.sensor, self.tracker, self.writer)
    }

    fn log_status(&self, last: &SessionStats, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let s = &self.stats;
        log!(
            self.logger,
            "FPS: capture {:.1}  record {:.1} | frames {}  timeouts {}  queue-full {}  {:.1} KiB",
            (s.captures - last.captures) as f64 / secs,
            (s.frames_written - last.frames_written) as f64 / secs,
            s.frames_written,
            s.capture_timeouts,
            s.enqueue_rejected,
            s.bytes_written as f64 / 1024.0
        );
    }
}
