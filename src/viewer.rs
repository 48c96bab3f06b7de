use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::body::{JointId, TrackedFrame};
use crate::config::ViewerConfig;
use crate::handoff::LatestResultHandoff;
use crate::log;
use crate::logging::Logger;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerStats {
    /// 受け取った結果の数
    pub updates: u64,
    /// 見る前に上書きされた結果の数
    pub skipped: u64,
}

pub struct ViewerHandle {
    active: Arc<AtomicBool>,
    thread: Option<JoinHandle<ViewerStats>>,
}

impl ViewerHandle {
    /// キャプチャループが監視するフラグ
    pub fn active(&self) -> &AtomicBool {
        &self.active
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// ビューアを止めて終了を待つ
    pub fn join(mut self) -> ViewerStats {
        self.stop();
        self.thread
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// 1フレームの要約: 時刻、人数、先頭の人の骨盤位置
pub fn frame_summary(frame: &TrackedFrame) -> String {
    let mut s = format!(
        "t={:.3}s bodies={}",
        frame.timestamp_secs(),
        frame.body_count()
    );
    if let Some(body) = frame.bodies.first() {
        match body.joint(JointId::Pelvis) {
            Some(pelvis) => {
                let [x, y, z] = pelvis.position;
                s.push_str(&format!(
                    " | #{} pelvis ({:.0}, {:.0}, {:.0}) mm [{:?}]",
                    body.id, x, y, z, pelvis.confidence
                ));
            }
            None => s.push_str(&format!(" | #{} (no joints)", body.id)),
        }
    }
    s
}

/// 最新結果をコンソールに表示するスレッドを起動する
///
/// ハンドオフを定期的に確認し、新しい結果の概要を表示する。セッションの
/// `active` フラグもここが持つ: 標準入力の `q`、時間制限、ハンドルの drop で止まる。
pub fn spawn_viewer(
    handoff: Arc<LatestResultHandoff>,
    config: &ViewerConfig,
    logger: Logger,
) -> Result<ViewerHandle> {
    let active = Arc::new(AtomicBool::new(true));

    if config.console_input {
        spawn_console_input(Arc::clone(&active), logger.clone())?;
    }

    let poll = Duration::from_millis(config.poll_interval_ms.max(1));
    let print = Duration::from_millis(config.print_interval_ms);
    let limit = config
        .max_duration_secs
        .and_then(|s| Duration::try_from_secs_f64(s).ok());

    let thread = {
        let active = Arc::clone(&active);
        thread::Builder::new()
            .name("viewer".into())
            .spawn(move || viewer_loop(&handoff, &active, poll, print, limit, &logger))
            .context("failed to spawn viewer thread")?
    };

    Ok(ViewerHandle {
        active,
        thread: Some(thread),
    })
}

fn viewer_loop(
    handoff: &LatestResultHandoff,
    active: &AtomicBool,
    poll: Duration,
    print: Duration,
    limit: Option<Duration>,
    logger: &Logger,
) -> ViewerStats {
    let started = Instant::now();
    let mut stats = ViewerStats::default();
    let mut seen = 0u64;
    let mut last_print: Option<Instant> = None;

    while active.load(Ordering::Acquire) {
        if let Some(limit) = limit {
            if started.elapsed() >= limit {
                log!(logger, "[viewer] time limit reached ({:.1}s), stopping", limit.as_secs_f64());
                active.store(false, Ordering::Release);
                break;
            }
        }

        let (latest, generation) = handoff.read_with_generation();
        if generation != seen {
            if let Some(frame) = latest {
                stats.updates += 1;
                stats.skipped += generation - seen - 1;
                seen = generation;

                if last_print.map_or(true, |t| t.elapsed() >= print) {
                    log!(logger, "[viewer] {}", frame_summary(&frame));
                    last_print = Some(Instant::now());
                }
            }
        }
        thread::sleep(poll);
    }
    stats
}

/// コンソール入力: 'q' + Enter で停止
fn spawn_console_input(active: Arc<AtomicBool>, logger: Logger) -> Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if line.trim().eq_ignore_ascii_case("q") => {
                        log!(logger, "[input] stop requested");
                        active.store(false, Ordering::Release);
                        break;
                    }
                    Ok(_) => {}
                }
            }
        })
        .context("failed to spawn console input thread")?;
    Ok(())
}
