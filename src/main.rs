use std::sync::Arc;

use anyhow::Result;
use bt_dump::config::Config;
use bt_dump::device::{SyntheticSensor, SyntheticTracker};
use bt_dump::handoff::LatestResultHandoff;
use bt_dump::log;
use bt_dump::logging::Logger;
use bt_dump::session::run_session;
use bt_dump::viewer::spawn_viewer;

const CONFIG_PATH: &str = "bt_dump.toml";

fn main() -> Result<()> {
    // 使い方: bt-dump [config.toml]
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    let logger = if config.log.file {
        Logger::open(&config.log.dir, "bt-dump")?.0
    } else {
        Logger::stderr()
    };

    log!(logger, "Body Tracking Dump ({})", env!("GIT_VERSION"));
    log!(logger, "Config: {}", config_path);
    log!(
        logger,
        "Synthetic device: serial {}, bodies {:?}, realtime {}",
        config.synthetic.serial_number,
        config.synthetic.body_counts,
        config.synthetic.realtime
    );
    if config.viewer.console_input {
        log!(logger, "'q' + Enter で停止");
    }
    log!(logger, "");

    let sensor = SyntheticSensor::open(&config.synthetic)?;
    let handoff = Arc::new(LatestResultHandoff::new());
    let viewer = spawn_viewer(Arc::clone(&handoff), &config.viewer, logger.clone())?;

    let synthetic = config.synthetic.clone();
    let result = run_session(
        &config,
        sensor,
        |calibration, engine| SyntheticTracker::create(calibration, engine, &synthetic),
        handoff,
        viewer.active(),
        &logger,
    );
    let viewer_stats = viewer.join();
    log!(
        logger,
        "Viewer: {} updates, {} skipped",
        viewer_stats.updates,
        viewer_stats.skipped
    );

    match result {
        Ok(summary) => {
            log!(logger, "Saved {}", summary.path.display());
            Ok(())
        }
        Err(e) => {
            log!(logger, "[{}] failed: {}", e.stage(), e);
            Err(e.into())
        }
    }
}
