use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

type LogFile = Arc<Mutex<BufWriter<File>>>;

/// セッションログ。標準エラーと、有効ならログファイルの両方に書く
///
/// clone しても同じファイルを共有する
#[derive(Clone, Default)]
pub struct Logger {
    file: Option<LogFile>,
}

impl Logger {
    /// 標準エラーのみ
    pub fn stderr() -> Self {
        Self { file: None }
    }

    /// `<dir>/<name>_<YYYYmmdd_HHMMSS>.log` を作成
    pub fn open(dir: &Path, name: &str) -> Result<(Self, PathBuf)> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("{}_{}.log", name, ts));
        let file = File::create(&path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        eprintln!("Log: {}", path.display());
        let logger = Self {
            file: Some(Arc::new(Mutex::new(BufWriter::new(file)))),
        };
        Ok((logger, path))
    }

    pub fn line(&self, msg: &str) {
        eprintln!("{}", msg);
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = writeln!(f, "{}", msg);
                let _ = f.flush();
            }
        }
    }
}

#[macro_export]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {{
        $logger.line(&format!($($arg)*));
    }};
}
