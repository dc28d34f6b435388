//! stderr とタイムスタンプ付きログファイルへの二重出力

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// 複製しても同じファイルへ書く
#[derive(Clone, Default)]
pub struct Logger {
    file: Option<Arc<Mutex<BufWriter<File>>>>,
    quiet: bool,
}

impl Logger {
    /// `logs/<prefix>_YYYYmmdd_HHMMSS.log` を作成
    pub fn open(prefix: &str) -> Result<Self> {
        std::fs::create_dir_all("logs")?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = format!("logs/{}_{}.log", prefix, ts);
        let file = File::create(&path).with_context(|| format!("failed to create {}", path))?;
        eprintln!("Log: {}", path);
        Ok(Self {
            file: Some(Arc::new(Mutex::new(BufWriter::new(file)))),
            quiet: false,
        })
    }

    /// ファイルなし、stderr のみ
    pub fn stderr() -> Self {
        Self::default()
    }

    /// 何も出力しない
    pub fn silent() -> Self {
        Self {
            file: None,
            quiet: true,
        }
    }

    pub fn write_line(&self, msg: &str) {
        if self.quiet {
            return;
        }
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
        $logger.write_line(&format!($($arg)*));
    }};
}
