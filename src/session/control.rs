use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::status::SessionStatus;

/// UI 側から立てる要求フラグ。各要求は 1 フレームだけが消費する。
#[derive(Clone, Default)]
pub struct SessionControl {
    calibrate: Arc<AtomicBool>,
    reset: Arc<AtomicBool>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_calibration(&self) {
        self.calibrate.store(true, Ordering::Release);
    }

    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::Release);
    }

    pub fn take_calibration(&self) -> bool {
        self.calibrate.swap(false, Ordering::AcqRel)
    }

    pub fn take_reset(&self) -> bool {
        self.reset.swap(false, Ordering::AcqRel)
    }

    /// シグナルハンドラ登録用
    pub fn calibration_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.calibrate)
    }
}

/// 最新ステータスの書き手。処理ループだけが持つ。
pub struct StatusPublisher {
    latest: Arc<Mutex<Option<SessionStatus>>>,
}

/// 最新ステータスの読み手。複製して配ってよい。
#[derive(Clone)]
pub struct StatusBoard {
    latest: Arc<Mutex<Option<SessionStatus>>>,
}

pub fn status_channel() -> (StatusPublisher, StatusBoard) {
    let latest = Arc::new(Mutex::new(None));
    (
        StatusPublisher {
            latest: Arc::clone(&latest),
        },
        StatusBoard { latest },
    )
}

impl StatusPublisher {
    pub fn publish(&self, status: SessionStatus) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(status);
        }
    }

    pub fn board(&self) -> StatusBoard {
        StatusBoard {
            latest: Arc::clone(&self.latest),
        }
    }
}

impl StatusBoard {
    /// 最初のフレームを処理するまでは None
    pub fn latest(&self) -> Option<SessionStatus> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}
