// src/notice.rs
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::request::{RequestId, RequestStatus};

/// Something the person at the desk should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SubmitSucceeded { id: RequestId },
    SubmitFailed { reason: String },
    /// Fired once when the duplicate lock engages (buzz/vibrate on devices).
    DuplicateDetected {
        staff_name: String,
        date: NaiveDate,
        lock_secs: u32,
    },
    DuplicateLockReleased { cleared_date: NaiveDate },
    StatusUpdated { id: RequestId, status: RequestStatus },
    RequestDeleted { id: RequestId },
}

pub trait NoticeSink: Send + Sync {
    fn send(&self, notice: Notice);
}

/// Default sink: notices become log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn send(&self, notice: Notice) {
        match &notice {
            Notice::SubmitSucceeded { id } => info!("Request {} submitted", id),
            Notice::SubmitFailed { reason } => warn!("Submission failed: {}", reason),
            Notice::DuplicateDetected {
                staff_name,
                date,
                lock_secs,
            } => warn!(
                "{} already has a request on {}; submission locked for {}s",
                staff_name, date, lock_secs
            ),
            Notice::DuplicateLockReleased { cleared_date } => {
                info!("Duplicate lock released, date {} cleared", cleared_date)
            }
            Notice::StatusUpdated { id, status } => info!("Request {} marked {}", id, status),
            Notice::RequestDeleted { id } => info!("Request {} deleted", id),
        }
    }
}

/// Keeps every notice for later inspection.
#[derive(Clone, Default)]
pub struct RecordingNotices {
    sent: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count_matching(&self, predicate: impl Fn(&Notice) -> bool) -> usize {
        self.sent().iter().filter(|n| predicate(n)).count()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl NoticeSink for RecordingNotices {
    fn send(&self, notice: Notice) {
        debug!("Recorded notice: {:?}", notice);
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice);
    }
}
