// src/duplicate_guard.rs
//! Soft lock against submitting a second request for the same person and day.
//!
//! `Idle -> Locked -> Idle`. Entering `Locked` starts one countdown task; when
//! it runs out the conflicting date is cleared from the form so the user can
//! pick another day without retyping everything else.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::form::SubmissionForm;
use crate::notice::{Notice, NoticeSink};
use crate::request::{normalize_name, Request};

pub const DEFAULT_LOCK_WINDOW_TICKS: u32 = 4;
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub type SharedForm = Arc<Mutex<SubmissionForm>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    pub window_ticks: u32,
    pub tick: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            window_ticks: DEFAULT_LOCK_WINDOW_TICKS,
            tick: DEFAULT_TICK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuardStatus {
    #[default]
    Idle,
    Locked {
        staff_name: String,
        conflicting_date: NaiveDate,
        remaining: u32,
    },
}

impl GuardStatus {
    pub fn is_locked(&self) -> bool {
        matches!(self, GuardStatus::Locked { .. })
    }
}

/// True when `snapshot` already holds a request for this name and date.
/// Names compare trimmed and case-insensitively; an empty name never matches.
pub fn find_duplicate<'a>(
    snapshot: &'a [Request],
    staff_name: &str,
    date: NaiveDate,
) -> Option<&'a Request> {
    let wanted = normalize_name(staff_name);
    if wanted.is_empty() {
        return None;
    }
    snapshot
        .iter()
        .find(|r| r.date == date && r.normalized_name() == wanted)
}

// State reachable from the countdown task.
struct GuardShared {
    status: watch::Sender<GuardStatus>,
    // Bumped on every re-evaluation; a countdown holding an older value is stale.
    generation: AtomicU64,
    form: SharedForm,
    notices: Arc<dyn NoticeSink>,
}

fn lock_form(form: &SharedForm) -> MutexGuard<'_, SubmissionForm> {
    form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the lock state and the single countdown timer. Must be used from
/// inside a Tokio runtime.
pub struct DuplicateGuard {
    config: LockConfig,
    shared: Arc<GuardShared>,
    timer: Option<JoinHandle<()>>,
}

impl DuplicateGuard {
    pub fn new(config: LockConfig, form: SharedForm, notices: Arc<dyn NoticeSink>) -> Self {
        let (status, _) = watch::channel(GuardStatus::Idle);
        Self {
            config,
            shared: Arc::new(GuardShared {
                status,
                generation: AtomicU64::new(0),
                form,
                notices,
            }),
            timer: None,
        }
    }

    pub fn status(&self) -> GuardStatus {
        self.shared.status.borrow().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.shared.status.borrow().is_locked()
    }

    /// Countdown updates, one per tick.
    pub fn subscribe(&self) -> watch::Receiver<GuardStatus> {
        self.shared.status.subscribe()
    }

    /// Re-checks the form's name and date against `snapshot`. Call whenever
    /// either field or the store contents change.
    ///
    /// A re-check that finds the same conflict that is already counting down
    /// leaves that countdown alone. Anything else cancels the pending timer
    /// first and then either starts a fresh lock or returns to `Idle`.
    pub fn evaluate(&mut self, snapshot: &[Request]) {
        let shared = self.shared.clone();
        let form = lock_form(&shared.form);
        let conflict = form
            .date
            .and_then(|date| find_duplicate(snapshot, &form.staff_name, date))
            .map(|existing| (form.staff_name.trim().to_string(), existing.date));

        if let (Some((name, date)), GuardStatus::Locked {
            staff_name,
            conflicting_date,
            ..
        }) = (&conflict, &*shared.status.borrow())
        {
            if normalize_name(name) == normalize_name(staff_name) && date == conflicting_date {
                debug!("Duplicate re-check: lock for {} on {} still running", name, date);
                return;
            }
        }

        self.cancel_timer();
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match conflict {
            Some((staff_name, date)) => {
                info!(
                    "Duplicate request for {} on {}; locking submission for {} ticks",
                    staff_name, date, self.config.window_ticks
                );
                shared.status.send_replace(GuardStatus::Locked {
                    staff_name: staff_name.clone(),
                    conflicting_date: date,
                    remaining: self.config.window_ticks,
                });
                drop(form);
                shared.notices.send(Notice::DuplicateDetected {
                    staff_name,
                    date,
                    lock_secs: lock_secs(&self.config),
                });
                self.timer = Some(tokio::spawn(run_countdown(
                    shared.clone(),
                    self.config.tick,
                    generation,
                )));
            }
            None => {
                if shared.status.borrow().is_locked() {
                    debug!("Guarded inputs changed; duplicate warning dismissed");
                }
                shared.status.send_replace(GuardStatus::Idle);
            }
        }
    }

    /// Stops any countdown and returns to `Idle` without touching the form.
    pub fn teardown(&mut self) {
        self.cancel_timer();
        let shared = self.shared.clone();
        let _form = lock_form(&shared.form);
        shared.generation.fetch_add(1, Ordering::SeqCst);
        shared.status.send_replace(GuardStatus::Idle);
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

impl Drop for DuplicateGuard {
    fn drop(&mut self) {
        self.cancel_timer();
        let _form = lock_form(&self.shared.form);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock_secs(config: &LockConfig) -> u32 {
    let total = config.tick.as_secs_f64() * f64::from(config.window_ticks);
    total.round() as u32
}

async fn run_countdown(shared: Arc<GuardShared>, tick: Duration, generation: u64) {
    loop {
        tokio::time::sleep(tick).await;

        let mut form = lock_form(&shared.form);
        if shared.generation.load(Ordering::SeqCst) != generation {
            debug!("Stale duplicate countdown woke up; ignoring");
            return;
        }

        let mut released = None;
        shared.status.send_modify(|status| {
            if let GuardStatus::Locked {
                remaining,
                conflicting_date,
                ..
            } = status
            {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    released = Some(*conflicting_date);
                }
            }
        });

        match released {
            Some(date) => {
                if form.date == Some(date) {
                    form.date = None;
                }
                shared.status.send_replace(GuardStatus::Idle);
                drop(form);
                shared
                    .notices
                    .send(Notice::DuplicateLockReleased { cleared_date: date });
                return;
            }
            None => {
                if !shared.status.borrow().is_locked() {
                    return;
                }
            }
        }
    }
}
