// src/desk.rs
//! The leave desk: one submission form, the request store and the duplicate
//! guard wired together, plus the manager-only lifecycle operations.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backing_store::BackingStore;
use crate::clock::Clock;
use crate::duplicate_guard::{DuplicateGuard, GuardStatus, LockConfig, SharedForm};
use crate::error::{LifecycleError, SubmitError};
use crate::form::SubmissionForm;
use crate::lifecycle::{find_request, plan_status_change};
use crate::notice::{Notice, NoticeSink};
use crate::report::{filtered, ReportFilter};
use crate::request::{Request, RequestId, RequestStatus};
use crate::session::{ManagerSession, DEFAULT_SESSION_TTL_MINS};
use crate::store::{RefreshOutcome, RequestStore, Snapshot};

pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1500;

#[derive(Debug, Clone, Copy)]
pub struct DeskSettings {
    pub require_reason: bool,
    /// Pause after a manager write before re-reading the store.
    pub settle_delay: Duration,
    pub session_ttl: chrono::Duration,
    pub lock: LockConfig,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            require_reason: true,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            session_ttl: chrono::Duration::minutes(DEFAULT_SESSION_TTL_MINS),
            lock: LockConfig::default(),
        }
    }
}

/// Safe to share behind an `Arc`; no lock is held across an await.
/// Must be created and used inside a Tokio runtime.
pub struct LeaveDesk {
    store: RequestStore<dyn BackingStore>,
    form: SharedForm,
    guard: Mutex<DuplicateGuard>,
    notices: Arc<dyn NoticeSink>,
    clock: Arc<dyn Clock>,
    settings: DeskSettings,
    last_id: AtomicI64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LeaveDesk {
    pub fn new(
        backend: Arc<dyn BackingStore>,
        settings: DeskSettings,
        notices: Arc<dyn NoticeSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let form: SharedForm = Arc::new(Mutex::new(SubmissionForm::default()));
        let guard = DuplicateGuard::new(settings.lock, form.clone(), notices.clone());
        Self {
            store: RequestStore::new(backend),
            form,
            guard: Mutex::new(guard),
            notices,
            clock,
            settings,
            last_id: AtomicI64::new(0),
        }
    }

    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    // --- Reading ---

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    /// Rows for the table and the export, in store order.
    pub fn report(&self, filter: &ReportFilter) -> Vec<Request> {
        let snapshot = self.store.snapshot();
        filtered(&snapshot, filter).into_iter().cloned().collect()
    }

    pub fn guard_status(&self) -> GuardStatus {
        lock(&self.guard).status()
    }

    pub fn subscribe_guard(&self) -> watch::Receiver<GuardStatus> {
        lock(&self.guard).subscribe()
    }

    pub fn form(&self) -> SubmissionForm {
        lock(&self.form).clone()
    }

    /// Re-reads the store and re-checks the form against the new contents.
    pub async fn refresh(&self) -> RefreshOutcome {
        let outcome = self.store.refresh().await;
        if let RefreshOutcome::Replaced(_) = outcome {
            let snapshot = self.store.snapshot();
            lock(&self.guard).evaluate(&snapshot);
        }
        outcome
    }

    // --- Form editing ---

    pub fn set_name(&self, name: &str) {
        lock(&self.form).staff_name = name.to_string();
        self.recheck_duplicates();
    }

    pub fn set_date(&self, date: Option<NaiveDate>) {
        lock(&self.form).date = date;
        self.recheck_duplicates();
    }

    pub fn set_time_in(&self, raw: &str) {
        lock(&self.form).time_in.set(raw);
    }

    pub fn set_time_out(&self, raw: &str) {
        lock(&self.form).time_out.set(raw);
    }

    pub fn blur_time_in(&self) {
        lock(&self.form).time_in.blur();
    }

    pub fn blur_time_out(&self) {
        lock(&self.form).time_out.blur();
    }

    pub fn set_reason(&self, reason: &str) {
        lock(&self.form).reason = reason.to_string();
    }

    // Form lock is released before the guard lock is taken; the guard takes
    // the form lock itself.
    fn recheck_duplicates(&self) {
        let snapshot = self.store.snapshot();
        lock(&self.guard).evaluate(&snapshot);
    }

    /// Stops the duplicate countdown, e.g. when the desk is closed.
    pub fn teardown(&self) {
        lock(&self.guard).teardown();
    }

    // --- Submission ---

    pub async fn submit(&self) -> Result<RequestId, SubmitError> {
        if let GuardStatus::Locked {
            conflicting_date, ..
        } = self.guard_status()
        {
            warn!("Submit refused: duplicate lock active for {}", conflicting_date);
            return Err(SubmitError::DuplicateLocked {
                date: conflicting_date,
            });
        }

        let validated = lock(&self.form)
            .validate(self.settings.require_reason)
            .map_err(|problems| {
                debug!("Submit refused by validation: {:?}", problems);
                SubmitError::Validation(problems)
            })?;

        let request = Request {
            id: self.next_id(),
            staff_name: validated.staff_name,
            date: validated.date,
            time_in: Some(validated.time_in),
            time_out: Some(validated.time_out),
            reason: validated.reason,
            status: RequestStatus::Pending,
        };
        let id = request.id;

        if let Err(e) = self.store.backend().append(&request).await {
            error!("Submitting request {} failed: {}", id, e);
            self.notices.send(Notice::SubmitFailed {
                reason: e.to_string(),
            });
            return Err(SubmitError::Transport(e));
        }

        info!(
            "Request {} submitted for {} on {}",
            id, request.staff_name, request.date
        );
        lock(&self.form).clear();
        self.recheck_duplicates();
        self.notices.send(Notice::SubmitSucceeded { id });
        self.refresh().await;
        Ok(id)
    }

    // Millisecond timestamp, bumped past the last id this desk handed out.
    // Ids already in the store are not consulted; a stray huge `no` in the
    // sheet must not push new ids off the clock.
    fn next_id(&self) -> RequestId {
        let now = self.clock.now().timestamp_millis();
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        RequestId(now.max(previous.saturating_add(1)))
    }

    // --- Manager operations ---

    fn authorize(&self, session: Option<&ManagerSession>) -> Result<(), LifecycleError> {
        match session {
            Some(s) if s.is_valid(self.clock.now(), self.settings.session_ttl) => Ok(()),
            Some(_) => {
                warn!("Manager session expired");
                Err(LifecycleError::Unauthorized)
            }
            None => {
                warn!("Manager operation attempted without a session");
                Err(LifecycleError::Unauthorized)
            }
        }
    }

    pub async fn update_status(
        &self,
        session: Option<&ManagerSession>,
        id: RequestId,
        status: RequestStatus,
    ) -> Result<(), LifecycleError> {
        self.authorize(session)?;
        {
            let snapshot = self.store.snapshot();
            let request = plan_status_change(&snapshot, id, status)?;
            info!(
                "Marking request {} ({} on {}) as {}",
                id, request.staff_name, request.date, status
            );
        }

        self.store
            .backend()
            .set_status(id, status)
            .await
            .map_err(|e| {
                error!("Status update for {} failed: {}", id, e);
                LifecycleError::Transport(e)
            })?;

        self.notices.send(Notice::StatusUpdated { id, status });
        self.settle_then_refresh().await;
        Ok(())
    }

    /// `confirm` sees the record about to be removed; nothing is sent unless
    /// it returns true.
    pub async fn delete_request<F>(
        &self,
        session: Option<&ManagerSession>,
        id: RequestId,
        confirm: F,
    ) -> Result<(), LifecycleError>
    where
        F: FnOnce(&Request) -> bool,
    {
        self.authorize(session)?;
        {
            let snapshot = self.store.snapshot();
            let request = find_request(&snapshot, id)?;
            if !confirm(request) {
                info!("Deletion of request {} cancelled", id);
                return Err(LifecycleError::NotConfirmed);
            }
        }

        self.store.backend().delete(id).await.map_err(|e| {
            error!("Deleting request {} failed: {}", id, e);
            LifecycleError::Transport(e)
        })?;

        info!("Request {} deleted", id);
        self.notices.send(Notice::RequestDeleted { id });
        self.settle_then_refresh().await;
        Ok(())
    }

    async fn settle_then_refresh(&self) {
        debug!(
            "Waiting {:?} for the backing store to settle",
            self.settings.settle_delay
        );
        tokio::time::sleep(self.settings.settle_delay).await;
        self.refresh().await;
    }
}
