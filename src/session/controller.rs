//! Scan session state machine
//!
//! One controller owns at most one session at a time. `start` validates the
//! request and opens the engine session; a spawned poll loop then drives the
//! session to a terminal state. Every terminal transition goes through
//! `Shared::commit_terminal`, which refuses to overwrite an earlier one, so a
//! stop racing a completion can never produce two outcomes.

use crate::catalog::{ScanProfile, ScanTypeCatalog};
use crate::core::retry::{RetryBudget, RetryDecision};
use crate::core::sync::handle_mutex_poison;
use crate::core::time::{SystemTimeProvider, TimeProvider};
use crate::core::validation::{
    merge_exclusion_patterns, validate_exclusion_pattern, validate_target_url,
};
use crate::engine::{
    EngineError, EngineResult, EngineSessionHandle, EngineState, EngineStatus, ScanEngineClient,
};
use crate::session::authorization::AuthorizationGate;
use crate::session::error::{ErrorKind, SessionError, SessionResult};
use crate::session::estimator::ProgressEstimator;
use crate::session::events::{SessionEvent, SessionEvents};
use crate::session::types::{ScanRequest, ScanSession, SessionState};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Notify};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_TRANSIENT_FAILURES: usize = 3;

/// URL patterns never sent traffic unless the operator opts out
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    ".*/logout.*",
    ".*/signout.*",
    ".*/deconnexion.*",
    ".*/admin/delete.*",
    ".*/delete.*",
];

const STOPPED_BY_OPERATOR: &str = "stopped by operator";

/// Controller tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    /// Consecutive transient poll failures tolerated before the session fails
    pub max_transient_failures: usize,
    /// Prepended to every request's exclusions
    pub default_exclusions: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_transient_failures: DEFAULT_MAX_TRANSIENT_FAILURES,
            default_exclusions: DEFAULT_EXCLUSIONS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
enum Termination {
    Completed,
    Stopped { reason: String },
    Failed { kind: ErrorKind, detail: String },
}

#[derive(Default)]
struct SessionSlot {
    session: Option<ScanSession>,
    stop_requested: bool,
    /// Wakes the poll loop early; one per session
    stop_signal: Arc<Notify>,
    events_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    /// Monotonic reading taken on entering `Running`
    running_since: Option<Instant>,
}

impl SessionSlot {
    fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, |session| session.state)
    }

    fn is_live(&self) -> bool {
        matches!(self.state(), SessionState::Starting | SessionState::Running)
    }
}

/// State shared between the controller and its poll loop
struct Shared {
    slot: Mutex<SessionSlot>,
    state_tx: watch::Sender<Option<SessionEvent>>,
    clock: Arc<dyn TimeProvider>,
}

impl Shared {
    fn lock(&self) -> SessionResult<MutexGuard<'_, SessionSlot>> {
        handle_mutex_poison(self.slot.lock(), |detail| SessionError::InternalFault {
            detail,
        })
    }

    /// Deliver the current snapshot to the event stream and the watch channel
    fn publish(
        &self,
        slot: &mut SessionSlot,
        decorate: impl FnOnce(SessionEvent) -> SessionEvent,
    ) {
        let Some(session) = slot.session.as_ref() else {
            return;
        };
        let event = decorate(SessionEvent::snapshot(session, self.clock.system_time()));
        let terminal = event.is_terminal();

        if let Some(tx) = slot.events_tx.as_ref() {
            if tx.send(event.clone()).is_err() {
                log::trace!("Event receiver for {} dropped", event.session_id);
            }
        }
        self.state_tx.send_replace(Some(event));

        if terminal {
            slot.events_tx = None;
        }
    }

    /// Commit a terminal state unless one was already committed
    fn commit_terminal(&self, slot: &mut SessionSlot, termination: Termination) -> bool {
        let Some(session) = slot.session.as_mut() else {
            return false;
        };
        if session.state.is_terminal() {
            log::debug!(
                "Session {} already {}, ignoring {:?}",
                session.session_id,
                session.state,
                termination
            );
            return false;
        }

        let mut error = None;
        match &termination {
            Termination::Completed => {
                session.state = SessionState::Completed;
                session.progress_percent = 100.0;
                session.remaining_seconds = 0;
                log::info!("Session {} completed", session.session_id);
            }
            Termination::Stopped { reason } => {
                session.state = SessionState::Stopped;
                session.termination_reason = Some(reason.clone());
                log::info!("Session {} stopped: {}", session.session_id, reason);
            }
            Termination::Failed { kind, detail } => {
                session.state = SessionState::Failed;
                session.termination_reason = Some(detail.clone());
                error = Some((*kind, detail.clone()));
                if *kind == ErrorKind::InternalFault {
                    log::error!(
                        "Session {} failed with internal fault (target {}, profile {}): {}",
                        session.session_id,
                        session.request.target_url,
                        session.profile.id,
                        detail
                    );
                } else {
                    log::info!("Session {} failed ({}): {}", session.session_id, kind, detail);
                }
            }
        }
        let result = match termination {
            Termination::Completed => session.result_handle(),
            _ => None,
        };
        slot.running_since = None;

        self.publish(slot, |event| {
            let event = event.with_result(result);
            match error {
                Some((kind, detail)) => event.with_error(kind, detail),
                None => event,
            }
        });
        true
    }

    /// Last-resort failure path that also works on a poisoned lock
    fn fail_internal(&self, detail: String) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        self.commit_terminal(
            &mut slot,
            Termination::Failed {
                kind: ErrorKind::InternalFault,
                detail,
            },
        );
    }
}

/// Supervises a single scan session against one engine
pub struct ScanSessionController {
    catalog: Arc<ScanTypeCatalog>,
    engine: Arc<dyn ScanEngineClient>,
    config: SessionConfig,
    shared: Arc<Shared>,
}

impl ScanSessionController {
    pub fn new(
        catalog: Arc<ScanTypeCatalog>,
        engine: Arc<dyn ScanEngineClient>,
        config: SessionConfig,
    ) -> Self {
        Self::with_clock(catalog, engine, config, Arc::new(SystemTimeProvider))
    }

    pub fn with_clock(
        catalog: Arc<ScanTypeCatalog>,
        engine: Arc<dyn ScanEngineClient>,
        config: SessionConfig,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        let (state_tx, _) = watch::channel(None);
        Self {
            catalog,
            engine,
            config,
            shared: Arc::new(Shared {
                slot: Mutex::new(SessionSlot::default()),
                state_tx,
                clock,
            }),
        }
    }

    pub fn catalog(&self) -> &ScanTypeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a session and return its event stream
    ///
    /// Precondition failures are returned here and leave the controller
    /// `Idle`. Once the engine has been asked to start, every outcome
    /// (including an engine refusal) arrives as an event on the stream.
    pub async fn start(&self, request: ScanRequest) -> SessionResult<SessionEvents> {
        let (target, profile, exclusions, session_id, events) = {
            let mut slot = self.shared.lock()?;
            let state = slot.state();
            if state != SessionState::Idle {
                return Err(SessionError::SessionAlreadyActive { state });
            }

            let target = validate_target_url(&request.target_url).map_err(|reason| {
                SessionError::InvalidTarget {
                    target: request.target_url.clone(),
                    reason,
                }
            })?;
            let profile = self.catalog.lookup(&request.profile_id)?.clone();
            AuthorizationGate::check(&request, &profile)?;
            let exclusions = self.resolve_exclusions(&request)?;

            let session_id =
                generate_session_id(&target, &profile, self.shared.clock.system_time());
            let (tx, rx) = mpsc::unbounded_channel();

            slot.session = Some(ScanSession::new(
                session_id.clone(),
                request,
                profile.clone(),
                exclusions.clone(),
            ));
            slot.stop_requested = false;
            slot.stop_signal = Arc::new(Notify::new());
            slot.events_tx = Some(tx);
            slot.running_since = None;
            self.shared.publish(&mut slot, |event| event);

            (target, profile, exclusions, session_id.clone(), SessionEvents::new(session_id, rx))
        };

        log::info!(
            "Session {} starting: {} scan of {} ({} exclusions)",
            session_id,
            profile.id,
            target,
            exclusions.len()
        );

        let mut guard = StartGuard::new(Arc::clone(&self.shared));
        let started = self.engine.start(&target, &profile, &exclusions).await;
        guard.disarm();

        match started {
            Ok(handle) => self.enter_running(handle, &profile).await?,
            Err(error) => {
                let (kind, detail) = classify(error);
                let mut slot = self.shared.lock()?;
                self.shared
                    .commit_terminal(&mut slot, Termination::Failed { kind, detail });
            }
        }

        Ok(events)
    }

    async fn enter_running(
        &self,
        handle: EngineSessionHandle,
        profile: &ScanProfile,
    ) -> SessionResult<()> {
        let stop_requested = {
            let mut slot = self.shared.lock()?;
            if let Some(session) = slot.session.as_mut() {
                session.engine_handle = Some(handle.clone());
            }
            slot.stop_requested
        };

        if stop_requested {
            log::info!(
                "Stop requested while starting; stopping engine session {}",
                handle.engine_id
            );
            let reason = stop_reason(self.engine.stop(&handle).await);
            let mut slot = self.shared.lock()?;
            self.shared
                .commit_terminal(&mut slot, Termination::Stopped { reason });
            return Ok(());
        }

        {
            let mut slot = self.shared.lock()?;
            slot.running_since = Some(self.shared.clock.now());
            let Some(session) = slot.session.as_mut() else {
                return Err(SessionError::InternalFault {
                    detail: "session vanished while starting".to_string(),
                });
            };
            session.state = SessionState::Running;
            session.started_at = Some(self.shared.clock.system_time());
            log::info!(
                "Session {} running (engine {} {})",
                session.session_id,
                handle.phase,
                handle.engine_id
            );
            self.shared.publish(&mut slot, |event| event);
        }

        let stop_signal = Arc::clone(&self.shared.lock()?.stop_signal);
        let poll_loop = PollLoop {
            engine: Arc::clone(&self.engine),
            shared: Arc::clone(&self.shared),
            stop_signal,
            handle,
            interval: self.config.poll_interval,
            expected: profile.expected_duration,
            budget: RetryBudget::new(self.config.max_transient_failures),
        };
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            match tokio::spawn(poll_loop.run()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => shared.fail_internal(error.to_string()),
                Err(join_error) => {
                    shared.fail_internal(format!("poll loop aborted: {}", join_error))
                }
            }
        });
        Ok(())
    }

    fn resolve_exclusions(&self, request: &ScanRequest) -> SessionResult<Vec<String>> {
        let mut extra = Vec::with_capacity(request.excluded_url_patterns.len());
        for pattern in &request.excluded_url_patterns {
            let pattern = validate_exclusion_pattern(pattern).map_err(|reason| {
                SessionError::InvalidExclusionPattern {
                    pattern: pattern.clone(),
                    reason,
                }
            })?;
            extra.push(pattern);
        }
        Ok(merge_exclusion_patterns(
            &self.config.default_exclusions,
            &extra,
        ))
    }

    /// Ask the live session to stop without waiting for it
    ///
    /// Returns false when there is no live session.
    pub fn request_stop(&self) -> SessionResult<bool> {
        let mut slot = self.shared.lock()?;
        if !slot.is_live() {
            return Ok(false);
        }
        if !slot.stop_requested {
            log::debug!("Stop requested in state {}", slot.state());
            slot.stop_requested = true;
        }
        let stop_signal = Arc::clone(&slot.stop_signal);
        drop(slot);
        stop_signal.notify_one();
        Ok(true)
    }

    /// Stop the live session and wait for its terminal state
    ///
    /// Returns the state the session ended in. This is `Completed` when a
    /// completion was committed before the stop took effect. Without a live
    /// session the current state is returned unchanged.
    pub async fn stop(&self) -> SessionResult<SessionState> {
        let session_id = {
            let slot = self.shared.lock()?;
            match slot.session.as_ref() {
                Some(session) if slot.is_live() => session.session_id.clone(),
                _ => return Ok(slot.state()),
            }
        };

        let mut updates = self.shared.state_tx.subscribe();
        self.request_stop()?;

        let terminal = updates
            .wait_for(|event| {
                event
                    .as_ref()
                    .is_some_and(|e| e.session_id == session_id && e.is_terminal())
            })
            .await
            .map_err(|e| SessionError::InternalFault {
                detail: format!("session state channel closed: {}", e),
            })?;
        Ok(terminal
            .as_ref()
            .map_or(SessionState::Idle, |event| event.state))
    }

    /// Return a finished controller to `Idle`
    pub fn reset(&self) -> SessionResult<()> {
        let mut slot = self.shared.lock()?;
        if slot.is_live() {
            return Err(SessionError::SessionAlreadyActive {
                state: slot.state(),
            });
        }
        *slot = SessionSlot::default();
        self.shared.state_tx.send_replace(None);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.shared
            .state_tx
            .borrow()
            .as_ref()
            .map_or(SessionState::Idle, |event| event.state)
    }

    /// The most recently emitted event
    pub fn last_event(&self) -> Option<SessionEvent> {
        self.shared.state_tx.borrow().clone()
    }

    /// Snapshot of the current session
    pub fn session(&self) -> SessionResult<Option<ScanSession>> {
        Ok(self.shared.lock()?.session.clone())
    }

    /// Watch every emitted event
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionEvent>> {
        self.shared.state_tx.subscribe()
    }
}

impl Drop for ScanSessionController {
    fn drop(&mut self) {
        if let Ok(true) = self.request_stop() {
            log::debug!("Controller dropped with a live session; stop requested");
        }
    }
}

/// Fails the session if the `start` future is dropped while the engine call is pending
struct StartGuard {
    shared: Arc<Shared>,
    armed: bool,
}

impl StartGuard {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if self.armed {
            self.shared
                .fail_internal("start abandoned before the engine responded".to_string());
        }
    }
}

struct PollLoop {
    engine: Arc<dyn ScanEngineClient>,
    shared: Arc<Shared>,
    stop_signal: Arc<Notify>,
    handle: EngineSessionHandle,
    interval: Duration,
    expected: Duration,
    budget: RetryBudget,
}

impl PollLoop {
    async fn run(mut self) -> SessionResult<()> {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.stop_signal.notified() => {}
            }

            let stop_requested = {
                let slot = self.shared.lock()?;
                if slot.state().is_terminal() {
                    return Ok(());
                }
                slot.stop_requested
            };
            if stop_requested {
                let reason = stop_reason(self.engine.stop(&self.handle).await);
                let mut slot = self.shared.lock()?;
                self.shared
                    .commit_terminal(&mut slot, Termination::Stopped { reason });
                return Ok(());
            }

            let polled = self.engine.poll(&self.handle).await;
            if self.apply(polled)?.is_break() {
                return Ok(());
            }
        }
    }

    fn apply(&mut self, polled: EngineResult<EngineStatus>) -> SessionResult<ControlFlow<()>> {
        let mut slot = self.shared.lock()?;
        if slot.state().is_terminal() {
            return Ok(ControlFlow::Break(()));
        }

        let status = match polled {
            Ok(status) => {
                self.budget.record_success();
                status
            }
            Err(error) if error.is_transient() => {
                return match self.budget.record_failure() {
                    RetryDecision::Retry { failures, ceiling } => {
                        log::warn!(
                            "Transient engine fault ({}/{}), retrying next tick: {}",
                            failures,
                            ceiling,
                            error
                        );
                        Ok(ControlFlow::Continue(()))
                    }
                    RetryDecision::Exhausted { failures } => {
                        let (kind, detail) = classify(error);
                        self.shared.commit_terminal(
                            &mut slot,
                            Termination::Failed {
                                kind,
                                detail: format!(
                                    "{} (after {} consecutive failures)",
                                    detail, failures
                                ),
                            },
                        );
                        Ok(ControlFlow::Break(()))
                    }
                };
            }
            Err(error) => {
                let (kind, detail) = classify(error);
                self.shared
                    .commit_terminal(&mut slot, Termination::Failed { kind, detail });
                return Ok(ControlFlow::Break(()));
            }
        };

        if let Some(next) = status.continuation.clone() {
            log::info!(
                "Engine moved to {} phase (engine id {})",
                next.phase,
                next.engine_id
            );
            if let Some(session) = slot.session.as_mut() {
                session.engine_handle = Some(next.clone());
            }
            self.handle = next;
        }

        let confirmed_done = status.continuation.is_none()
            && status.raw_progress.is_some_and(|p| p.is_finite() && p >= 100.0);

        match status.state {
            EngineState::Succeeded => {
                self.shared.commit_terminal(&mut slot, Termination::Completed);
                Ok(ControlFlow::Break(()))
            }
            EngineState::Running if confirmed_done => {
                self.shared.commit_terminal(&mut slot, Termination::Completed);
                Ok(ControlFlow::Break(()))
            }
            EngineState::Failed => {
                let detail = status
                    .fault_detail
                    .unwrap_or_else(|| "engine reported failure".to_string());
                self.shared.commit_terminal(
                    &mut slot,
                    Termination::Failed {
                        kind: ErrorKind::EngineRejected,
                        detail,
                    },
                );
                Ok(ControlFlow::Break(()))
            }
            EngineState::Running => {
                let elapsed = slot
                    .running_since
                    .map(|since| self.shared.clock.now().saturating_duration_since(since))
                    .unwrap_or_default();
                let Some(session) = slot.session.as_mut() else {
                    return Ok(ControlFlow::Break(()));
                };
                let estimate = ProgressEstimator::estimate(
                    self.expected,
                    elapsed,
                    status.raw_progress,
                    session.progress_percent,
                );
                session.progress_percent = estimate.progress_percent;
                session.remaining_seconds = estimate.remaining_seconds;
                log::debug!(
                    "Session {} at {:.1}%, ~{}s remaining",
                    session.session_id,
                    estimate.progress_percent,
                    estimate.remaining_seconds
                );
                self.shared.publish(&mut slot, |event| event);
                Ok(ControlFlow::Continue(()))
            }
        }
    }
}

/// Error kind and event detail for an engine fault
fn classify(error: EngineError) -> (ErrorKind, String) {
    let detail = error.to_string();
    (SessionError::from(error).kind(), detail)
}

fn stop_reason(engine_stop: EngineResult<()>) -> String {
    match engine_stop {
        Ok(()) => STOPPED_BY_OPERATOR.to_string(),
        Err(error) => {
            log::warn!("Engine did not acknowledge stop: {}", error);
            format!("{}; engine stop failed: {}", STOPPED_BY_OPERATOR, error)
        }
    }
}

/// `scan-` followed by 12 hex chars of SHA-256 over target, profile and start time
fn generate_session_id(target: &Url, profile: &ScanProfile, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(target.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(profile.id.as_bytes());
    hasher.update(b"\n");
    hasher.update(at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true).as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());
    format!("scan-{}", &hash_hex[..12])
}
