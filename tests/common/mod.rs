//! Shared test fixtures
//!
//! `ScriptedEngine` answers polls from a queue of scripted steps so session
//! scenarios can be driven deterministically under a paused tokio clock.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;
use websecscan::catalog::{ScanProfile, ScanTypeCatalog};
use websecscan::engine::{
    AlertSummary, EngineError, EnginePhase, EngineResult, EngineSessionHandle, EngineStatus,
    ScanEngineClient,
};
use websecscan::session::{ScanSessionController, SessionConfig, SessionEvent, SessionEvents};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One scripted answer to `poll`
pub enum PollStep {
    Answer(EngineResult<EngineStatus>),
    /// Block until the gate is notified, then answer
    Held(Arc<Notify>, EngineResult<EngineStatus>),
}

pub struct ScriptedEngine {
    script: Mutex<VecDeque<PollStep>>,
    fallback: Mutex<EngineResult<EngineStatus>>,
    start_error: Mutex<Option<EngineError>>,
    stop_result: Mutex<EngineResult<()>>,
    start_calls: Mutex<usize>,
    stop_calls: Mutex<usize>,
    polled_handles: Mutex<Vec<EngineSessionHandle>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(EngineStatus::running(None))),
            start_error: Mutex::new(None),
            stop_result: Mutex::new(Ok(())),
            start_calls: Mutex::new(0),
            stop_calls: Mutex::new(0),
            polled_handles: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, answer: EngineResult<EngineStatus>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(PollStep::Answer(answer));
        self
    }

    pub fn then_repeat(self, answer: EngineResult<EngineStatus>, times: usize) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for _ in 0..times {
                script.push_back(PollStep::Answer(answer.clone()));
            }
        }
        self
    }

    pub fn then_held(self, gate: Arc<Notify>, answer: EngineResult<EngineStatus>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(PollStep::Held(gate, answer));
        self
    }

    /// Answer used once the script runs out
    pub fn otherwise(self, answer: EngineResult<EngineStatus>) -> Self {
        *self.fallback.lock().unwrap() = answer;
        self
    }

    pub fn failing_start(self, error: EngineError) -> Self {
        *self.start_error.lock().unwrap() = Some(error);
        self
    }

    pub fn failing_stop(self, error: EngineError) -> Self {
        *self.stop_result.lock().unwrap() = Err(error);
        self
    }

    pub fn start_calls(&self) -> usize {
        *self.start_calls.lock().unwrap()
    }

    pub fn poll_calls(&self) -> usize {
        self.polled_handles.lock().unwrap().len()
    }

    pub fn stop_calls(&self) -> usize {
        *self.stop_calls.lock().unwrap()
    }

    pub fn polled_engine_ids(&self) -> Vec<String> {
        self.polled_handles
            .lock()
            .unwrap()
            .iter()
            .map(|handle| handle.engine_id.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.start_calls() + self.poll_calls() + self.stop_calls()
    }
}

#[async_trait]
impl ScanEngineClient for ScriptedEngine {
    fn endpoint(&self) -> &str {
        "scripted://engine"
    }

    async fn start(
        &self,
        target: &Url,
        _profile: &ScanProfile,
        _excluded_url_patterns: &[String],
    ) -> EngineResult<EngineSessionHandle> {
        *self.start_calls.lock().unwrap() += 1;
        let start_error = self.start_error.lock().unwrap().clone();
        match start_error {
            Some(error) => Err(error),
            None => Ok(EngineSessionHandle::new("1", EnginePhase::Active, target)),
        }
    }

    async fn poll(&self, handle: &EngineSessionHandle) -> EngineResult<EngineStatus> {
        self.polled_handles.lock().unwrap().push(handle.clone());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(PollStep::Answer(answer)) => answer,
            Some(PollStep::Held(gate, answer)) => {
                gate.notified().await;
                answer
            }
            None => {
                let fallback = self.fallback.lock().unwrap().clone();
                fallback
            }
        }
    }

    async fn stop(&self, _handle: &EngineSessionHandle) -> EngineResult<()> {
        *self.stop_calls.lock().unwrap() += 1;
        self.stop_result.lock().unwrap().clone()
    }

    async fn alert_summary(&self, _target: &Url) -> EngineResult<AlertSummary> {
        Ok(AlertSummary::default())
    }
}

pub fn unreachable() -> EngineError {
    EngineError::Unreachable {
        endpoint: "scripted://engine".to_string(),
        detail: "connection refused".to_string(),
    }
}

pub fn controller_for(engine: &Arc<ScriptedEngine>) -> ScanSessionController {
    ScanSessionController::new(
        Arc::new(ScanTypeCatalog::builtin()),
        Arc::clone(engine) as Arc<dyn ScanEngineClient>,
        SessionConfig {
            poll_interval: POLL_INTERVAL,
            ..SessionConfig::default()
        },
    )
}

/// Collect every event up to and including the terminal one
pub async fn collect_events(mut events: SessionEvents) -> Vec<SessionEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        let terminal = event.is_terminal();
        collected.push(event);
        if terminal {
            break;
        }
    }
    collected
}

pub fn assert_monotonic(events: &[SessionEvent]) {
    for pair in events.windows(2) {
        assert!(
            pair[1].progress_percent >= pair[0].progress_percent,
            "progress regressed from {} to {}",
            pair[0].progress_percent,
            pair[1].progress_percent
        );
    }
}
