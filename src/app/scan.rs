//! The `scan` command: one supervised session from start to outcome

use super::cli::args::ScanArgs;
use super::cli::config::AppConfig;
use super::cli::display::print_alert_summary;
use super::progress::{should_redraw, ProgressLine};
use crate::catalog::ScanTypeCatalog;
use crate::core::error_handling::log_error_with_context;
use crate::core::retry::{retry_async, RetryPolicy};
use crate::core::shutdown::{ShutdownCoordinator, INTERRUPTED_EXIT_CODE};
use crate::engine::{EngineError, ScanEngineClient, ZapEngineClient};
use crate::session::{
    ScanRequest, ScanResultHandle, ScanSessionController, SessionEvent, SessionState,
};
use std::sync::Arc;
use url::Url;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Run a scan and map its outcome to a process exit code
pub async fn run_scan(
    config: &AppConfig,
    scan: &ScanArgs,
    shutdown: &ShutdownCoordinator,
    use_color: bool,
) -> i32 {
    let catalog = match ScanTypeCatalog::with_overrides(&config.profile_durations) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("FATAL: Invalid profile configuration: {}", e);
            return EXIT_FAILURE;
        }
    };
    let engine: Arc<dyn ScanEngineClient> = match ZapEngineClient::new(config.zap_config()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log_error_with_context(&e, "Creating scan engine client");
            return EXIT_FAILURE;
        }
    };
    log::debug!("Using scan engine at {}", engine.endpoint());

    let controller = ScanSessionController::new(
        Arc::new(catalog),
        Arc::clone(&engine),
        config.session_config(),
    );
    let request = ScanRequest::new(scan.target.as_str(), scan.profile.as_str())
        .with_authorization(scan.authorized)
        .with_excluded_patterns(scan.exclude.clone());

    let Some(terminal) = supervise(&controller, request, shutdown, use_color).await else {
        return if shutdown.is_shutdown_requested() {
            INTERRUPTED_EXIT_CODE
        } else {
            EXIT_FAILURE
        };
    };

    match terminal.state {
        SessionState::Completed => {
            if let Some(result) = &terminal.result {
                report_alerts(engine.as_ref(), result, use_color).await;
            }
            EXIT_SUCCESS
        }
        SessionState::Stopped => INTERRUPTED_EXIT_CODE,
        _ => {
            if let Some(error) = &terminal.error {
                log::error!("FATAL: Scan failed ({}): {}", error.kind, error.detail);
            }
            EXIT_FAILURE
        }
    }
}

/// Start the session and follow its events, turning interrupts into a stop
///
/// Returns the terminal event, or `None` when the session never started.
async fn supervise(
    controller: &ScanSessionController,
    request: ScanRequest,
    shutdown: &ShutdownCoordinator,
    use_color: bool,
) -> Option<SessionEvent> {
    let mut shutdown_rx = shutdown.subscribe();
    // A signal delivered before subscribing is only visible through the flag
    if shutdown.is_shutdown_requested() {
        log::warn!("Interrupted before the scan started");
        return None;
    }
    let mut stop_requested = false;

    let start = controller.start(request);
    tokio::pin!(start);
    let started = loop {
        tokio::select! {
            started = &mut start => break started,
            _ = shutdown_rx.recv(), if !stop_requested => {
                stop_requested = true;
                log::warn!("Interrupt received while starting; stopping once the engine answers");
                if let Err(e) = controller.request_stop() {
                    log_error_with_context(&e, "Stopping scan session");
                }
            }
        }
    };

    let mut events = match started {
        Ok(events) => events,
        Err(e) => {
            log_error_with_context(&e, "Starting scan session");
            return None;
        }
    };

    let mut progress = ProgressLine::new(should_redraw(), use_color);
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    progress.update(&event);
                    if event.is_terminal() {
                        return Some(event);
                    }
                }
                None => return controller.last_event().filter(SessionEvent::is_terminal),
            },
            _ = shutdown_rx.recv(), if !stop_requested => {
                stop_requested = true;
                progress.clear();
                log::warn!("Interrupt received, stopping scan (press Ctrl-C again to abort)");
                if let Err(e) = controller.request_stop() {
                    log_error_with_context(&e, "Stopping scan session");
                }
            }
        }
    }
}

async fn report_alerts(engine: &dyn ScanEngineClient, result: &ScanResultHandle, use_color: bool) {
    let target = match Url::parse(&result.target) {
        Ok(target) => target,
        Err(e) => {
            log::warn!("Cannot fetch alerts for '{}': {}", result.target, e);
            return;
        }
    };

    let summary = retry_async(
        "alert_summary",
        RetryPolicy::default(),
        EngineError::is_transient,
        || engine.alert_summary(&target),
    )
    .await;

    match summary {
        Ok(summary) => {
            println!();
            print_alert_summary(&summary, use_color);
        }
        Err(e) => log::warn!("Scan completed but the alert summary is unavailable: {}", e),
    }
}
