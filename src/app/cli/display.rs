//! Terminal rendering for profiles, session events and alert summaries

use crate::catalog::ScanProfile;
use crate::core::styles::StyleRole;
use crate::engine::{AlertSummary, RiskLevel};
use crate::session::{format_remaining, SessionEvent, SessionState};
use prettytable::{format, Cell, Row, Table};
use strum::IntoEnumIterator;

fn cell(text: &str, role: StyleRole, use_color: bool) -> Cell {
    let cell = Cell::new(text);
    match role.to_prettytable_spec() {
        Some(spec) if use_color => cell.style_spec(&spec),
        _ => cell,
    }
}

fn header_row(titles: &[&str], use_color: bool) -> Row {
    Row::new(
        titles
            .iter()
            .map(|title| cell(title, StyleRole::Header, use_color))
            .collect(),
    )
}

/// Table of scan profiles in catalog order
pub fn profile_table(profiles: &[ScanProfile], use_color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(header_row(
        &["Profile", "Name", "Duration", "Intrusive", "Description"],
        use_color,
    ));

    for profile in profiles {
        let intrusive = if profile.intrusive { "yes" } else { "no" };
        let intrusive_role = if profile.intrusive {
            StyleRole::Warning
        } else {
            StyleRole::Value
        };
        table.add_row(Row::new(vec![
            cell(&profile.id, StyleRole::Key, use_color),
            Cell::new(&profile.display_name),
            Cell::new(&format!("~{}", format_remaining(profile.expected_duration_secs()))),
            cell(intrusive, intrusive_role, use_color),
            Cell::new(&profile.description),
        ]));
    }
    table
}

pub fn print_profiles(profiles: &[ScanProfile], use_color: bool) {
    if profiles.is_empty() {
        eprintln!("No scan profiles available.");
        return;
    }
    let _ = profile_table(profiles, use_color).print_tty(use_color);
}

fn state_role(state: SessionState) -> StyleRole {
    match state {
        SessionState::Completed => StyleRole::Success,
        SessionState::Stopped => StyleRole::Warning,
        SessionState::Failed => StyleRole::Error,
        SessionState::Idle | SessionState::Starting | SessionState::Running => StyleRole::Literal,
    }
}

/// One-line rendering of a session event
///
/// `[Running] 42% ~3 min 10s remaining`
pub fn format_event(event: &SessionEvent, use_color: bool) -> String {
    let state = state_role(event.state).paint(&format!("[{}]", event.state), use_color);
    let percent = format!("{:.0}%", event.progress_percent.floor());

    match event.state {
        SessionState::Starting => format!("{} {} connecting to engine", state, event.session_id),
        SessionState::Completed => match &event.result {
            Some(result) => format!(
                "{} {} scan finished (engine scan {})",
                state, percent, result.engine_id
            ),
            None => format!("{} {} scan finished", state, percent),
        },
        SessionState::Stopped => format!(
            "{} {} {}",
            state,
            percent,
            event.reason.as_deref().unwrap_or("stopped")
        ),
        SessionState::Failed => match &event.error {
            Some(error) => format!(
                "{} {} {}: {}",
                state,
                percent,
                error.kind,
                StyleRole::Error.paint(&error.detail, use_color)
            ),
            None => format!("{} {}", state, percent),
        },
        SessionState::Idle | SessionState::Running => format!(
            "{} {} ~{} remaining",
            state,
            percent,
            format_remaining(event.remaining_seconds)
        ),
    }
}

/// Table of alert counts, most severe first
pub fn alert_table(summary: &AlertSummary, use_color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(header_row(&["Risk", "Alerts", "Meaning"], use_color));

    for level in RiskLevel::iter() {
        let count = summary.count(level);
        let role = match level {
            RiskLevel::High if count > 0 => StyleRole::Error,
            RiskLevel::Medium if count > 0 => StyleRole::Warning,
            _ => StyleRole::Value,
        };
        table.add_row(Row::new(vec![
            cell(&level.to_string(), role, use_color),
            Cell::new(&count.to_string()),
            cell(level.description(), StyleRole::Dim, use_color),
        ]));
    }
    table.add_row(Row::new(vec![
        cell("Total", StyleRole::Key, use_color),
        Cell::new(&summary.total().to_string()),
        Cell::new(""),
    ]));
    table
}

pub fn print_alert_summary(summary: &AlertSummary, use_color: bool) {
    let _ = alert_table(summary, use_color).print_tty(use_color);
}
