//! Live progress rendering for a running session
//!
//! On a terminal the current event is redrawn in place behind a spinner
//! frame; otherwise each event is printed on its own line.

use super::cli::display::format_event;
use crate::session::SessionEvent;
use std::io::{IsTerminal, Write};

const BRAILLE_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Redraw in place only when stderr is a terminal and info logs are not interleaved
pub fn should_redraw() -> bool {
    std::io::stderr().is_terminal() && !log::log_enabled!(log::Level::Info)
}

pub struct ProgressLine {
    frame_index: usize,
    redraw: bool,
    use_color: bool,
    last_line: Option<String>,
}

impl ProgressLine {
    pub fn new(redraw: bool, use_color: bool) -> Self {
        Self {
            frame_index: 0,
            redraw,
            use_color,
            last_line: None,
        }
    }

    /// Render an event; returns the text that was shown
    pub fn update(&mut self, event: &SessionEvent) -> String {
        let line = format_event(event, self.use_color);

        if event.is_terminal() {
            self.clear();
            eprintln!("{}", line);
        } else if self.redraw {
            let frame = BRAILLE_FRAMES[self.frame_index];
            self.frame_index = (self.frame_index + 1) % BRAILLE_FRAMES.len();
            eprint!("\r\x1b[2K{} {}", frame, line);
            let _ = std::io::stderr().flush();
        } else if self.last_line.as_deref() != Some(line.as_str()) {
            eprintln!("{}", line);
        }

        self.last_line = Some(line.clone());
        line
    }

    /// Remove the in-place line, if one is showing
    pub fn clear(&self) {
        if self.redraw && self.last_line.is_some() {
            eprint!("\r\x1b[2K");
            let _ = std::io::stderr().flush();
        }
    }
}
