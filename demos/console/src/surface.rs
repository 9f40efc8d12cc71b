//! Stdout rendering for the console and for secondary sessions.

use std::{
    io::Write,
    sync::{Mutex, PoisonError},
};

use ttymux_core::Surface;

/// Renders unit 0 straight to stdout.
pub struct ConsoleSurface;

impl Surface for ConsoleSurface {
    fn render(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Renders a secondary's output one complete line at a time, prefixed
/// with its label so interleaved sessions stay readable.
pub struct LabeledSurface {
    label: String,
    pending: Mutex<String>,
}

impl LabeledSurface {
    #[must_use]
    pub fn new(label: String) -> Self {
        Self {
            label,
            pending: Mutex::new(String::new()),
        }
    }

    fn take_lines(&self, text: &str) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.push_str(text);
        let mut lines = Vec::new();
        while let Some(pos) = pending.find('\n') {
            let line: String = pending.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }
}

impl Surface for LabeledSurface {
    fn render(&self, text: &str) {
        for line in self.take_lines(text) {
            println!("[{}] {line}", self.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_buffered() {
        let surface = LabeledSurface::new("TTY1".into());
        assert!(surface.take_lines("$ l").is_empty());
        assert_eq!(surface.take_lines("s\r\n$ "), vec!["$ ls".to_string()]);
        assert_eq!(*surface.pending.lock().unwrap(), "$ ");
    }
}
