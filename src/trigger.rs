//! Trigger surface
//!
//! A held button and the `send` text command both map to the same trigger
//! event. The button is level-sensitive: it triggers on every poll while
//! held, and the session's readiness gate keeps that from starting more
//! than one capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where a trigger came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Button,
    Command,
}

/// Match a command line against the configured trigger command,
/// ignoring case and surrounding whitespace
pub fn parse_command(line: &str, command: &str) -> Option<TriggerSource> {
    line.trim()
        .eq_ignore_ascii_case(command)
        .then_some(TriggerSource::Command)
}

/// A physical input sampled by level
pub trait ButtonInput: Send + Sync {
    fn is_pressed(&self) -> bool;
}

/// Sample the button once
pub fn poll_button(input: &dyn ButtonInput) -> Option<TriggerSource> {
    input.is_pressed().then_some(TriggerSource::Button)
}

/// Button state that can be driven from another thread
#[derive(Debug, Clone, Default)]
pub struct SharedButton(Arc<AtomicBool>);

impl SharedButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ButtonInput for SharedButton {
    fn is_pressed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_case_insensitive() {
        assert_eq!(parse_command("send", "send"), Some(TriggerSource::Command));
        assert_eq!(parse_command("SEND", "send"), Some(TriggerSource::Command));
        assert_eq!(parse_command("  Send \r\n", "send"), Some(TriggerSource::Command));
    }

    #[test]
    fn test_other_commands_ignored() {
        assert_eq!(parse_command("sendit", "send"), None);
        assert_eq!(parse_command("", "send"), None);
        assert_eq!(parse_command("status", "send"), None);
    }

    #[test]
    fn test_button_is_level_sensitive() {
        let button = SharedButton::new();
        assert_eq!(poll_button(&button), None);

        button.press();
        assert_eq!(poll_button(&button), Some(TriggerSource::Button));
        assert_eq!(poll_button(&button), Some(TriggerSource::Button));

        button.release();
        assert_eq!(poll_button(&button), None);
    }
}
