//! Raw mode and alternate screen handling for the prompt host.
//!
//! The picker owns the screen while a step is shown. A frozen prompt gives
//! it back with [`leave`] and takes it again with [`enter`].

use anyhow::Result;
use crossterm::{
    cursor::Show,
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// Holds the terminal in prompt mode until the host is dropped
pub struct TerminalGuard {
    active: AtomicBool,
}

impl TerminalGuard {
    /// Takes the screen; focus changes are reported so a lost focus can dismiss the prompt
    pub fn new() -> Result<Self> {
        enter()?;
        Ok(Self {
            active: AtomicBool::new(true),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Best-effort restore of the shell's screen, ignoring every error
    pub fn cleanup() {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableFocusChange);
        let _ = execute!(io::stdout(), Show);
        let _ = io::stdout().flush();
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            Self::cleanup();
        }
    }
}

/// Put the terminal into prompt mode
pub fn enter() -> Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableFocusChange)?;
    Ok(())
}

/// Hand the terminal back to the shell, e.g. while `gh` runs a login
pub fn leave() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableFocusChange, Show)?;
    io::stdout().flush()?;
    Ok(())
}

/// Chain a panic hook that gives the screen back before the panic report
pub fn install_panic_hook() {
    let report = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        TerminalGuard::cleanup();
        report(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_reports_active() {
        let guard = TerminalGuard {
            active: AtomicBool::new(true),
        };
        assert!(guard.is_active());
    }

    #[test]
    fn test_inactive_guard_drops_quietly() {
        let guard = TerminalGuard {
            active: AtomicBool::new(false),
        };
        drop(guard);
    }

    #[test]
    fn test_cleanup_without_tty() {
        TerminalGuard::cleanup();
    }
}
