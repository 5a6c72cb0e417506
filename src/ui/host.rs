//! Terminal prompt host.
//!
//! Shows each step full-screen with [`Picker`] and blocks on key events
//! until the user answers. A frozen prompt hands the terminal back to the
//! shell so a connect action (`gh auth login --web`) can talk to the user,
//! then redraws once the freeze is released.

use std::io::{self, Stdout};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, warn};

use super::picker::Picker;
use super::terminal_guard::{self, install_panic_hook, TerminalGuard};
use crate::wizard::{PromptHandle, PromptHost, Step, StepInput};

#[derive(Debug, Default)]
struct PromptView {
    placeholder: Option<String>,
    ignore_focus_out: bool,
    frozen: bool,
    needs_clear: bool,
}

/// Prompt state shared between the host and frozen flows
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    view: Mutex<PromptView>,
}

impl TerminalPrompt {
    fn with<R>(&self, f: impl FnOnce(&mut PromptView) -> R) -> R {
        f(&mut self.view.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn show(&self, step: &Step) {
        self.with(|v| {
            v.placeholder.clone_from(&step.placeholder);
            v.ignore_focus_out = step.ignore_focus_out;
        });
    }

    pub fn is_frozen(&self) -> bool {
        self.with(|v| v.frozen)
    }

    pub fn ignores_focus_out(&self) -> bool {
        self.with(|v| v.ignore_focus_out)
    }

    fn take_needs_clear(&self) -> bool {
        self.with(|v| std::mem::take(&mut v.needs_clear))
    }
}

impl PromptHandle for TerminalPrompt {
    fn suspend_dismissal(&self) {
        let already = self.with(|v| std::mem::replace(&mut v.frozen, true));
        if already {
            return;
        }
        debug!("Prompt frozen");
        if let Err(e) = terminal_guard::leave() {
            warn!(error = %e, "Failed to release terminal");
        }
    }

    fn resume_dismissal(&self) {
        let was_frozen = self.with(|v| {
            let was = std::mem::replace(&mut v.frozen, false);
            v.needs_clear |= was;
            was
        });
        if !was_frozen {
            return;
        }
        debug!("Prompt resumed");
        if let Err(e) = terminal_guard::enter() {
            warn!(error = %e, "Failed to restore terminal");
        }
    }

    fn placeholder(&self) -> Option<String> {
        self.with(|v| v.placeholder.clone())
    }

    fn set_placeholder(&self, placeholder: Option<String>) {
        let frozen = self.with(|v| {
            v.placeholder.clone_from(&placeholder);
            v.frozen
        });
        // While frozen the screen belongs to the shell
        if let (true, Some(text)) = (frozen, placeholder) {
            println!("{text}");
        }
    }

    fn set_ignore_focus_out(&self, ignore: bool) {
        self.with(|v| v.ignore_focus_out = ignore);
    }
}

pub struct TerminalHost {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    prompt: Arc<TerminalPrompt>,
    tick_rate: Duration,
    _guard: TerminalGuard,
}

impl TerminalHost {
    pub fn new() -> Result<Self> {
        install_panic_hook();
        let guard = TerminalGuard::new()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            prompt: Arc::new(TerminalPrompt::default()),
            tick_rate: Duration::from_millis(250),
            _guard: guard,
        })
    }

    fn run_prompt(&mut self, step: &Step) -> Result<StepInput> {
        let mut picker = Picker::new(step);

        loop {
            if self.prompt.take_needs_clear() {
                self.terminal.clear()?;
            }
            let placeholder = self.prompt.placeholder();
            self.terminal
                .draw(|f| picker.render(f, step, placeholder.as_deref()))?;

            if !event::poll(self.tick_rate)? {
                continue;
            }
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(input) = picker.handle_key(step, key) {
                        return Ok(input);
                    }
                }
                Event::FocusLost if !self.prompt.ignores_focus_out() => {
                    debug!(title = %step.title, "Focus lost, dismissing prompt");
                    return Ok(StepInput::Cancel);
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl PromptHost for TerminalHost {
    fn prompt_handle(&self) -> Arc<dyn PromptHandle> {
        self.prompt.clone()
    }

    async fn prompt(&mut self, step: &Step) -> StepInput {
        self.prompt.show(step);
        match self.run_prompt(step) {
            Ok(input) => input,
            Err(e) => {
                error!(title = %step.title, error = %e, "Prompt failed");
                StepInput::Cancel
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_takes_step_placeholder_and_focus() {
        let prompt = TerminalPrompt::default();
        let step = Step::pick("Pick")
            .with_placeholder("Choose")
            .ignoring_focus_out(true);

        prompt.show(&step);
        assert_eq!(prompt.placeholder(), Some("Choose".to_string()));
        assert!(prompt.ignores_focus_out());

        prompt.set_placeholder(None);
        prompt.set_ignore_focus_out(false);
        assert_eq!(prompt.placeholder(), None);
        assert!(!prompt.ignores_focus_out());
    }

    #[test]
    fn test_resume_without_freeze_needs_no_redraw() {
        let prompt = TerminalPrompt::default();
        prompt.resume_dismissal();
        assert!(!prompt.is_frozen());
        assert!(!prompt.take_needs_clear());
    }
}
